//! Derive macros for keyed-injector
//!
//! `#[derive(Autowire)]` generates the `Class` descriptor the autowire
//! resolver uses to build a struct from the container.
//!
//! # Example
//!
//! ```rust,ignore
//! use keyed_injector::{Autowire, Container};
//! use std::sync::Arc;
//!
//! #[derive(Autowire, Default)]
//! struct Config;
//!
//! #[derive(Autowire)]
//! #[autowire(name = "mailer")]
//! struct Mailer {
//!     config: Arc<Config>,
//!     cache: Option<Arc<Cache>>,
//!     #[autowire(default = 25)]
//!     port: u16,
//!     #[autowire(skip)]
//!     sent: AtomicU64,
//! }
//!
//! let container = Container::builder().with_autowiring().build();
//! container.register_type::<Config>();
//! container.register_type::<Mailer>();
//!
//! let mailer = container.resolve_as::<Mailer>("mailer").unwrap();
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Expr, Fields, LitStr, Type, parse_macro_input};

/// Derive `keyed_injector::Autowire`.
///
/// Every field becomes a constructor parameter, in declaration order:
///
/// - `Arc<T>` - a class parameter typed by `T`'s type name
/// - `Option<Arc<T>>` - a nullable class parameter
/// - any other type - a builtin parameter read with `Clone`
///
/// # Attributes
///
/// - `#[autowire(name = "id")]` on the struct - register under `id` instead
///   of the type name
/// - `#[autowire(class = "id")]` - type a class parameter by an arbitrary
///   identifier
/// - `#[autowire(default = expr)]` - default for a builtin parameter
/// - `#[autowire(skip)]` - not a parameter; filled with `Default::default()`
#[proc_macro_derive(Autowire, attributes(autowire))]
pub fn derive_autowire(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Autowire cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Autowire can only be derived for structs",
            ));
        }
    };

    let class = match parse_struct_attrs(&input.attrs)? {
        Some(id) => quote! { ::keyed_injector::Class::named::<Self>(#id) },
        None => quote! { ::keyed_injector::Class::of::<Self>() },
    };

    let construct = match fields {
        Fields::Unit => quote! { Self },
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Autowire requires named fields or a unit struct",
            ));
        }
        Fields::Named(named) => {
            let mut params = Vec::new();
            let mut inits = Vec::new();

            for field in &named.named {
                let Some(ident) = field.ident.as_ref() else {
                    continue;
                };
                let label = ident.to_string();
                let attrs = parse_field_attrs(&field.attrs)?;

                if attrs.skip {
                    inits.push(quote! { #ident: ::std::default::Default::default() });
                    continue;
                }

                let index = params.len();
                let (param, init) = field_param(&field.ty, &label, index, attrs)?;
                params.push(param);
                inits.push(quote! { #ident: #init });
            }

            return Ok(quote! {
                impl ::keyed_injector::Autowire for #name {
                    fn class() -> ::keyed_injector::Class {
                        #class
                            #(.param(#params))*
                            .constructor(|__args: &::keyed_injector::Args| {
                                ::std::result::Result::Ok(Self { #(#inits),* })
                            })
                            .build()
                    }
                }
            });
        }
    };

    Ok(quote! {
        impl ::keyed_injector::Autowire for #name {
            fn class() -> ::keyed_injector::Class {
                #class
                    .constructor(|_: &::keyed_injector::Args| ::std::result::Result::Ok(#construct))
                    .build()
            }
        }
    })
}

fn field_param(
    ty: &Type,
    label: &str,
    index: usize,
    attrs: FieldAttrs,
) -> syn::Result<(proc_macro2::TokenStream, proc_macro2::TokenStream)> {
    let class_param = |inner: &Type| match &attrs.class {
        Some(id) => quote! { ::keyed_injector::Param::class_named(#label, #id) },
        None => quote! { ::keyed_injector::Param::class::<#inner>(#label) },
    };

    if let Some(inner) = option_arc_inner(ty) {
        let param = class_param(inner);
        return Ok((
            quote! { #param.nullable() },
            quote! { __args.optional::<#inner>(#index)? },
        ));
    }

    if let Some(inner) = arc_inner(ty) {
        if attrs.default.is_some() {
            return Err(syn::Error::new_spanned(
                ty,
                "#[autowire(default)] is only supported on builtin fields",
            ));
        }
        return Ok((class_param(inner), quote! { __args.get::<#inner>(#index)? }));
    }

    if let Some(id) = &attrs.class {
        return Err(syn::Error::new_spanned(
            id,
            "#[autowire(class)] requires an Arc<T> or Option<Arc<T>> field",
        ));
    }

    let param = quote! { ::keyed_injector::Param::builtin(#label, ::std::stringify!(#ty)) };
    let param = match &attrs.default {
        Some(default) => quote! { #param.with_default::<#ty>(#default) },
        None => param,
    };
    Ok((param, quote! { __args.value::<#ty>(#index)? }))
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    default: Option<Expr>,
    class: Option<LitStr>,
}

fn parse_struct_attrs(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("autowire")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(name)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("autowire")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                parsed.skip = true;
            } else if meta.path.is_ident("default") {
                parsed.default = Some(meta.value()?.parse::<Expr>()?);
            } else if meta.path.is_ident("class") {
                parsed.class = Some(meta.value()?.parse::<LitStr>()?);
            } else {
                return Err(meta.error("expected `skip`, `default = ...` or `class = \"...\"`"));
            }
            Ok(())
        })?;
    }
    Ok(parsed)
}

/// T from Arc<T>
fn arc_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Arc")
}

/// T from Option<Arc<T>>
fn option_arc_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Option").and_then(arc_inner)
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(syn::GenericArgument::Type(inner)) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}
