//! `#[derive(Performer)]` implementation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, spanned::Spanned};

// ============================================================================
// Attribute parsing
// ============================================================================

/// A parsed `#[access(...)]` field marker.
struct AccessAttr {
    name: Option<String>,
    optional: bool,
}

fn parse_access(attrs: &[Attribute]) -> syn::Result<Option<AccessAttr>> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("access")) else {
        return Ok(None);
    };

    let mut access = AccessAttr {
        name: None,
        optional: false,
    };

    // bare `#[access]`
    if matches!(attr.meta, syn::Meta::Path(_)) {
        return Ok(Some(access));
    }

    // `#[access("name")]`
    if let Ok(lit) = attr.parse_args::<LitStr>() {
        access.name = Some(lit.value());
        return Ok(Some(access));
    }

    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") {
            access.name = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else if meta.path.is_ident("optional") {
            access.optional = true;
            Ok(())
        } else {
            Err(meta.error("expected `name = \"...\"` or `optional`"))
        }
    })?;

    Ok(Some(access))
}

/// Lifespan hooks named by `#[performer(enter = "...", exit = "...")]`.
#[derive(Default)]
struct Hooks {
    enter: Option<syn::Ident>,
    exit: Option<syn::Ident>,
}

fn parse_hooks(attrs: &[Attribute]) -> syn::Result<Hooks> {
    let mut hooks = Hooks::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("performer")) {
        attr.parse_nested_meta(|meta| {
            let slot = if meta.path.is_ident("enter") {
                &mut hooks.enter
            } else if meta.path.is_ident("exit") {
                &mut hooks.exit
            } else {
                return Err(meta.error("expected `enter = \"...\"` or `exit = \"...\"`"));
            };
            let method: LitStr = meta.value()?.parse()?;
            *slot = Some(method.parse()?);
            Ok(())
        })?;
    }
    Ok(hooks)
}

// ============================================================================
// Entry point
// ============================================================================

pub fn derive_performer(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let data = match &input.data {
        Data::Struct(data) => data,
        Data::Enum(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Performer can only be derived for structs",
            ));
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Performer cannot be derived for unions",
            ));
        }
    };

    let body = match &data.fields {
        Fields::Unit => quote! { Self },
        Fields::Unnamed(fields) => {
            return Err(syn::Error::new(
                fields.span(),
                "Performer needs named fields to know which components to look up",
            ));
        }
        Fields::Named(fields) => {
            let mut inits = Vec::with_capacity(fields.named.len());
            for field in &fields.named {
                let Some(ident) = &field.ident else {
                    continue;
                };
                let init = match parse_access(&field.attrs)? {
                    None => quote! { ::core::default::Default::default() },
                    Some(access) => {
                        let component = access.name.unwrap_or_else(|| ident.to_string());
                        if access.optional {
                            quote! { ::ryanvk_core::Component::optional(access, #component)? }
                        } else {
                            quote! { ::ryanvk_core::Component::required(access, #component)? }
                        }
                    }
                };
                inits.push(quote! { #ident: #init });
            }
            quote! { Self { #(#inits,)* } }
        }
    };

    let hooks = parse_hooks(&input.attrs)?;
    let hook_output = quote! {
        ::core::pin::Pin<::std::boxed::Box<
            dyn ::core::future::Future<
                Output = ::core::result::Result<(), ::ryanvk_core::BoxError>,
            > + ::core::marker::Send + 'a,
        >>
    };
    let on_enter = hooks.enter.map(|method| {
        quote! {
            fn on_enter<'a>(&'a self, staff: &'a ::ryanvk_core::Staff) -> #hook_output {
                ::std::boxed::Box::pin(Self::#method(self, staff))
            }
        }
    });
    let on_exit = hooks.exit.map(|method| {
        quote! {
            fn on_exit<'a>(&'a self) -> #hook_output {
                ::std::boxed::Box::pin(Self::#method(self))
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::ryanvk_core::Performer for #name #ty_generics #where_clause {
            fn construct(
                access: &::ryanvk_core::Access<'_>,
            ) -> ::ryanvk_core::StaffResult<Self> {
                let _ = access;
                ::core::result::Result::Ok(#body)
            }

            #on_enter
            #on_exit
        }
    })
}
