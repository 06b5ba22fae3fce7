//! Procedural macros for roadmap-client
//!
//! - `#[derive(Entity)]` - Bind a serde struct to a schema model

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Token, parse_macro_input};

/// Implement `roadmap_client::entities::Entity` for a struct.
///
/// # Usage
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
/// #[serde(rename_all = "camelCase")]
/// #[entity(model = "RoadMap")]
/// pub struct RoadMap {
///     pub id: String,
///     pub project_id: String,
///     #[entity(relation)]
///     #[serde(default, skip_serializing_if = "Option::is_none")]
///     pub nodes: Option<Vec<Node>>,
/// }
/// ```
///
/// # Generated Code
///
/// ```ignore
/// impl roadmap_client::entities::Entity for RoadMap {
///     const MODEL: &'static str = "RoadMap";
///     const FIELDS: &'static [&'static str] = &["id", "projectId"];
/// }
/// ```
///
/// `model` defaults to the struct name. Scalar field names are the camelCase
/// form of the Rust name unless `#[serde(rename = "..")]` says otherwise;
/// fields marked `#[entity(relation)]` are left out.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_entity(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut model = name.to_string();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("model") {
                let value: LitStr = meta.value()?.parse()?;
                model = value.value();
                Ok(())
            } else {
                Err(meta.error("expected `model = \"...\"`"))
            }
        })?;
    }

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "Entity can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            name,
            "Entity requires named fields",
        ));
    };

    let mut fields = Vec::new();
    for field in &named.named {
        let Some(ident) = &field.ident else {
            continue;
        };
        let mut relation = false;
        let mut rename = None;

        for attr in &field.attrs {
            if attr.path().is_ident("entity") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("relation") {
                        relation = true;
                        Ok(())
                    } else {
                        Err(meta.error("expected `relation`"))
                    }
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        let value: LitStr = meta.value()?.parse()?;
                        rename = Some(value.value());
                    } else if meta.input.peek(Token![=]) {
                        let _: syn::Expr = meta.value()?.parse()?;
                    }
                    Ok(())
                })?;
            }
        }

        if !relation {
            fields.push(rename.unwrap_or_else(|| ident.to_string().to_case(Case::Camel)));
        }
    }

    Ok(quote! {
        impl #impl_generics ::roadmap_client::entities::Entity for #name #ty_generics #where_clause {
            const MODEL: &'static str = #model;
            const FIELDS: &'static [&'static str] = &[#(#fields),*];
        }
    })
}
