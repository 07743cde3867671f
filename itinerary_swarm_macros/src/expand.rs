use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{spanned::Spanned, Attribute, Expr, ExprLit, Field, Fields, ItemStruct, Lit, LitStr, Token};

use crate::args::SchemaArgs;

/// Joined `///` lines of an item, if it has any.
fn doc_text(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta.require_name_value().ok()?.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(line),
                ..
            }) => Some(line.value().trim().to_string()),
            _ => None,
        })
        .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Name the field serializes under: `#[serde(rename = "...")]` or its ident.
fn serialized_name(field: &Field) -> Option<String> {
    let ident = field.ident.as_ref()?;
    let mut renamed = None;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                renamed = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.input.peek(Token![=]) {
                meta.value()?.parse::<Expr>()?;
            } else if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                content.parse::<TokenStream>()?;
            }
            Ok(())
        });
    }

    Some(renamed.unwrap_or_else(|| ident.to_string()))
}

pub fn completion_schema(args: SchemaArgs, item: ItemStruct) -> syn::Result<TokenStream> {
    let Fields::Named(fields) = &item.fields else {
        return Err(syn::Error::new(
            item.struct_token.span(),
            "`#[completion_schema]` only supports structs with named fields",
        ));
    };

    if !item.generics.params.is_empty() {
        return Err(syn::Error::new(
            item.generics.span(),
            "`#[completion_schema]` does not support generic structs",
        ));
    }

    let ident = &item.ident;
    let type_name = LitStr::new(&ident.to_string(), Span::call_site());
    let schema_name = args.name.unwrap_or_else(|| type_name.clone());

    let description = match args.description {
        Some(explicit) => quote! { Some(#explicit) },
        None => match doc_text(&item.attrs) {
            Some(doc) => quote! { Some(#doc) },
            None => quote! { None },
        },
    };

    let field_docs = fields.named.iter().filter_map(|field| {
        let name = serialized_name(field)?;
        let doc = doc_text(&field.attrs)?;
        Some(quote! { (#name, #doc) })
    });

    let normalizer = args
        .normalize
        .map(|path| quote! { .with_normalizer(#path) });

    Ok(quote! {
        #item

        impl itinerary_swarm::schema::CompletionSchema for #ident {
            fn schema() -> &'static itinerary_swarm::schema::SchemaHandle {
                static HANDLE: std::sync::OnceLock<itinerary_swarm::schema::SchemaHandle> =
                    std::sync::OnceLock::new();
                HANDLE.get_or_init(|| {
                    let mut root = schemars::schema_for!(Self);
                    itinerary_swarm::schema::apply_doc_comments(
                        &mut root,
                        #schema_name,
                        #description,
                        &[#(#field_docs),*],
                    );
                    itinerary_swarm::schema::SchemaHandle::from_root_schema::<Self>(
                        #schema_name,
                        #type_name,
                        root,
                    )
                    #normalizer
                })
            }
        }
    })
}
