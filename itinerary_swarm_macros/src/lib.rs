//! Procedural macros for itinerary-swarm

mod args;
mod expand;

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemStruct};

use crate::args::SchemaArgs;

/// Implements `CompletionSchema` for a struct with named fields.
///
/// Accepts optional `name = "..."`, `description = "..."` and
/// `normalize = "path::to::fn"` arguments. The normalize function has the
/// signature `fn(serde_json::Value) -> itinerary_swarm::Result<serde_json::Value>`
/// and runs on every structured payload before schema validation.
///
/// Doc comments on the struct and its fields become schema descriptions,
/// keyed by the serialized (`#[serde(rename)]`) field name.
#[proc_macro_attribute]
pub fn completion_schema(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as SchemaArgs);
    let item = parse_macro_input!(item as ItemStruct);

    expand::completion_schema(args, item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
