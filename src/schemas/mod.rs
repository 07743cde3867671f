pub mod normalize;
pub mod schema;
pub mod validation;

pub use schema::{apply_doc_comments, CompletionSchema, PayloadNormalizer, SchemaHandle};
