pub(crate) mod execution;
pub mod openai_client;
pub(crate) mod response_handler;
pub(crate) mod tool_call_utils;

pub use openai_client::OpenAIClient;
