// OpenAI Model Client
//
// This crate implements the ModelClient trait from switchyard-core over the
// OpenAI chat completions API. Any endpoint speaking the same protocol works
// by pointing OPENAI_BASE_URL at it.

mod client;
mod types;


pub use client::{
    OpenAiConfig, OpenAiModelClient, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT,
};
pub use types::{ChatMessage, ChatRequest, ChatResponse};
