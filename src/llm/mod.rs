//! OpenAI-compatible chat client shared by the remote shortener and rater

pub mod client;
pub mod credentials;

pub use client::{ChatClient, LlmError};
pub use credentials::{resolve_api_key, CredentialError};
