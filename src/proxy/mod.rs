//! Generative-model access for the chat gateway.

mod completion;

pub use completion::{CompletionProvider, GenerationParams, HttpCompletionProvider};
