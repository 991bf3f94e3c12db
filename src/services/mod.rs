//! Service layer modules for external integrations.
//!
//! Contains the language model client, file storage and document text
//! extraction.

pub mod ai_client;
pub mod extraction;
pub mod storage;

pub use ai_client::{AiClient, LanguageModel, LlmError, Prompt};
pub use storage::{FileStorage, SupabaseStorage};
