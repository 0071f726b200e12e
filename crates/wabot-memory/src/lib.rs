//! # wabot-memory
//!
//! Per-conversation chat history, bounded per key and written through to a
//! single JSON file.

pub mod store;

pub use store::{ConversationKey, MemoryEntry, MemoryStats, MemoryStore};
