//! # wabot-core
//!
//! Core types, traits, configuration, and error handling for the wabot gateway.

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod market;
pub mod message;
pub mod target;
pub mod traits;
