//! # wabot-channels
//!
//! The WhatsApp transport and the delivery engine that sends through it.

pub mod delivery;
pub mod markup;
pub mod media;
pub mod whatsapp;

pub use delivery::{DeliveryEngine, DeliveryReport, FanOutItem, FanOutOutcome, MediaOutcome};
pub use whatsapp::WhatsAppTransport;
