//! # wabot-providers
//!
//! External capabilities behind the `wabot-core` seams: the Gemini
//! text/image [`Generator`](wabot_core::traits::Generator) and the IDX
//! [`MarketData`](wabot_core::traits::MarketData) scraper.

pub mod gemini;
pub mod idx;

pub use gemini::GeminiGenerator;
pub use idx::IdxScraper;
