//! Canonical addressing for outbound delivery.
//!
//! Raw identifiers come from API bodies, webhook query strings and config.
//! A phone number in any local or international notation normalizes to a
//! digits-only identifier carrying the country code; a group identifier is
//! kept verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ResolutionError;

/// Server suffix of group identifiers.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Server suffix appended to individual phone numbers.
pub const USER_SUFFIX: &str = "@s.whatsapp.net";

/// Whether a target addresses one person or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Individual,
    Group,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved, addressable endpoint.
///
/// For individuals `identifier` is the normalized digit string
/// (`6281234567890`), or a full address on another user server
/// (`112233445566778@lid`); for groups it is the full group identifier
/// (`120363001234567890@g.us`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub identifier: String,
}

impl Target {
    /// The transport address: digits plus user suffix, or the identifier
    /// itself when it already names a server.
    pub fn address(&self) -> String {
        match self.kind {
            TargetKind::Individual if !self.identifier.contains('@') => {
                format!("{}{USER_SUFFIX}", self.identifier)
            }
            _ => self.identifier.clone(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == TargetKind::Group
    }

    /// The target for replying into an inbound conversation.
    ///
    /// `chat_id` is a transport address (`6281...@s.whatsapp.net`,
    /// `6281...:3@s.whatsapp.net`, `1122...@lid` or `1203...@g.us`). Only the
    /// device suffix of a phone-number address is dropped; every other
    /// address is kept verbatim, with no phone normalization.
    pub fn from_chat_id(chat_id: &str) -> Self {
        let chat_id = chat_id.trim();
        if chat_id.ends_with(GROUP_SUFFIX) {
            return Self {
                kind: TargetKind::Group,
                identifier: chat_id.to_string(),
            };
        }
        let identifier = match chat_id.strip_suffix(USER_SUFFIX) {
            Some(user) => user.split(':').next().unwrap_or(user).to_string(),
            None if chat_id.contains('@') => chat_id.to_string(),
            None => chat_id.split(':').next().unwrap_or(chat_id).to_string(),
        };
        Self {
            kind: TargetKind::Individual,
            identifier,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// Turns raw identifiers into [`Target`]s.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    country_code: String,
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self::new("62")
    }
}

impl TargetResolver {
    /// `country_code` is prepended to every number that does not carry it.
    pub fn new(country_code: &str) -> Self {
        Self {
            country_code: country_code.chars().filter(char::is_ascii_digit).collect(),
        }
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// Resolve a raw identifier.
    ///
    /// Anything ending in [`GROUP_SUFFIX`] is validated as a group and never
    /// reinterpreted as a phone number. Every other non-empty input resolves:
    /// a string with no digits at all becomes the bare country code.
    pub fn resolve(&self, raw: &str) -> Result<Target, ResolutionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResolutionError::Empty);
        }

        if let Some(user) = trimmed.strip_suffix(GROUP_SUFFIX) {
            let valid = !user.is_empty()
                && user.chars().all(|c| c.is_ascii_digit() || c == '-')
                && !user.starts_with('-')
                && !user.ends_with('-');
            if !valid {
                return Err(ResolutionError::InvalidGroupFormat(trimmed.to_string()));
            }
            return Ok(Target {
                kind: TargetKind::Group,
                identifier: trimmed.to_string(),
            });
        }

        Ok(Target {
            kind: TargetKind::Individual,
            identifier: self.normalize_phone(trimmed),
        })
    }

    /// Normalize a phone-like string to digits with the country code.
    ///
    /// `0812-3456-7890`, `812 3456 7890`, `+62 812 3456 7890` and
    /// `6281234567890` all yield `6281234567890`.
    pub fn normalize_phone(&self, raw: &str) -> String {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let cc = self.country_code.as_str();

        // Trunk "0" stands in for the country code; a bare subscriber
        // number (e.g. "812...") gets it prepended.
        if let Some(national) = digits.strip_prefix('0') {
            format!("{cc}{national}")
        } else if digits.starts_with(cc) {
            digits
        } else {
            format!("{cc}{digits}")
        }
    }
}
