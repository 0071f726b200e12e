//! WhatsApp transport over the WhatsApp Web protocol (`whatsapp-rust`).
//!
//! First start prints a pairing QR code to the terminal. The linked-device
//! session is kept in `{data_dir}/whatsapp_session/whatsapp.db` and reused.

mod bot;
mod events;
mod qr;
mod transport;

#[cfg(test)]
mod tests;

pub use qr::generate_qr_terminal;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use wabot_core::{config::shellexpand, error::WabotError};
use whatsapp_rust::client::Client;

/// A single linked-device WhatsApp session.
pub struct WhatsAppTransport {
    /// Name shown in the phone's "Linked devices" list.
    pub(super) device_name: String,
    pub(super) data_dir: String,
    /// Set once the bot is built; cleared on logout.
    pub(super) client: Arc<Mutex<Option<Arc<Client>>>>,
    pub(super) connected: Arc<AtomicBool>,
}

impl WhatsAppTransport {
    pub fn new(device_name: &str, data_dir: &str) -> Self {
        Self {
            device_name: device_name.to_string(),
            data_dir: data_dir.to_string(),
            client: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Session database path, creating its directory.
    pub(super) fn session_db_path(&self) -> Result<String, WabotError> {
        let session_dir = format!("{}/whatsapp_session", shellexpand(&self.data_dir));
        std::fs::create_dir_all(&session_dir).map_err(|e| {
            WabotError::Transport(format!("failed to create session dir {session_dir}: {e}"))
        })?;
        Ok(format!("{session_dir}/whatsapp.db"))
    }

    /// The live client, without holding the lock across the caller's I/O.
    pub(super) async fn live_client(&self) -> Result<Arc<Client>, WabotError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(WabotError::Transport("whatsapp client not connected".into()));
        }
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| WabotError::Transport("whatsapp client not connected".into()))
    }
}
