//! Bot lifecycle: session backend, event wiring, background run.

use super::events::handle_message;
use super::qr::generate_qr_terminal;
use super::WhatsAppTransport;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wabot_core::{error::WabotError, message::InboundMessage};
use wacore::types::events::Event;
use whatsapp_rust::bot::Bot;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

impl WhatsAppTransport {
    /// Build the bot around the stored session and run it in the background.
    /// Inbound messages are forwarded to `tx`.
    pub(super) async fn build_and_run(
        &self,
        tx: mpsc::Sender<InboundMessage>,
    ) -> Result<(), WabotError> {
        let db_path = self.session_db_path()?;
        info!("WhatsApp bot building (session: {db_path})...");

        let backend = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .map_err(|e| WabotError::Transport(format!("whatsapp store init failed: {e}")))?,
        );

        let client_slot = self.client.clone();
        let connected = self.connected.clone();

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, client| {
                let tx = tx.clone();
                let client_slot = client_slot.clone();
                let connected = connected.clone();
                async move {
                    match event {
                        Event::PairingQrCode { code, .. } => {
                            info!("WhatsApp QR code generated (scan to pair)");
                            debug!("QR data: {code}");
                            match generate_qr_terminal(&code) {
                                Ok(qr) => println!(
                                    "\nScan with WhatsApp > Linked devices > Link a device:\n\n{qr}"
                                ),
                                Err(e) => warn!("cannot render pairing QR: {e}"),
                            }
                        }
                        Event::PairSuccess(_) => {
                            info!("WhatsApp pairing successful");
                        }
                        Event::Connected(_) => {
                            info!("WhatsApp connected");
                            *client_slot.lock().await = Some(client);
                            connected.store(true, Ordering::SeqCst);
                        }
                        Event::Disconnected(_) => {
                            warn!("WhatsApp disconnected");
                            connected.store(false, Ordering::SeqCst);
                        }
                        Event::LoggedOut(_) => {
                            warn!("WhatsApp logged out, session invalidated; restart to pair again");
                            connected.store(false, Ordering::SeqCst);
                            *client_slot.lock().await = None;
                        }
                        Event::Message(msg, info) => {
                            handle_message(&msg, &info, &tx).await;
                        }
                        _ => {}
                    }
                }
            })
            .build()
            .await
            .map_err(|e| WabotError::Transport(format!("whatsapp bot build failed: {e}")))?;

        *self.client.lock().await = Some(bot.client());

        let _handle = bot
            .run()
            .await
            .map_err(|e| WabotError::Transport(format!("whatsapp bot run failed: {e}")))?;

        info!("WhatsApp bot started");
        Ok(())
    }
}
