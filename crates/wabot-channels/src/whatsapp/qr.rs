use qrcode::render::unicode::Dense1x2;
use qrcode::{EcLevel, QrCode};
use wabot_core::error::WabotError;

/// Render pairing data as a terminal QR code, two modules per character cell.
///
/// Colours are inverted so the code scans on dark terminal backgrounds.
pub fn generate_qr_terminal(qr_data: &str) -> Result<String, WabotError> {
    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| WabotError::Transport(format!("QR generation failed: {e}")))?;

    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}
