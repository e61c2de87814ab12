use crate::error::{PactError, Result};
use qrcode::QrCode;
use qrcode::render::svg;

/// Minimum edge length, in pixels, of rendered QR images.
pub const DEFAULT_QR_SIZE: u32 = 256;

fn qr_code(payload: &str) -> Result<QrCode> {
    QrCode::new(payload.as_bytes())
        .map_err(|e| PactError::ValidationError(format!("Cannot encode QR payload: {e}")))
}

/// Renders `payload` as a standalone SVG document on a transparent background.
pub fn render_svg(payload: &str, size: u32) -> Result<String> {
    Ok(qr_code(payload)?
        .render::<svg::Color>()
        .min_dimensions(size, size)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("transparent"))
        .build())
}

/// Renders `payload` with block characters for display in a terminal.
pub fn render_text(payload: &str) -> Result<String> {
    Ok(qr_code(payload)?
        .render::<char>()
        .quiet_zone(true)
        .module_dimensions(2, 1)
        .build())
}
