//! QR Rendering
//!
//! Renders a PIX copy-paste code into a scannable SVG image on disk. SVG
//! keeps the rendering dependency-light and scales cleanly in chat clients.

use std::fs;
use std::path::{Path, PathBuf};

use qrcode::QrCode;
use qrcode::render::svg;

use crate::error::{PaymentError, Result};

/// Render `code` as an SVG QR image under `dir`, named by `payment_id`.
///
/// Returns the path of the written file. The directory is created when
/// missing; the image is overwritten if it already exists.
pub fn render_code_svg(code: &str, dir: &Path, payment_id: &str) -> Result<PathBuf> {
    let qr = QrCode::new(code.as_bytes()).map_err(|e| PaymentError::Qr(e.to_string()))?;
    let image = qr
        .render::<svg::Color<'_>>()
        .min_dimensions(256, 256)
        .build();

    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{payment_id}.svg"));
    fs::write(&path, image)?;

    tracing::debug!(payment_id, path = %path.display(), "QR image rendered");
    Ok(path)
}
