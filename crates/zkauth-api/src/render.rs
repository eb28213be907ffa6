//! # Challenge Rendering
//!
//! Issued requests can be rendered as a scannable QR code for wallets.
//! Rendering is a side effect of issuance: it runs off the request path
//! and a failure is only logged.

use std::path::PathBuf;

use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};
use thiserror::Error;
use zkauth_core::SessionId;

/// Default minimum QR image edge, in pixels.
pub const DEFAULT_QR_SIZE: u32 = 256;

/// Errors rendering a challenge.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The payload does not fit in a QR code.
    #[error("QR encoding failed: {0}")]
    Encode(#[from] QrError),
    /// The image could not be written.
    #[error("writing QR image failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders serialized authorization requests.
pub trait ChallengeRenderer: Send + Sync {
    /// Render `payload`, the serialized request of `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the image cannot be produced.
    fn render(&self, session_id: SessionId, payload: &[u8]) -> Result<(), RenderError>;
}

/// Encode `payload` as an SVG QR code at medium error correction.
///
/// # Errors
///
/// Returns [`RenderError::Encode`] if the payload is too large.
pub fn qr_svg(payload: &[u8], min_size: u32) -> Result<String, RenderError> {
    let code = QrCode::with_error_correction_level(payload, EcLevel::M)?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(min_size, min_size)
        .build())
}

/// Writes the latest challenge as an SVG file, replacing the previous one.
#[derive(Debug, Clone)]
pub struct SvgFileRenderer {
    path: PathBuf,
    min_size: u32,
}

impl SvgFileRenderer {
    /// Renderer writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_size: DEFAULT_QR_SIZE,
        }
    }
}

impl ChallengeRenderer for SvgFileRenderer {
    fn render(&self, session_id: SessionId, payload: &[u8]) -> Result<(), RenderError> {
        let svg = qr_svg(payload, self.min_size)?;
        std::fs::write(&self.path, svg)?;
        tracing::debug!(%session_id, path = %self.path.display(), "challenge QR written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_is_produced() {
        let svg = qr_svg(br#"{"type":"authentication"}"#, 128).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn oversized_payload_fails() {
        let payload = vec![b'x'; 8 * 1024];
        assert!(matches!(qr_svg(&payload, 128), Err(RenderError::Encode(_))));
    }

    #[test]
    fn file_renderer_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qr.svg");
        let renderer = SvgFileRenderer::new(&path);
        renderer.render(SessionId::new(), b"first").unwrap();
        renderer.render(SessionId::new(), b"second").unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SvgFileRenderer::new(dir.path().join("missing").join("qr.svg"));
        assert!(matches!(
            renderer.render(SessionId::new(), b"payload"),
            Err(RenderError::Io(_))
        ));
    }
}
