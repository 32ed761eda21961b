use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

/// Encoded image bytes plus what a saver needs to label them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub extension: &'static str,
}

impl PreviewImage {
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Preview rendered for one record, kept until the next request replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub key: String,
    pub link: String,
    pub image: PreviewImage,
}

impl Preview {
    pub fn file_name(&self) -> String {
        preview_file_name(&self.key, self.image.extension)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("payload cannot be encoded as a QR code: {0}")]
    Qr(#[from] qrcode::types::QrError),
    #[error("{0}")]
    Encoder(String),
}

/// Turns a link into an image. Injected into the navigator so hosts and
/// tests can swap the renderer.
pub trait PreviewEncoder {
    fn encode(&self, payload: &str) -> Result<PreviewImage, PreviewError>;
}

/// SVG QR-code renderer.
#[derive(Debug, Clone, Copy)]
pub struct QrSvgEncoder {
    pub min_dimension: u32,
    pub ec_level: EcLevel,
}

impl Default for QrSvgEncoder {
    fn default() -> Self {
        Self {
            min_dimension: 256,
            ec_level: EcLevel::M,
        }
    }
}

impl PreviewEncoder for QrSvgEncoder {
    fn encode(&self, payload: &str) -> Result<PreviewImage, PreviewError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), self.ec_level)?;
        let image = code
            .render::<svg::Color>()
            .min_dimensions(self.min_dimension, self.min_dimension)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build();
        Ok(PreviewImage {
            bytes: image.into_bytes(),
            media_type: "image/svg+xml",
            extension: "svg",
        })
    }
}

/// `qrcode-<key>.<ext>`, with characters that cannot live in a file name
/// replaced by `-`.
pub fn preview_file_name(key: &str, extension: &str) -> String {
    let safe_key: String = key
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '"' | '*' | '?' | '<' | '>' | '|' => '-',
            ch if ch.is_control() => '-',
            ch => ch,
        })
        .collect();
    format!("qrcode-{safe_key}.{extension}")
}
