//! Background image reference, upload decoding and canvas scaling.

use crate::error::EditorError;
use base64::{Engine, engine::general_purpose::STANDARD};
use kurbo::Size;

/// Image format for uploaded background data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG format.
    Png,
    /// JPEG format.
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Detect format from a MIME type.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }

        None
    }

    fn codec(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::WebP => image::ImageFormat::WebP,
        }
    }
}

/// The design's background: inline data or a pointer into remote blob storage.
///
/// Once an upload succeeds the `Remote` form is authoritative; inline data
/// is only kept when no remote store is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundImage {
    /// `data:<mime>;base64,<payload>` string.
    Inline { data_url: String },
    /// Remote blob identifier plus its public URL.
    Remote { path: String, url: String },
    /// Public URL with no blob identifier. Loadable but not owned, so it is
    /// never deleted or fetched through the blob store.
    Linked { url: String },
}

impl BackgroundImage {
    /// Build an inline background from raw bytes.
    pub fn inline(bytes: &[u8], format: ImageFormat) -> Self {
        BackgroundImage::Inline {
            data_url: encode_data_url(bytes, format),
        }
    }

    /// Build a remote background pointer.
    pub fn remote(path: impl Into<String>, url: impl Into<String>) -> Self {
        BackgroundImage::Remote {
            path: path.into(),
            url: url.into(),
        }
    }

    /// Remote blob path, if this is a pointer.
    pub fn path(&self) -> Option<&str> {
        match self {
            BackgroundImage::Remote { path, .. } => Some(path),
            BackgroundImage::Inline { .. } | BackgroundImage::Linked { .. } => None,
        }
    }

    /// Check if this is a remote pointer.
    pub fn is_remote(&self) -> bool {
        matches!(self, BackgroundImage::Remote { .. })
    }

    /// The string a canvas can load directly: the data URL or the public URL.
    pub fn source(&self) -> &str {
        match self {
            BackgroundImage::Inline { data_url } => data_url,
            BackgroundImage::Remote { url, .. } | BackgroundImage::Linked { url } => url,
        }
    }

    /// Decode inline data back into bytes.
    pub fn inline_bytes(&self) -> Option<(ImageFormat, Vec<u8>)> {
        match self {
            BackgroundImage::Inline { data_url } => decode_data_url(data_url),
            BackgroundImage::Remote { .. } | BackgroundImage::Linked { .. } => None,
        }
    }
}

/// Encode bytes as a base64 data URL.
pub fn encode_data_url(bytes: &[u8], format: ImageFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes))
}

/// Decode a base64 data URL produced by [`encode_data_url`].
pub fn decode_data_url(data_url: &str) -> Option<(ImageFormat, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload).ok()?;
    let format = ImageFormat::from_mime_type(mime).or_else(|| ImageFormat::from_magic_bytes(&bytes))?;
    Some((format, bytes))
}

/// An upload that passed format sniffing and a full decode.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub format: ImageFormat,
    /// Source width in pixels.
    pub width: u32,
    /// Source height in pixels.
    pub height: u32,
    /// Original encoded bytes.
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Validate an uploaded file. Non-images and corrupt data are rejected.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, EditorError> {
        let format = ImageFormat::from_magic_bytes(&bytes).ok_or(EditorError::UnsupportedFormat)?;
        let image = image::load_from_memory_with_format(&bytes, format.codec())
            .map_err(|e| EditorError::Decode(e.to_string()))?;
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(EditorError::Decode("image has no pixels".to_string()));
        }
        Ok(Self {
            format,
            width,
            height,
            bytes,
        })
    }

    /// Source size.
    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }
}

/// Scale `source` to fit within `max` while preserving aspect ratio.
///
/// Images already inside the bound keep their native size.
pub fn fit_within(source: Size, max: Size) -> Size {
    if source.width <= 0.0 || source.height <= 0.0 {
        return source;
    }
    if source.width <= max.width && source.height <= max.height {
        return source;
    }
    let scale = (max.width / source.width).min(max.height / source.height);
    Size::new(
        (source.width * scale).round(),
        (source.height * scale).round(),
    )
}
