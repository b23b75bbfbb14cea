//! Image constraint checks shared by the provider content codecs

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Warning;
use crate::types::{ContentBlock, ImageSource};

const MB: usize = 1024 * 1024;

/// Size and format limits a provider declares for inline images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageConstraints {
    pub provider: &'static str,
    pub max_bytes: usize,
    pub formats: &'static [&'static str],
}

pub const OPENAI_IMAGES: ImageConstraints = ImageConstraints {
    provider: "openai",
    max_bytes: 20 * MB,
    formats: &["image/png", "image/jpeg", "image/gif", "image/webp"],
};

pub const RESPONSES_IMAGES: ImageConstraints = ImageConstraints {
    provider: "openai_responses",
    ..OPENAI_IMAGES
};

pub const ANTHROPIC_IMAGES: ImageConstraints = ImageConstraints {
    provider: "anthropic",
    max_bytes: 5 * MB,
    formats: &["image/jpeg", "image/png", "image/gif", "image/webp"],
};

pub const GEMINI_IMAGES: ImageConstraints = ImageConstraints {
    provider: "gemini",
    max_bytes: 10 * MB,
    formats: &[
        "image/png",
        "image/jpeg",
        "image/gif",
        "image/webp",
        "image/heic",
        "image/heif",
    ],
};

impl ImageConstraints {
    pub fn supports(&self, media_type: &str) -> bool {
        let media_type = normalize_media_type(media_type);
        self.formats.iter().any(|f| *f == media_type)
    }

    /// Check one image; returns the violation message, if any.
    ///
    /// URL images are only checked for format: their size is unknown here.
    pub fn check(&self, media_type: &str, data: &str, source: ImageSource) -> Option<String> {
        if !self.supports(media_type) {
            return Some(format!(
                "{} does not accept image type {} (supported: {})",
                self.provider,
                media_type,
                self.formats.join(", ")
            ));
        }
        if source == ImageSource::Url {
            return None;
        }
        match decoded_len(data) {
            Some(len) if len > self.max_bytes => Some(format!(
                "image is {} bytes, {} accepts at most {} bytes",
                len, self.provider, self.max_bytes
            )),
            Some(_) => None,
            None => Some("image data is not valid base64".to_string()),
        }
    }

    /// Check a canonical block; text blocks always pass.
    pub fn check_block(&self, block: &ContentBlock) -> Result<(), Warning> {
        match block {
            ContentBlock::Text { .. } => Ok(()),
            ContentBlock::Image {
                media_type,
                data,
                source,
            } => match self.check(media_type, data, *source) {
                Some(reason) => Err(Warning::content_violation(reason).logged()),
                None => Ok(()),
            },
        }
    }
}

/// `image/jpg` is a common misspelling of `image/jpeg`.
pub fn normalize_media_type(media_type: &str) -> String {
    let lower = media_type.trim().to_ascii_lowercase();
    if lower == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        lower
    }
}

/// Byte length of a base64 payload, or `None` when it does not decode.
pub fn decoded_len(data: &str) -> Option<usize> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact.as_bytes()).ok().map(|bytes| bytes.len())
}

/// Guess a media type from a URL's file extension, defaulting to jpeg.
pub fn guess_media_type(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        _ => "image/jpeg",
    }
}
