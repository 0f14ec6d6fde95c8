//! Turns a located preview file into a bitmap.
//!
//! Lightroom previews come in several containers: bare JPEGs, `.lrprev` files
//! wrapping JPEG streams in a proprietary header, DNG smart previews, and
//! occasionally unknown blobs with a JPEG inside. [`PreviewDecoder`] tries a
//! fixed sequence of strategies and keeps the first bitmap produced.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub mod jpeg;
pub mod raw;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Preview file is empty: {0}")]
    EmptyFile(PathBuf),

    #[error("Failed to read preview '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No decoding strategy could read {0}")]
    Exhausted(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    JpegSignature,
    Generic,
    LegacyContainer,
    RawContainer,
    MarkerScan,
    FinalGeneric,
}

impl DecodeStrategy {
    pub const ORDER: [Self; 6] = [
        Self::JpegSignature,
        Self::Generic,
        Self::LegacyContainer,
        Self::RawContainer,
        Self::MarkerScan,
        Self::FinalGeneric,
    ];
}

/// What every strategy gets to look at.
pub struct DecodeInput<'a> {
    pub path: &'a Path,
    pub bytes: &'a [u8],
    pub extension: String,
}

impl<'a> DecodeInput<'a> {
    pub fn new(path: &'a Path, bytes: &'a [u8]) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        Self {
            path,
            bytes,
            extension,
        }
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A decoded bitmap. Dropping it releases the pixels and the decoder's
/// live-handle count together.
pub struct DecodedPreview {
    image: DynamicImage,
    source: PathBuf,
    strategy: DecodeStrategy,
    _guard: LiveGuard,
}

impl DecodedPreview {
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn strategy(&self) -> DecodeStrategy {
        self.strategy
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl std::fmt::Debug for DecodedPreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedPreview")
            .field("source", &self.source)
            .field("strategy", &self.strategy)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreviewDecoder {
    live: Arc<AtomicUsize>,
}

impl PreviewDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmaps handed out by this decoder and not yet dropped.
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn decode(&self, path: &Path) -> Result<DecodedPreview, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(DecodeError::EmptyFile(path.to_path_buf()));
        }

        let input = DecodeInput::new(path, &bytes);
        for strategy in DecodeStrategy::ORDER {
            if let Some(image) = attempt(strategy, &input) {
                debug!(
                    strategy = ?strategy,
                    width = image.width(),
                    height = image.height(),
                    "Decoded {}",
                    path.display()
                );
                return Ok(DecodedPreview {
                    image,
                    source: path.to_path_buf(),
                    strategy,
                    _guard: LiveGuard::acquire(&self.live),
                });
            }
        }
        Err(DecodeError::Exhausted(path.to_path_buf()))
    }
}

fn attempt(strategy: DecodeStrategy, input: &DecodeInput<'_>) -> Option<DynamicImage> {
    let result = match strategy {
        DecodeStrategy::JpegSignature => {
            if !jpeg::has_signature(input.bytes) {
                return None;
            }
            decode_jpeg(input.bytes)
        }
        DecodeStrategy::Generic => image::load_from_memory(input.bytes).map_err(|e| e.to_string()),
        DecodeStrategy::LegacyContainer => {
            if input.extension != "lrprev" {
                return None;
            }
            decode_jpeg(jpeg::legacy_span(input.bytes)?)
        }
        DecodeStrategy::RawContainer => {
            if input.extension != "dng" {
                return None;
            }
            largest_embedded(input.bytes)
                .map(Ok)
                .unwrap_or_else(|| raw::decode_raw(input.path))
        }
        DecodeStrategy::MarkerScan => decode_jpeg(jpeg::signature_span(input.bytes)?),
        DecodeStrategy::FinalGeneric => image::open(input.path).map_err(|e| e.to_string()),
    };

    match result {
        Ok(image) => Some(image),
        Err(e) => {
            debug!(strategy = ?strategy, "Decode attempt failed for {}: {}", input.path.display(), e);
            None
        }
    }
}

fn decode_jpeg(bytes: &[u8]) -> Result<DynamicImage, String> {
    image::load_from_memory_with_format(bytes, ImageFormat::Jpeg).map_err(|e| e.to_string())
}

/// The decodable embedded JPEG with the most pixels.
fn largest_embedded(bytes: &[u8]) -> Option<DynamicImage> {
    jpeg::embedded_jpegs(bytes)
        .into_iter()
        .filter_map(|span| decode_jpeg(span).ok())
        .max_by_key(|image| u64::from(image.width()) * u64::from(image.height()))
}
