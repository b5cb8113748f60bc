//! FITS reader for survey cutouts.
//!
//! Reads the primary HDU of a FITS stream (the format returned by SkyView),
//! extracts the first image plane as `f32` with BSCALE/BZERO applied, and
//! builds a celestial WCS from the header keywords.
//!
//! Only what cutout rendering needs is supported: no extensions, tables or
//! compressed images.

pub mod header;
pub mod image;
pub mod wcs;

pub use header::{Card, FitsHeader, HeaderValue, BLOCK_SIZE, CARD_SIZE};
pub use image::{looks_like_fits, FitsImage};
pub use wcs::{CelestialFrame, Projection, Wcs};

use sky_common::SkyError;
use thiserror::Error;

/// Errors raised while decoding FITS data.
#[derive(Debug, Error)]
pub enum FitsError {
    #[error("Not a FITS stream: {0}")]
    NotFits(String),

    #[error("Header ended without END card")]
    UnterminatedHeader,

    #[error("Missing required keyword: {0}")]
    MissingKeyword(&'static str),

    #[error("Unsupported BITPIX: {0}")]
    UnsupportedBitpix(i64),

    #[error("Primary HDU has no image plane (NAXIS={0})")]
    NoImage(i64),

    #[error("Data truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("Image plane of {width}x{height} exceeds addressable size")]
    TooLarge { width: usize, height: usize },
}

pub type FitsResult<T> = Result<T, FitsError>;

impl From<FitsError> for SkyError {
    fn from(err: FitsError) -> Self {
        match err {
            FitsError::NoImage(_) => SkyError::EmptyData(err.to_string()),
            other => SkyError::Fits(other.to_string()),
        }
    }
}
