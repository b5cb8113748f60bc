//! Primary HDU image decoding.

use tracing::debug;

use crate::header::FitsHeader;
use crate::wcs::Wcs;
use crate::{FitsError, FitsResult};

/// True when `bytes` starts with the mandatory `SIMPLE` card.
pub fn looks_like_fits(bytes: &[u8]) -> bool {
    bytes.len() >= 10 && bytes.starts_with(b"SIMPLE") && &bytes[8..10] == b"= "
}

/// First image plane of a FITS primary HDU.
///
/// Row 0 is the bottom row of the sky image (FITS convention), values are
/// physical (`BZERO + BSCALE * raw`) and undefined pixels are NaN.
#[derive(Debug, Clone)]
pub struct FitsImage {
    header: FitsHeader,
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl FitsImage {
    /// Build an image directly from values, mostly for tests and synthetic data.
    pub fn from_parts(header: FitsHeader, width: usize, height: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            header,
            width,
            height,
            data,
        }
    }

    /// Decode the primary HDU of a FITS stream.
    pub fn from_bytes(bytes: &[u8]) -> FitsResult<Self> {
        if !looks_like_fits(bytes) {
            let preview: String = String::from_utf8_lossy(&bytes[..bytes.len().min(64)])
                .chars()
                .filter(|c| !c.is_control())
                .collect();
            return Err(FitsError::NotFits(preview));
        }

        let (header, data_offset) = FitsHeader::parse(bytes)?;

        let bitpix = header
            .get_int("BITPIX")
            .ok_or(FitsError::MissingKeyword("BITPIX"))?;
        let naxis = header
            .get_int("NAXIS")
            .ok_or(FitsError::MissingKeyword("NAXIS"))?;
        if naxis < 2 {
            return Err(FitsError::NoImage(naxis));
        }

        let width = header
            .get_int("NAXIS1")
            .ok_or(FitsError::MissingKeyword("NAXIS1"))?;
        let height = header
            .get_int("NAXIS2")
            .ok_or(FitsError::MissingKeyword("NAXIS2"))?;
        if width <= 0 || height <= 0 {
            return Err(FitsError::NoImage(naxis));
        }
        let (width, height) = (width as usize, height as usize);

        let bytes_per_value = match bitpix {
            8 => 1,
            16 => 2,
            32 | -32 => 4,
            64 | -64 => 8,
            other => return Err(FitsError::UnsupportedBitpix(other)),
        };

        let plane_len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(bytes_per_value))
            .ok_or(FitsError::TooLarge { width, height })?;
        let available = bytes.len().saturating_sub(data_offset);
        if available < plane_len {
            return Err(FitsError::Truncated {
                expected: plane_len,
                found: available,
            });
        }
        let raw = &bytes[data_offset..data_offset + plane_len];

        let bscale = header.get_float("BSCALE").unwrap_or(1.0);
        let bzero = header.get_float("BZERO").unwrap_or(0.0);
        let blank = header.get_int("BLANK");

        let data = decode_plane(raw, bitpix, bscale, bzero, blank);

        debug!(
            width = width,
            height = height,
            bitpix = bitpix,
            naxis = naxis,
            "Decoded FITS image plane"
        );

        Ok(Self {
            header,
            width,
            height,
            data,
        })
    }

    pub fn header(&self) -> &FitsHeader {
        &self.header
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Value at column `x`, row `y` (row 0 at the bottom).
    pub fn value(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    pub fn finite_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    /// Min and max over finite pixels.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Celestial WCS described by the header, if any.
    pub fn wcs(&self) -> Option<Wcs> {
        Wcs::from_header(&self.header)
    }

    /// Survey name recorded by the provider.
    pub fn survey(&self) -> Option<&str> {
        self.header.get_str("SURVEY")
    }
}

fn decode_plane(raw: &[u8], bitpix: i64, bscale: f64, bzero: f64, blank: Option<i64>) -> Vec<f32> {
    let scale_int = |v: i64| -> f32 {
        if Some(v) == blank {
            f32::NAN
        } else {
            (bzero + bscale * v as f64) as f32
        }
    };
    let scale_float = |v: f64| -> f32 { (bzero + bscale * v) as f32 };

    match bitpix {
        8 => raw.iter().map(|&b| scale_int(b as i64)).collect(),
        16 => raw
            .chunks_exact(2)
            .map(|c| scale_int(i16::from_be_bytes([c[0], c[1]]) as i64))
            .collect(),
        32 => raw
            .chunks_exact(4)
            .map(|c| scale_int(i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as i64))
            .collect(),
        64 => raw
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                scale_int(i64::from_be_bytes(b))
            })
            .collect(),
        -32 => raw
            .chunks_exact(4)
            .map(|c| scale_float(f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64))
            .collect(),
        -64 => raw
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                scale_float(f64::from_be_bytes(b))
            })
            .collect(),
        _ => Vec::new(),
    }
}
