//! Synthetic FITS streams and well-known sky positions.
//!
//! [`FitsFixture`] writes a minimal primary HDU the way survey services do:
//! 80-column header cards, `END`, padding to 2880-byte blocks, big-endian
//! data. Tests use it instead of checked-in survey files.

/// Well-known targets in J2000 decimal degrees.
pub mod positions {
    /// Whirlpool galaxy.
    pub const M51: (f64, f64) = (202.469_575, 47.195_258);

    /// Andromeda galaxy.
    pub const M31: (f64, f64) = (10.684_708, 41.268_75);

    /// Celestial north pole.
    pub const NORTH_POLE: (f64, f64) = (0.0, 90.0);

    /// Close to RA = 0h, exercises longitude wrap.
    pub const RA_WRAP: (f64, f64) = (359.9, -12.5);
}

/// Survey names as SkyView spells them.
pub mod surveys {
    pub const DSS2_RED: &str = "DSS2 Red";
    pub const DSS: &str = "DSS";
    pub const WISE_34: &str = "WISE 3.4";
}

/// Body SkyView returns when a survey has no coverage at the position.
pub const NO_DATA_BODY: &str =
    "<html><body><h2>No data</h2>No survey data available at this position.</body></html>";

const BLOCK: usize = 2880;
const CARD: usize = 80;

/// Builder for an in-memory FITS stream with a single 2D image.
#[derive(Debug, Clone)]
pub struct FitsFixture {
    width: usize,
    height: usize,
    bitpix: i32,
    data: Vec<f32>,
    bscale: f64,
    bzero: f64,
    blank: Option<i64>,
    cards: Vec<String>,
    naxis_override: Option<usize>,
    truncate_to: Option<usize>,
}

impl FitsFixture {
    /// A `width` x `height` image of zeros, BITPIX -32.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bitpix: -32,
            data: vec![0.0; width * height],
            bscale: 1.0,
            bzero: 0.0,
            blank: None,
            cards: Vec::new(),
            naxis_override: None,
            truncate_to: None,
        }
    }

    /// Row-major physical values, row 0 at the bottom.
    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), self.width * self.height, "data size mismatch");
        self.data = data;
        self
    }

    pub fn bitpix(mut self, bitpix: i32) -> Self {
        self.bitpix = bitpix;
        self
    }

    /// BSCALE/BZERO written to the header; integer data is stored scaled back.
    pub fn scaling(mut self, bscale: f64, bzero: f64) -> Self {
        self.bscale = bscale;
        self.bzero = bzero;
        self
    }

    /// BLANK value for integer data; NaN samples are written as this value.
    pub fn blank(mut self, blank: i64) -> Self {
        self.blank = Some(blank);
        self
    }

    /// Write a header with `NAXIS = naxis` and no data, as for an empty HDU.
    pub fn naxis(mut self, naxis: usize) -> Self {
        self.naxis_override = Some(naxis);
        self
    }

    /// Cut the stream to `len` bytes.
    pub fn truncate(mut self, len: usize) -> Self {
        self.truncate_to = Some(len);
        self
    }

    pub fn card_str(mut self, key: &str, value: &str) -> Self {
        let quoted = format!("'{:<8}'", value.replace('\'', "''"));
        self.cards.push(format!("{:<8}= {:<20}", key, quoted));
        self
    }

    pub fn card_float(mut self, key: &str, value: f64) -> Self {
        self.cards
            .push(format!("{:<8}= {:>20}", key, format!("{:E}", value)));
        self
    }

    pub fn card_int(mut self, key: &str, value: i64) -> Self {
        self.cards.push(format!("{:<8}= {:>20}", key, value));
        self
    }

    /// Equatorial gnomonic WCS centred on (`ra`, `dec`) with square pixels
    /// of `scale_deg`, RA increasing to the left.
    pub fn tan_wcs(self, ra: f64, dec: f64, scale_deg: f64) -> Self {
        self.celestial_wcs("RA---TAN", "DEC--TAN", ra, dec, scale_deg)
    }

    /// Equatorial plate carrée WCS, SkyView's default for the web UI.
    pub fn car_wcs(self, ra: f64, dec: f64, scale_deg: f64) -> Self {
        self.celestial_wcs("RA---CAR", "DEC--CAR", ra, dec, scale_deg)
    }

    /// Galactic plate carrée WCS.
    pub fn galactic_wcs(self, glon: f64, glat: f64, scale_deg: f64) -> Self {
        self.celestial_wcs("GLON-CAR", "GLAT-CAR", glon, glat, scale_deg)
    }

    fn celestial_wcs(self, ctype1: &str, ctype2: &str, lon: f64, lat: f64, scale: f64) -> Self {
        let crpix1 = (self.width as f64 + 1.0) / 2.0;
        let crpix2 = (self.height as f64 + 1.0) / 2.0;
        self.card_str("CTYPE1", ctype1)
            .card_str("CTYPE2", ctype2)
            .card_float("CRPIX1", crpix1)
            .card_float("CRPIX2", crpix2)
            .card_float("CRVAL1", lon)
            .card_float("CRVAL2", lat)
            .card_float("CDELT1", -scale)
            .card_float("CDELT2", scale)
            .card_float("EQUINOX", 2000.0)
    }

    /// Serialize to FITS bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = Vec::new();
        header.push(format!("{:<8}= {:>20}", "SIMPLE", "T"));
        header.push(format!("{:<8}= {:>20}", "BITPIX", self.bitpix));

        let naxis = self.naxis_override.unwrap_or(2);
        header.push(format!("{:<8}= {:>20}", "NAXIS", naxis));
        if naxis >= 1 {
            header.push(format!("{:<8}= {:>20}", "NAXIS1", self.width));
        }
        if naxis >= 2 {
            header.push(format!("{:<8}= {:>20}", "NAXIS2", self.height));
        }
        if self.bitpix > 0 {
            if self.bscale != 1.0 || self.bzero != 0.0 {
                header.push(format!("{:<8}= {:>20}", "BSCALE", format!("{:E}", self.bscale)));
                header.push(format!("{:<8}= {:>20}", "BZERO", format!("{:E}", self.bzero)));
            }
            if let Some(blank) = self.blank {
                header.push(format!("{:<8}= {:>20}", "BLANK", blank));
            }
        }
        header.extend(self.cards.iter().cloned());
        header.push("END".to_string());

        let mut out = Vec::new();
        for card in header {
            let mut line = format!("{:<80}", card).into_bytes();
            line.truncate(CARD);
            out.extend(line);
        }
        pad(&mut out, b' ');

        if naxis >= 2 {
            for &value in &self.data {
                self.encode_value(value, &mut out);
            }
            pad(&mut out, 0);
        }

        if let Some(len) = self.truncate_to {
            out.truncate(len);
        }
        out
    }

    fn encode_value(&self, value: f32, out: &mut Vec<u8>) {
        let stored = |v: f32| -> i64 {
            if v.is_nan() {
                self.blank.unwrap_or(0)
            } else {
                ((v as f64 - self.bzero) / self.bscale).round() as i64
            }
        };
        match self.bitpix {
            8 => out.push(stored(value) as u8),
            16 => out.extend((stored(value) as i16).to_be_bytes()),
            32 => out.extend((stored(value) as i32).to_be_bytes()),
            64 => out.extend(stored(value).to_be_bytes()),
            -32 => out.extend(value.to_be_bytes()),
            -64 => out.extend((value as f64).to_be_bytes()),
            other => panic!("unsupported BITPIX {}", other),
        }
    }
}

fn pad(buf: &mut Vec<u8>, fill: u8) {
    let padded = buf.len().div_ceil(BLOCK) * BLOCK;
    buf.resize(padded, fill);
}
