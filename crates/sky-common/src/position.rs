//! Sky position queries: a named target or an explicit RA/Dec pair.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SkyError, SkyResult};

/// Where on the sky a cutout is centred.
///
/// Names are passed to the survey service untouched and resolved there
/// (SIMBAD/NED); coordinates are J2000 decimal degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PositionQuery {
    Name { name: String },
    Coordinates { ra: f64, dec: f64 },
}

impl PositionQuery {
    /// Resolve loosely supplied inputs into a single position.
    ///
    /// A non-blank name always wins. Otherwise both angles are required and
    /// must be finite, with `ra` in `[0, 360]` and `dec` in `[-90, 90]`.
    pub fn resolve(name: Option<&str>, ra: Option<f64>, dec: Option<f64>) -> SkyResult<Self> {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            return Ok(PositionQuery::Name {
                name: name.to_string(),
            });
        }

        match (ra, dec) {
            (Some(ra), Some(dec)) => Self::coordinates(ra, dec),
            _ => Err(SkyError::invalid("Provide either target or (ra, dec)")),
        }
    }

    /// Build a validated coordinate position.
    pub fn coordinates(ra: f64, dec: f64) -> SkyResult<Self> {
        if !ra.is_finite() || !dec.is_finite() {
            return Err(SkyError::invalid("ra and dec must be finite"));
        }
        if !(0.0..=360.0).contains(&ra) {
            return Err(SkyError::invalid(format!(
                "ra must be within [0, 360] degrees, got {}",
                ra
            )));
        }
        if !(-90.0..=90.0).contains(&dec) {
            return Err(SkyError::invalid(format!(
                "dec must be within [-90, 90] degrees, got {}",
                dec
            )));
        }
        Ok(PositionQuery::Coordinates { ra, dec })
    }

    /// Canonical position string sent upstream and used for the cache key.
    pub fn canonical(&self) -> String {
        match self {
            PositionQuery::Name { name } => name.clone(),
            PositionQuery::Coordinates { ra, dec } => format!("{} {}", ra, dec),
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, PositionQuery::Name { .. })
    }
}

impl fmt::Display for PositionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_returned_verbatim() {
        let pos = PositionQuery::resolve(Some("NGC 1300"), None, None).unwrap();
        assert_eq!(pos.canonical(), "NGC 1300");
        assert!(pos.is_named());
    }

    #[test]
    fn test_name_wins_over_coordinates() {
        let pos = PositionQuery::resolve(Some("M51"), Some(10.0), Some(20.0)).unwrap();
        assert_eq!(pos.canonical(), "M51");
    }

    #[test]
    fn test_blank_name_falls_back_to_coordinates() {
        let pos = PositionQuery::resolve(Some("   "), Some(10.5), Some(41.2)).unwrap();
        assert_eq!(pos.canonical(), "10.5 41.2");
    }

    #[test]
    fn test_missing_everything_is_rejected() {
        let err = PositionQuery::resolve(None, None, None).unwrap_err();
        assert!(matches!(err, SkyError::InvalidQuery(_)));
    }

    #[test]
    fn test_half_pair_is_rejected() {
        assert!(PositionQuery::resolve(None, Some(10.0), None).is_err());
        assert!(PositionQuery::resolve(Some(""), None, Some(10.0)).is_err());
    }

    #[test]
    fn test_non_finite_angles_are_rejected() {
        assert!(PositionQuery::resolve(None, Some(f64::NAN), Some(0.0)).is_err());
        assert!(PositionQuery::resolve(None, Some(0.0), Some(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_out_of_range_angles_are_rejected() {
        assert!(PositionQuery::coordinates(-1.0, 0.0).is_err());
        assert!(PositionQuery::coordinates(360.5, 0.0).is_err());
        assert!(PositionQuery::coordinates(10.0, 90.5).is_err());
        assert!(PositionQuery::coordinates(10.0, -90.0).is_ok());
    }
}
