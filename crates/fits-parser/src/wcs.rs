//! Celestial world coordinate systems (FITS WCS papers I and II).
//!
//! Pixel → intermediate world coordinates through CRPIX/CD, then a
//! projection to native spherical coordinates, then a spherical rotation to
//! celestial longitude/latitude. All angles are in degrees; pixel
//! coordinates passed in and out are 0-based.

use crate::header::FitsHeader;

const R0: f64 = 180.0 / std::f64::consts::PI;

/// Sky projection named by the last three letters of CTYPEn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Gnomonic.
    Tan,
    /// Orthographic.
    Sin,
    /// Plate carrée.
    Car,
    /// Hammer-Aitoff.
    Ait,
    /// Unsupported or absent code; treated as a flat offset from CRVAL.
    Linear,
}

impl Projection {
    pub fn from_ctype(ctype: &str) -> Self {
        let code = ctype.trim().rsplit('-').next().unwrap_or("");
        match code.to_ascii_uppercase().as_str() {
            "TAN" => Projection::Tan,
            "SIN" => Projection::Sin,
            "CAR" => Projection::Car,
            "AIT" => Projection::Ait,
            _ => Projection::Linear,
        }
    }

    /// Native latitude of the fiducial point.
    fn theta0(&self) -> f64 {
        match self {
            Projection::Tan | Projection::Sin => 90.0,
            _ => 0.0,
        }
    }

    /// Native (phi, theta) → projection-plane (x, y).
    fn project(&self, phi: f64, theta: f64) -> Option<(f64, f64)> {
        let (sp, cp) = phi.to_radians().sin_cos();
        match self {
            Projection::Tan => {
                if theta <= 0.0 {
                    return None;
                }
                let r = R0 / theta.to_radians().tan();
                Some((r * sp, -r * cp))
            }
            Projection::Sin => {
                if theta < 0.0 {
                    return None;
                }
                let r = R0 * theta.to_radians().cos();
                Some((r * sp, -r * cp))
            }
            Projection::Car => Some((wrap180(phi), theta)),
            Projection::Ait => {
                let (st, ct) = theta.to_radians().sin_cos();
                let half = (phi / 2.0).to_radians();
                let gamma = R0 * (2.0 / (1.0 + ct * half.cos())).sqrt();
                Some((2.0 * gamma * ct * half.sin(), gamma * st))
            }
            Projection::Linear => Some((phi, theta)),
        }
    }

    /// Projection-plane (x, y) → native (phi, theta).
    fn deproject(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        match self {
            Projection::Tan => {
                let r = x.hypot(y);
                let phi = x.atan2(-y).to_degrees();
                let theta = R0.atan2(r).to_degrees();
                Some((phi, theta))
            }
            Projection::Sin => {
                let r = x.hypot(y);
                if r > R0 {
                    return None;
                }
                let phi = x.atan2(-y).to_degrees();
                let theta = (r / R0).acos().to_degrees();
                Some((phi, theta))
            }
            Projection::Car => {
                if y.abs() > 90.0 {
                    return None;
                }
                Some((x, y))
            }
            Projection::Ait => {
                let zz = 1.0 - (x / (4.0 * R0)).powi(2) - (y / (2.0 * R0)).powi(2);
                if zz < 0.5 {
                    return None;
                }
                let z = zz.sqrt();
                let phi = 2.0 * (z * x / (2.0 * R0)).atan2(2.0 * zz - 1.0).to_degrees();
                let theta = (y * z / R0).clamp(-1.0, 1.0).asin().to_degrees();
                Some((phi, theta))
            }
            Projection::Linear => Some((x, y)),
        }
    }
}

/// Celestial frame implied by the longitude axis type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CelestialFrame {
    Equatorial,
    Galactic,
    Ecliptic,
    Unknown,
}

impl CelestialFrame {
    fn from_ctype(ctype: &str) -> Self {
        let axis = ctype.split('-').next().unwrap_or("").to_ascii_uppercase();
        match axis.as_str() {
            "RA" => CelestialFrame::Equatorial,
            "GLON" => CelestialFrame::Galactic,
            "ELON" => CelestialFrame::Ecliptic,
            _ => CelestialFrame::Unknown,
        }
    }

    /// Axis names for (longitude, latitude).
    pub fn axis_names(&self) -> (&'static str, &'static str) {
        match self {
            CelestialFrame::Equatorial => ("Right Ascension", "Declination"),
            CelestialFrame::Galactic => ("Galactic Longitude", "Galactic Latitude"),
            CelestialFrame::Ecliptic => ("Ecliptic Longitude", "Ecliptic Latitude"),
            CelestialFrame::Unknown => ("Longitude", "Latitude"),
        }
    }
}

/// Pixel ↔ sky mapping for a 2D celestial image.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    crpix: [f64; 2],
    crval: [f64; 2],
    cd: [[f64; 2]; 2],
    cd_inv: [[f64; 2]; 2],
    projection: Projection,
    frame: CelestialFrame,
    equinox: Option<f64>,
    alpha_p: f64,
    delta_p: f64,
    phi_p: f64,
}

impl Wcs {
    /// Build from CTYPE/CRPIX/CRVAL plus CD, PC+CDELT, or CDELT+CROTA2.
    ///
    /// Returns `None` when the header has no usable celestial axes (missing
    /// keywords, latitude-first axis order, singular matrix).
    pub fn from_header(header: &FitsHeader) -> Option<Self> {
        let ctype1 = header.get_str("CTYPE1")?;
        let ctype2 = header.get_str("CTYPE2")?;
        let lat_first = ["DEC", "GLAT", "ELAT"]
            .iter()
            .any(|p| ctype1.to_ascii_uppercase().starts_with(p));
        if lat_first {
            tracing::debug!(ctype1 = ctype1, ctype2 = ctype2, "Latitude-first WCS axes not supported");
            return None;
        }

        let crpix = [header.get_float("CRPIX1")?, header.get_float("CRPIX2")?];
        let crval = [header.get_float("CRVAL1")?, header.get_float("CRVAL2")?];
        let cd = linear_matrix(header)?;
        let projection = Projection::from_ctype(ctype1);
        let frame = CelestialFrame::from_ctype(ctype1);
        let equinox = header.get_float("EQUINOX").or_else(|| header.get_float("EPOCH"));

        Self::new(crpix, crval, cd, projection, frame, equinox)
    }

    /// Construct from explicit parameters. `crpix` is 1-based as in FITS.
    pub fn new(
        crpix: [f64; 2],
        crval: [f64; 2],
        cd: [[f64; 2]; 2],
        projection: Projection,
        frame: CelestialFrame,
        equinox: Option<f64>,
    ) -> Option<Self> {
        let det = cd[0][0] * cd[1][1] - cd[0][1] * cd[1][0];
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let cd_inv = [
            [cd[1][1] / det, -cd[0][1] / det],
            [-cd[1][0] / det, cd[0][0] / det],
        ];

        let (alpha_p, delta_p, phi_p) = celestial_pole(projection, crval);

        Some(Self {
            crpix,
            crval,
            cd,
            cd_inv,
            projection,
            frame,
            equinox,
            alpha_p,
            delta_p,
            phi_p,
        })
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn frame(&self) -> CelestialFrame {
        self.frame
    }

    pub fn equinox(&self) -> Option<f64> {
        self.equinox
    }

    /// World coordinates of the reference pixel.
    pub fn reference(&self) -> (f64, f64) {
        (self.crval[0], self.crval[1])
    }

    /// Approximate pixel scale in degrees along each axis.
    pub fn pixel_scale(&self) -> (f64, f64) {
        (
            self.cd[0][0].hypot(self.cd[1][0]),
            self.cd[0][1].hypot(self.cd[1][1]),
        )
    }

    /// 0-based pixel → (longitude in [0, 360), latitude).
    pub fn pixel_to_world(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let dx = x + 1.0 - self.crpix[0];
        let dy = y + 1.0 - self.crpix[1];
        let ix = self.cd[0][0] * dx + self.cd[0][1] * dy;
        let iy = self.cd[1][0] * dx + self.cd[1][1] * dy;

        if self.projection == Projection::Linear {
            return Some((wrap360(self.crval[0] + ix), self.crval[1] + iy));
        }

        let (phi, theta) = self.projection.deproject(ix, iy)?;
        let (lon, lat) = native_to_celestial(phi, theta, self.alpha_p, self.delta_p, self.phi_p);
        Some((wrap360(lon), lat))
    }

    /// (longitude, latitude) → 0-based pixel.
    pub fn world_to_pixel(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let (ix, iy) = if self.projection == Projection::Linear {
            (wrap180(lon - self.crval[0]), lat - self.crval[1])
        } else {
            let (phi, theta) = celestial_to_native(lon, lat, self.alpha_p, self.delta_p, self.phi_p);
            self.projection.project(phi, theta)?
        };

        let dx = self.cd_inv[0][0] * ix + self.cd_inv[0][1] * iy;
        let dy = self.cd_inv[1][0] * ix + self.cd_inv[1][1] * iy;
        Some((dx + self.crpix[0] - 1.0, dy + self.crpix[1] - 1.0))
    }
}

/// CD matrix from whichever convention the header uses.
fn linear_matrix(header: &FitsHeader) -> Option<[[f64; 2]; 2]> {
    let has_cd = ["CD1_1", "CD1_2", "CD2_1", "CD2_2"]
        .iter()
        .any(|k| header.contains(k));
    if has_cd {
        let get = |k: &str| header.get_float(k).unwrap_or(0.0);
        return Some([[get("CD1_1"), get("CD1_2")], [get("CD2_1"), get("CD2_2")]]);
    }

    let cdelt1 = header.get_float("CDELT1")?;
    let cdelt2 = header.get_float("CDELT2")?;

    let has_pc = ["PC1_1", "PC1_2", "PC2_1", "PC2_2"]
        .iter()
        .any(|k| header.contains(k));
    let pc = if has_pc {
        [
            [
                header.get_float("PC1_1").unwrap_or(1.0),
                header.get_float("PC1_2").unwrap_or(0.0),
            ],
            [
                header.get_float("PC2_1").unwrap_or(0.0),
                header.get_float("PC2_2").unwrap_or(1.0),
            ],
        ]
    } else {
        let rho = header.get_float("CROTA2").unwrap_or(0.0).to_radians();
        let (s, c) = rho.sin_cos();
        // CROTA2 expressed as a PC matrix; the cdelt ratio keeps the rotation orthogonal.
        [[c, -s * cdelt2 / cdelt1], [s * cdelt1 / cdelt2, c]]
    };

    Some([
        [cdelt1 * pc[0][0], cdelt1 * pc[0][1]],
        [cdelt2 * pc[1][0], cdelt2 * pc[1][1]],
    ])
}

/// Celestial coordinates (alpha_p, delta_p) of the native pole and the
/// native longitude phi_p of the celestial pole, using default LONPOLE and
/// LATPOLE.
fn celestial_pole(projection: Projection, crval: [f64; 2]) -> (f64, f64, f64) {
    let (alpha0, delta0) = (crval[0], crval[1]);
    if projection.theta0() == 90.0 {
        let phi_p = if delta0 >= 90.0 { 0.0 } else { 180.0 };
        return (alpha0, delta0, phi_p);
    }
    // theta0 = 0: reference point on the native equator.
    if delta0 >= 0.0 {
        (alpha0 - 180.0, 90.0 - delta0, 0.0)
    } else {
        (alpha0, 90.0 + delta0, 180.0)
    }
}

fn native_to_celestial(phi: f64, theta: f64, alpha_p: f64, delta_p: f64, phi_p: f64) -> (f64, f64) {
    let (st, ct) = theta.to_radians().sin_cos();
    let (sd, cd) = delta_p.to_radians().sin_cos();
    let (sdp, cdp) = (phi - phi_p).to_radians().sin_cos();

    let lon = alpha_p + (-ct * sdp).atan2(st * cd - ct * sd * cdp).to_degrees();
    let lat = (st * sd + ct * cd * cdp).clamp(-1.0, 1.0).asin().to_degrees();
    (lon, lat)
}

fn celestial_to_native(lon: f64, lat: f64, alpha_p: f64, delta_p: f64, phi_p: f64) -> (f64, f64) {
    let (sl, cl) = lat.to_radians().sin_cos();
    let (sd, cd) = delta_p.to_radians().sin_cos();
    let (sda, cda) = (lon - alpha_p).to_radians().sin_cos();

    let phi = phi_p + (-cl * sda).atan2(sl * cd - cl * sd * cda).to_degrees();
    let theta = (sl * sd + cl * cd * cda).clamp(-1.0, 1.0).asin().to_degrees();
    (wrap180(phi), theta)
}

/// Wrap an angle into [0, 360).
pub fn wrap360(deg: f64) -> f64 {
    let w = deg.rem_euclid(360.0);
    if w >= 360.0 {
        0.0
    } else {
        w
    }
}

/// Wrap an angle into (-180, 180].
pub fn wrap180(deg: f64) -> f64 {
    let w = wrap360(deg);
    if w > 180.0 {
        w - 360.0
    } else {
        w
    }
}
