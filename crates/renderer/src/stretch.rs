//! Intensity normalization: zscale interval followed by an asinh stretch.
//!
//! Survey plates have a huge dynamic range dominated by a few saturated
//! stars. The zscale interval picks display limits from a line fitted to
//! the sorted pixel values, ignoring the tails; the asinh stretch then
//! lifts faint structure while keeping bright cores distinguishable.

use rayon::prelude::*;

/// Display limits estimated from a subsample of the data (IRAF zscale).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScaleInterval {
    pub n_samples: usize,
    pub contrast: f64,
    pub max_reject: f64,
    pub min_npixels: usize,
    pub krej: f64,
    pub max_iterations: usize,
}

impl Default for ZScaleInterval {
    fn default() -> Self {
        Self {
            n_samples: 1000,
            contrast: 0.25,
            max_reject: 0.5,
            min_npixels: 5,
            krej: 2.5,
            max_iterations: 5,
        }
    }
}

impl ZScaleInterval {
    /// `(vmin, vmax)` for `values`, or `None` if nothing is finite.
    pub fn limits(&self, values: &[f32]) -> Option<(f64, f64)> {
        let finite_count = values.iter().filter(|v| v.is_finite()).count();
        if finite_count == 0 {
            return None;
        }

        // Only the subsample is materialized.
        let stride = ((finite_count as f64 / self.n_samples as f64) as usize).max(1);
        let mut samples: Vec<f64> = values
            .iter()
            .filter(|v| v.is_finite())
            .step_by(stride)
            .take(self.n_samples)
            .map(|&v| v as f64)
            .collect();
        samples.sort_by(|a, b| a.total_cmp(b));

        let npix = samples.len();
        let mut vmin = samples[0];
        let mut vmax = samples[npix - 1];

        let minpix = self.min_npixels.max((npix as f64 * self.max_reject) as usize);
        let ngrow = ((npix as f64 * 0.01) as usize).max(1);

        let mut badpix = vec![false; npix];
        let mut ngoodpix = npix;
        let mut last_ngoodpix = npix + 1;
        let mut slope = None;

        for _ in 0..self.max_iterations {
            if ngoodpix >= last_ngoodpix || ngoodpix < minpix {
                break;
            }

            let (s, intercept) = match fit_line(&samples, &badpix) {
                Some(fit) => fit,
                None => break,
            };
            slope = Some(s);

            let flat: Vec<f64> = samples
                .iter()
                .enumerate()
                .map(|(i, &v)| v - (intercept + s * i as f64))
                .collect();
            let threshold = self.krej * std_dev(&flat, &badpix);

            for (bad, &f) in badpix.iter_mut().zip(&flat) {
                if f < -threshold || f > threshold {
                    *bad = true;
                }
            }
            badpix = dilate(&badpix, ngrow);

            last_ngoodpix = ngoodpix;
            ngoodpix = badpix.iter().filter(|b| !**b).count();
        }

        if ngoodpix >= minpix {
            if let Some(mut s) = slope {
                if self.contrast > 0.0 {
                    s /= self.contrast;
                }
                let center = ((npix - 1) / 2) as f64;
                let median = median_sorted(&samples);
                vmin = vmin.max(median - (center - 1.0) * s);
                vmax = vmax.min(median + (npix as f64 - center) * s);
            }
        }

        Some((vmin, vmax))
    }
}

/// Weighted least-squares line through `(i, samples[i])` for good pixels.
fn fit_line(samples: &[f64], badpix: &[bool]) -> Option<(f64, f64)> {
    let (mut n, mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (i, (&y, &bad)) in samples.iter().zip(badpix).enumerate() {
        if bad {
            continue;
        }
        let x = i as f64;
        n += 1.0;
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
    }
    let denom = n * sxx - sx * sx;
    if n < 2.0 || denom == 0.0 {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denom;
    let intercept = (sy - slope * sx) / n;
    Some((slope, intercept))
}

fn std_dev(values: &[f64], badpix: &[bool]) -> f64 {
    let good: Vec<f64> = values
        .iter()
        .zip(badpix)
        .filter(|(_, bad)| !**bad)
        .map(|(v, _)| *v)
        .collect();
    if good.is_empty() {
        return 0.0;
    }
    let mean = good.iter().sum::<f64>() / good.len() as f64;
    let var = good.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / good.len() as f64;
    var.sqrt()
}

/// Centred boolean dilation with a window of `ngrow` samples.
fn dilate(mask: &[bool], ngrow: usize) -> Vec<bool> {
    let n = mask.len() as isize;
    let ahead = ((ngrow - 1) / 2) as isize;
    let behind = ngrow as isize - 1 - ahead;
    (0..n)
        .map(|i| {
            let lo = (i - behind).max(0);
            let hi = (i + ahead).min(n - 1);
            (lo..=hi).any(|j| mask[j as usize])
        })
        .collect()
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Inverse hyperbolic sine stretch on `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsinhStretch {
    pub a: f64,
}

impl Default for AsinhStretch {
    fn default() -> Self {
        Self { a: 0.1 }
    }
}

impl AsinhStretch {
    /// Maps 0 to 0 and 1 to 1; input is clipped to `[0, 1]`.
    pub fn apply(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        (x / self.a).asinh() / (1.0 / self.a).asinh()
    }
}

/// Interval plus stretch, fixed to concrete limits for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    vmin: f64,
    vmax: f64,
    stretch: AsinhStretch,
}

impl Normalization {
    /// Compute limits for `values` with the given interval. `None` when the
    /// data has no finite values.
    pub fn fit(values: &[f32], interval: &ZScaleInterval, stretch: AsinhStretch) -> Option<Self> {
        let (vmin, vmax) = interval.limits(values)?;
        Some(Self { vmin, vmax, stretch })
    }

    pub fn vmin(&self) -> f64 {
        self.vmin
    }

    pub fn vmax(&self) -> f64 {
        self.vmax
    }

    /// Normalized display value in `[0, 1]`; NaN for non-finite input.
    pub fn apply(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return f64::NAN;
        }
        let span = self.vmax - self.vmin;
        let x = if span > 0.0 {
            (value - self.vmin) / span
        } else {
            0.0
        };
        self.stretch.apply(x)
    }

    /// Normalize a whole grid in parallel.
    pub fn apply_all(&self, values: &[f32]) -> Vec<f32> {
        values
            .par_iter()
            .map(|&v| self.apply(v as f64) as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_of_linear_ramp() {
        let values: Vec<f32> = (0..1000).map(|v| v as f32).collect();
        let (vmin, vmax) = ZScaleInterval::default().limits(&values).unwrap();
        // Slope 1 / contrast 0.25 widens well past the data, so limits clamp.
        assert_eq!(vmin, 0.0);
        assert_eq!(vmax, 999.0);
    }

    #[test]
    fn test_limits_none_when_nothing_finite() {
        let values = vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY];
        assert!(ZScaleInterval::default().limits(&values).is_none());
    }

    #[test]
    fn test_constant_data() {
        let (vmin, vmax) = ZScaleInterval::default().limits(&[5.0; 100]).unwrap();
        assert_eq!(vmin, 5.0);
        assert_eq!(vmax, 5.0);
        let norm = Normalization::fit(&[5.0; 100], &ZScaleInterval::default(), AsinhStretch::default())
            .unwrap();
        assert_eq!(norm.apply(5.0), 0.0);
    }

    #[test]
    fn test_dilate_window() {
        let mask = [false, false, true, false, false, false];
        assert_eq!(dilate(&mask, 1), mask.to_vec());
        assert_eq!(dilate(&mask, 3), vec![false, true, true, true, false, false]);
    }

    #[test]
    fn test_asinh_endpoints_and_clipping() {
        let s = AsinhStretch::default();
        assert_eq!(s.apply(0.0), 0.0);
        assert!((s.apply(1.0) - 1.0).abs() < 1e-12);
        assert_eq!(s.apply(-3.0), 0.0);
        assert!((s.apply(7.0) - 1.0).abs() < 1e-12);
        // Faint values are lifted.
        assert!(s.apply(0.1) > 0.3);
    }

    #[test]
    fn test_normalization_keeps_nan() {
        let norm = Normalization::fit(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], &ZScaleInterval::default(), AsinhStretch::default())
            .unwrap();
        assert!(norm.apply(f64::NAN).is_nan());
        let out = norm.apply_all(&[0.0, f32::NAN, 5.0]);
        assert_eq!(out[0], 0.0);
        assert!(out[1].is_nan());
        assert!((out[2] - 1.0).abs() < 1e-6);
    }
}
