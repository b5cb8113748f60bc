//! Synthetic image data for rendering and normalization tests.
//!
//! All generators return row-major `Vec<f32>` with row 0 at the bottom, the
//! FITS convention, and are deterministic.

/// Creates a test grid with predictable values: `col * 1000 + row`.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Linear ramp from `lo` at the left edge to `hi` at the right edge.
pub fn create_gradient(width: usize, height: usize, lo: f32, hi: f32) -> Vec<f32> {
    let span = (width.max(2) - 1) as f32;
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            data.push(lo + (hi - lo) * col as f32 / span);
        }
    }
    data
}

/// Every pixel set to `value`.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Sky background with gaussian "stars" and a little deterministic noise.
///
/// Background sits near `background`; star peaks reach roughly
/// `background + 50 * noise` so that a handful of pixels are far above the
/// bulk of the distribution, like a real optical plate.
pub fn star_field(width: usize, height: usize, background: f32, noise: f32, seed: u32) -> Vec<f32> {
    let mut rng = Lcg::new(seed);
    let mut data: Vec<f32> = (0..width * height)
        .map(|_| background + noise * (rng.next_f32() - 0.5) * 2.0)
        .collect();

    let stars = (width * height / 400).max(3);
    for _ in 0..stars {
        let cx = rng.next_f32() * width as f32;
        let cy = rng.next_f32() * height as f32;
        let peak = noise * (10.0 + 40.0 * rng.next_f32());
        let sigma = 1.0 + 1.5 * rng.next_f32();
        let reach = (sigma * 4.0).ceil() as i64;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let x = cx as i64 + dx;
                let y = cy as i64 + dy;
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    continue;
                }
                let r2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                data[y as usize * width + x as usize] += peak * (-r2 / (2.0 * sigma * sigma)).exp();
            }
        }
    }
    data
}

/// Copy of `data` with `count` pixels replaced by `value` at spread-out positions.
pub fn with_outliers(mut data: Vec<f32>, count: usize, value: f32) -> Vec<f32> {
    if data.is_empty() {
        return data;
    }
    let step = (data.len() / count.max(1)).max(1);
    for i in (0..data.len()).step_by(step).take(count) {
        data[i] = value;
    }
    data
}

/// Copy of `data` with every `every`-th pixel set to NaN.
pub fn with_nans(mut data: Vec<f32>, every: usize) -> Vec<f32> {
    for i in (0..data.len()).step_by(every.max(1)) {
        data[i] = f32::NAN;
    }
    data
}

/// Minimal linear congruential generator; keeps the crate dependency-free.
struct Lcg(u32);

impl Lcg {
    fn new(seed: u32) -> Self {
        Self(seed.wrapping_mul(2_654_435_761).wrapping_add(1))
    }

    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((self.0 >> 8) & 0xFFFF) as f32 / 65_536.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints() {
        let g = create_gradient(5, 2, 10.0, 20.0);
        assert_eq!(g[0], 10.0);
        assert_eq!(g[4], 20.0);
        assert_eq!(g[5], 10.0);
    }

    #[test]
    fn test_star_field_is_deterministic_and_peaked() {
        let a = star_field(64, 64, 100.0, 5.0, 7);
        let b = star_field(64, 64, 100.0, 5.0, 7);
        assert_eq!(a, b);
        let max = a.iter().cloned().fold(f32::MIN, f32::max);
        assert!(max > 130.0);
        let below: usize = a.iter().filter(|&&v| v < 110.0).count();
        assert!(below > a.len() / 2);
    }

    #[test]
    fn test_with_outliers_and_nans() {
        let d = with_outliers(create_constant_grid(10, 10, 1.0), 4, 1e6);
        assert_eq!(d.iter().filter(|&&v| v == 1e6).count(), 4);
        let n = with_nans(create_constant_grid(10, 10, 1.0), 10);
        assert_eq!(n.iter().filter(|v| v.is_nan()).count(), 10);
    }
}
