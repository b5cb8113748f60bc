//! Normalization behaviour on synthetic sky images.

use renderer::{AsinhStretch, Normalization, ZScaleInterval};
use test_utils::{create_gradient, star_field, with_nans, with_outliers};

#[test]
fn test_zscale_ignores_outliers() {
    let clean = star_field(128, 128, 1000.0, 20.0, 42);
    let dirty = with_outliers(clean.clone(), 40, 1.0e7);

    let interval = ZScaleInterval::default();
    let (_, vmax_clean) = interval.limits(&clean).unwrap();
    let (vmin, vmax) = interval.limits(&dirty).unwrap();

    assert!(vmax < 1.0e5, "vmax {} pulled up by outliers", vmax);
    assert!(vmin > 900.0 && vmin < 1000.0, "vmin {}", vmin);
    assert!((vmax - vmax_clean).abs() < 200.0);
}

#[test]
fn test_zscale_skips_non_finite() {
    let data = with_nans(create_gradient(64, 64, 0.0, 100.0), 3);
    let (vmin, vmax) = ZScaleInterval::default().limits(&data).unwrap();
    assert!(vmin.is_finite() && vmax.is_finite());
    assert!(vmin >= 0.0 && vmax <= 100.0);
    assert!(vmin < vmax);
}

#[test]
fn test_zscale_samples_finite_pixels_only() {
    let finite = star_field(256, 256, 1000.0, 20.0, 7);
    // The same finite values with a NaN between each pair.
    let mut sparse = Vec::with_capacity(finite.len() * 2);
    for &v in &finite {
        sparse.push(v);
        sparse.push(f32::NAN);
    }

    let interval = ZScaleInterval::default();
    assert_eq!(interval.limits(&sparse), interval.limits(&finite));
    assert_eq!(interval.limits(&[f32::NAN; 16]), None);
}

#[test]
fn test_zscale_limits_stay_inside_data_range() {
    for seed in 0..5 {
        let data = star_field(96, 64, 50.0, 3.0, seed);
        let lo = data.iter().cloned().fold(f32::MAX, f32::min) as f64;
        let hi = data.iter().cloned().fold(f32::MIN, f32::max) as f64;
        let (vmin, vmax) = ZScaleInterval::default().limits(&data).unwrap();
        assert!(vmin >= lo && vmax <= hi && vmin <= vmax, "seed {}", seed);
    }
}

#[test]
fn test_asinh_stretch_monotone_with_fixed_endpoints() {
    let stretch = AsinhStretch::default();
    assert_eq!(stretch.apply(0.0), 0.0);
    assert!((stretch.apply(1.0) - 1.0).abs() < 1e-12);

    let mut prev = -1.0;
    for i in 0..=1000 {
        let y = stretch.apply(i as f64 / 1000.0);
        assert!(y > prev, "not increasing at {}", i);
        assert!((0.0..=1.0 + 1e-12).contains(&y));
        prev = y;
    }
}

#[test]
fn test_normalization_output_range() {
    let data = with_outliers(star_field(64, 64, 200.0, 10.0, 9), 5, -1.0e6);
    let norm = Normalization::fit(&data, &ZScaleInterval::default(), AsinhStretch::default())
        .unwrap();
    let out = norm.apply_all(&data);
    assert_eq!(out.len(), data.len());
    assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    // Clipped outliers sit at the floor.
    assert_eq!(out.iter().cloned().fold(f32::MAX, f32::min), 0.0);
}
