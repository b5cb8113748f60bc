//! Tick spacing and labels for sky axes.

/// How values on an axis are labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFormat {
    /// Right ascension in hours, minutes, seconds.
    Hours,
    /// Signed degrees, arcminutes, arcseconds.
    Degrees,
    /// Decimal degrees (galactic and ecliptic frames).
    DecimalDegrees,
    /// Plain numbers (pixel indices, colorbar values).
    Plain,
}

/// Candidate RA steps in seconds of time.
const HOUR_STEPS_SEC: &[f64] = &[
    0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0,
    1200.0, 1800.0, 3600.0, 7200.0, 10800.0, 21600.0, 43200.0,
];

/// Candidate Dec steps in arcseconds.
const DEGREE_STEPS_ARCSEC: &[f64] = &[
    0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0,
    1200.0, 1800.0, 3600.0, 7200.0, 18000.0, 36000.0, 54000.0, 108000.0, 162000.0,
];

/// Step (in axis units, degrees for sky formats) giving at most `max_ticks`
/// ticks across `span`.
pub fn choose_step(span: f64, format: TickFormat, max_ticks: usize) -> f64 {
    let span = span.abs();
    let max_ticks = max_ticks.max(1) as f64;
    if !span.is_finite() || span == 0.0 {
        return match format {
            TickFormat::Hours => 15.0,
            TickFormat::Degrees | TickFormat::DecimalDegrees => 1.0,
            TickFormat::Plain => 1.0,
        };
    }

    let pick = |candidates: &[f64], unit: f64| -> f64 {
        candidates
            .iter()
            .map(|c| c / unit)
            .find(|step| span / step <= max_ticks)
            .unwrap_or_else(|| candidates[candidates.len() - 1] / unit)
    };

    match format {
        TickFormat::Hours => pick(HOUR_STEPS_SEC, 240.0),
        TickFormat::Degrees => pick(DEGREE_STEPS_ARCSEC, 3600.0),
        TickFormat::DecimalDegrees | TickFormat::Plain => nice_decimal_step(span, max_ticks),
    }
}

/// Smallest 1/2/5 x 10^k step with at most `max_ticks` ticks across `span`.
fn nice_decimal_step(span: f64, max_ticks: f64) -> f64 {
    let raw = span / max_ticks;
    let magnitude = 10f64.powf(raw.log10().floor());
    for mult in [1.0, 2.0, 5.0, 10.0] {
        let step = mult * magnitude;
        if span / step <= max_ticks {
            return step;
        }
    }
    10.0 * magnitude
}

/// Multiples of `step` within `[lo, hi]`.
pub fn tick_values(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !lo.is_finite() || !hi.is_finite() {
        return Vec::new();
    }
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).take(1000).map(|i| i as f64 * step).collect()
}

/// Label for `value` given the tick `step` it was generated with.
pub fn format_tick(value: f64, step: f64, format: TickFormat) -> String {
    match format {
        TickFormat::Hours => format_hms(value, step * 240.0),
        TickFormat::Degrees => format_dms(value, step * 3600.0),
        TickFormat::DecimalDegrees => format!("{}°", format_decimal(value, step)),
        TickFormat::Plain => format_decimal(value, step),
    }
}

fn decimals_for(step: f64) -> usize {
    if step >= 1.0 || step <= 0.0 {
        0
    } else {
        (-step.log10()).ceil().max(0.0) as usize
    }
}

fn format_decimal(value: f64, step: f64) -> String {
    let decimals = decimals_for(step);
    let s = format!("{:.*}", decimals, value);
    // Avoid "-0" style labels.
    if s.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        s.trim_start_matches('-').to_string()
    } else {
        s
    }
}

/// RA label. `step_sec` is the tick step in seconds of time.
fn format_hms(deg: f64, step_sec: f64) -> String {
    let total_sec = deg.rem_euclid(360.0) * 240.0;
    if step_sec >= 3600.0 {
        let h = (total_sec / 3600.0).round() as i64 % 24;
        return format!("{}h", h);
    }
    if step_sec >= 60.0 {
        let total_min = (total_sec / 60.0).round() as i64 % (24 * 60);
        return format!("{}h{:02}m", total_min / 60, total_min % 60);
    }

    let decimals = decimals_for(step_sec);
    let scale = 10f64.powi(decimals as i32);
    let units = (total_sec * scale).round() as i64 % (86_400 * scale as i64);
    let per_min = 60 * scale as i64;
    let h = units / (60 * per_min);
    let m = (units / per_min) % 60;
    let s = (units % per_min) as f64 / scale;
    if decimals == 0 {
        format!("{}h{:02}m{:02}s", h, m, s as i64)
    } else {
        format!("{}h{:02}m{:0width$.prec$}s", h, m, s, width = decimals + 3, prec = decimals)
    }
}

/// Signed Dec label. `step_arcsec` is the tick step in arcseconds.
fn format_dms(deg: f64, step_arcsec: f64) -> String {
    let sign = if deg < 0.0 { '-' } else { '+' };
    let total_arcsec = deg.abs() * 3600.0;

    let label = if step_arcsec >= 3600.0 {
        format!("{}°", (total_arcsec / 3600.0).round() as i64)
    } else if step_arcsec >= 60.0 {
        let total_min = (total_arcsec / 60.0).round() as i64;
        format!("{}°{:02}′", total_min / 60, total_min % 60)
    } else {
        let decimals = decimals_for(step_arcsec);
        let scale = 10f64.powi(decimals as i32);
        let units = (total_arcsec * scale).round() as i64;
        let per_min = 60 * scale as i64;
        let d = units / (60 * per_min);
        let m = (units / per_min) % 60;
        let s = (units % per_min) as f64 / scale;
        if decimals == 0 {
            format!("{}°{:02}′{:02}″", d, m, s as i64)
        } else {
            format!("{}°{:02}′{:0width$.prec$}″", d, m, s, width = decimals + 3, prec = decimals)
        }
    };

    if label.starts_with("0°") && label.chars().all(|c| !c.is_ascii_digit() || c == '0') {
        label
    } else {
        format!("{}{}", sign, label)
    }
}
