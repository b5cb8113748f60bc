//! Annotated cutout figure.
//!
//! Layout of the square canvas, top to bottom: title, image panel with a
//! colorbar on its right, then tick labels and axis labels. The image is
//! drawn with the lower-left origin of FITS data, the gray colormap and the
//! zscale + asinh normalization; the coordinate grid follows the WCS.

use fits_parser::{CelestialFrame, FitsImage, Wcs};
use image::imageops::{self, FilterType};
use image::GrayImage;
use sky_common::{SkyError, SkyResult};
use tiny_skia::{
    Color, FillRule, LineCap, Mask, Paint, PathBuilder, Pixmap, Rect, Stroke, StrokeDash,
    Transform,
};
use tracing::debug;

use crate::png::create_png_auto;
use crate::stretch::{AsinhStretch, Normalization, ZScaleInterval};
use crate::text::{Anchor, TextLayer};
use crate::ticks::{choose_step, format_tick, tick_values, TickFormat};

/// Default canvas edge: a 6 inch figure at 200 dpi.
pub const DEFAULT_FIGURE_SIZE: u32 = 1200;

/// Reference canvas size that all layout constants are expressed in.
const BASE: f32 = 1200.0;

/// Rendering parameters for [`render_cutout`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Width and height of the output PNG in pixels.
    pub figure_size: u32,
    pub title: Option<String>,
    pub colorbar_label: String,
    pub grid: bool,
    pub interval: ZScaleInterval,
    pub stretch: AsinhStretch,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            figure_size: DEFAULT_FIGURE_SIZE,
            title: None,
            colorbar_label: "Arbitrary units".to_string(),
            grid: true,
            interval: ZScaleInterval::default(),
            stretch: AsinhStretch::default(),
        }
    }
}

impl RenderOptions {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Render `image` into an annotated PNG.
///
/// Fails with `EmptyData` when the image has no finite pixels.
pub fn render_cutout(image: &FitsImage, options: &RenderOptions) -> SkyResult<Vec<u8>> {
    let (iw, ih) = (image.width(), image.height());
    if iw == 0 || ih == 0 || image.data().is_empty() {
        return Err(SkyError::EmptyData("Image has no pixels".to_string()));
    }

    let norm = Normalization::fit(image.data(), &options.interval, options.stretch)
        .ok_or_else(|| SkyError::EmptyData("Image has no finite pixels".to_string()))?;

    let size = options.figure_size.max(200);
    let layout = Layout::new(size, iw, ih);
    let mut pixmap = Pixmap::new(size, size)
        .ok_or_else(|| SkyError::Render(format!("Cannot allocate {}x{} canvas", size, size)))?;
    pixmap.fill(Color::WHITE);

    let mut text = TextLayer::new();

    draw_image(&mut pixmap, &layout, image, &norm)?;

    let wcs = image.wcs();
    let axes = wcs.as_ref().and_then(|w| SkyAxes::new(w, iw, ih));
    match &axes {
        Some(axes) => draw_sky_axes(&mut pixmap, &mut text, &layout, axes, options.grid)?,
        None => draw_pixel_axes(&mut pixmap, &mut text, &layout, options.grid)?,
    }

    draw_frame(&mut pixmap, &layout);
    draw_colorbar(&mut pixmap, &mut text, &layout, &norm, &options.colorbar_label);

    if let Some(title) = &options.title {
        text.add(
            size as f32 / 2.0,
            45.0 * layout.scale,
            title.clone(),
            30.0 * layout.scale,
            Anchor::Middle,
        );
    }

    text.render(&mut pixmap).map_err(SkyError::Render)?;

    debug!(
        width = iw,
        height = ih,
        figure_size = size,
        vmin = norm.vmin(),
        vmax = norm.vmax(),
        wcs = axes.is_some(),
        "Rendered cutout figure"
    );

    let rgba = demultiply(&pixmap);
    create_png_auto(&rgba, size as usize, size as usize).map_err(SkyError::Render)
}

/// Canvas geometry in device pixels.
#[derive(Debug, Clone, Copy)]
struct Layout {
    size: u32,
    scale: f32,
    /// Image panel origin (top-left) and extent.
    px: u32,
    py: u32,
    pw: u32,
    ph: u32,
    /// Source image size.
    iw: usize,
    ih: usize,
    /// Colorbar rectangle.
    cx: u32,
    cw: u32,
}

impl Layout {
    fn new(size: u32, iw: usize, ih: usize) -> Self {
        let scale = size as f32 / BASE;
        let (left, right, top, bottom) = (200.0 * scale, 250.0 * scale, 90.0 * scale, 130.0 * scale);
        let aw = (size as f32 - left - right).max(1.0);
        let ah = (size as f32 - top - bottom).max(1.0);

        let aspect = ih as f32 / iw as f32;
        let (mut pw, mut ph) = (aw, aw * aspect);
        if ph > ah {
            ph = ah;
            pw = ah / aspect;
        }
        let pw = (pw.round() as u32).max(1);
        let ph = (ph.round() as u32).max(1);
        let px = (left + (aw - pw as f32) / 2.0).round() as u32;
        let py = (top + (ah - ph as f32) / 2.0).round() as u32;

        Self {
            size,
            scale,
            px,
            py,
            pw,
            ph,
            iw,
            ih,
            cx: px + pw + (30.0 * scale).round() as u32,
            cw: (40.0 * scale).round().max(1.0) as u32,
        }
    }

    /// Data pixel (0-based, row 0 at the bottom) to canvas coordinates.
    fn to_canvas(&self, x: f64, y: f64) -> (f32, f32) {
        let sx = self.pw as f64 / self.iw as f64;
        let sy = self.ph as f64 / self.ih as f64;
        let cx = self.px as f64 + (x + 0.5) * sx;
        let cy = self.py as f64 + self.ph as f64 - (y + 0.5) * sy;
        (cx as f32, cy as f32)
    }

    fn panel_rect(&self) -> Option<Rect> {
        Rect::from_xywh(self.px as f32, self.py as f32, self.pw as f32, self.ph as f32)
    }

    fn bottom(&self) -> f32 {
        (self.py + self.ph) as f32
    }

    fn left(&self) -> f32 {
        self.px as f32
    }
}

fn draw_image(
    pixmap: &mut Pixmap,
    layout: &Layout,
    image: &FitsImage,
    norm: &Normalization,
) -> SkyResult<()> {
    let normalized = norm.apply_all(image.data());
    let luma: Vec<u8> = normalized
        .iter()
        .map(|v| {
            if v.is_nan() {
                255
            } else {
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        })
        .collect();

    let raster = GrayImage::from_raw(layout.iw as u32, layout.ih as u32, luma)
        .ok_or_else(|| SkyError::Render("Image buffer size mismatch".to_string()))?;
    // FITS rows run bottom-up.
    let raster = imageops::flip_vertical(&raster);
    let raster = imageops::resize(&raster, layout.pw, layout.ph, FilterType::Triangle);

    let stride = layout.size as usize * 4;
    let data = pixmap.data_mut();
    for (row, line) in raster.as_raw().chunks_exact(layout.pw as usize).enumerate() {
        let start = (layout.py as usize + row) * stride + layout.px as usize * 4;
        for (col, &g) in line.iter().enumerate() {
            let i = start + col * 4;
            data[i..i + 4].copy_from_slice(&[g, g, g, 255]);
        }
    }
    Ok(())
}

/// Longitude/latitude extent and tick choice for a celestial image.
struct SkyAxes<'a> {
    wcs: &'a Wcs,
    center_lon: f64,
    lon_range: (f64, f64),
    lat_range: (f64, f64),
    lon_format: TickFormat,
    lat_format: TickFormat,
    lon_step: f64,
    lat_step: f64,
    labels: (String, String),
}

impl<'a> SkyAxes<'a> {
    fn new(wcs: &'a Wcs, iw: usize, ih: usize) -> Option<Self> {
        let (cx, cy) = ((iw as f64 - 1.0) / 2.0, (ih as f64 - 1.0) / 2.0);
        let (center_lon, _) = wcs.pixel_to_world(cx, cy)?;

        let n = 40;
        let mut lon_range = (f64::MAX, f64::MIN);
        let mut lat_range = (f64::MAX, f64::MIN);
        for i in 0..=n {
            for j in 0..=n {
                let x = -0.5 + iw as f64 * i as f64 / n as f64;
                let y = -0.5 + ih as f64 * j as f64 / n as f64;
                if let Some((lon, lat)) = wcs.pixel_to_world(x, y) {
                    let lon = unwrap_lon(lon, center_lon);
                    lon_range = (lon_range.0.min(lon), lon_range.1.max(lon));
                    lat_range = (lat_range.0.min(lat), lat_range.1.max(lat));
                }
            }
        }
        if lon_range.0 > lon_range.1 {
            return None;
        }

        let inside = |p: Option<(f64, f64)>| {
            p.map_or(false, |(x, y)| {
                x >= -0.5 && y >= -0.5 && x <= iw as f64 - 0.5 && y <= ih as f64 - 0.5
            })
        };
        if inside(wcs.world_to_pixel(0.0, 90.0)) {
            lat_range.1 = 90.0;
            lon_range = (center_lon - 180.0, center_lon + 180.0);
        }
        if inside(wcs.world_to_pixel(0.0, -90.0)) {
            lat_range.0 = -90.0;
            lon_range = (center_lon - 180.0, center_lon + 180.0);
        }

        let frame = wcs.frame();
        let (lon_format, lat_format) = match frame {
            CelestialFrame::Equatorial => (TickFormat::Hours, TickFormat::Degrees),
            _ => (TickFormat::DecimalDegrees, TickFormat::DecimalDegrees),
        };
        let lon_step = choose_step(lon_range.1 - lon_range.0, lon_format, 5);
        let lat_step = choose_step(lat_range.1 - lat_range.0, lat_format, 5);

        let (lon_name, lat_name) = frame.axis_names();
        let labels = match frame {
            CelestialFrame::Equatorial => {
                let suffix = equinox_label(wcs.equinox());
                (
                    format!("{} ({})", lon_name, suffix),
                    format!("{} ({})", lat_name, suffix),
                )
            }
            _ => (lon_name.to_string(), lat_name.to_string()),
        };

        Some(Self {
            wcs,
            center_lon,
            lon_range,
            lat_range,
            lon_format,
            lat_format,
            lon_step,
            lat_step,
            labels,
        })
    }

    fn lon_ticks(&self) -> Vec<f64> {
        tick_values(self.lon_range.0, self.lon_range.1, self.lon_step)
    }

    fn lat_ticks(&self) -> Vec<f64> {
        tick_values(self.lat_range.0, self.lat_range.1, self.lat_step)
            .into_iter()
            .filter(|lat| lat.abs() <= 90.0)
            .collect()
    }
}

fn equinox_label(equinox: Option<f64>) -> String {
    match equinox {
        Some(e) if (e - 1950.0).abs() < 1e-6 => "B1950".to_string(),
        Some(e) if (e - 2000.0).abs() > 1e-6 => format!("J{}", e),
        _ => "J2000".to_string(),
    }
}

fn unwrap_lon(lon: f64, center: f64) -> f64 {
    center + fits_parser::wcs::wrap180(lon - center)
}

fn draw_sky_axes(
    pixmap: &mut Pixmap,
    text: &mut TextLayer,
    layout: &Layout,
    axes: &SkyAxes,
    grid: bool,
) -> SkyResult<()> {
    let s = layout.scale;
    let lon_ticks = axes.lon_ticks();
    let lat_ticks = axes.lat_ticks();

    if grid {
        let mask = panel_mask(layout)?;
        let samples = 240;
        let mut lines: Vec<Vec<Option<(f32, f32)>>> = Vec::new();

        for &lon in &lon_ticks {
            let (lo, hi) = axes.lat_range;
            lines.push(
                (0..=samples)
                    .map(|k| {
                        let lat = lo + (hi - lo) * k as f64 / samples as f64;
                        axes.wcs
                            .world_to_pixel(lon, lat)
                            .map(|(x, y)| layout.to_canvas(x, y))
                    })
                    .collect(),
            );
        }
        for &lat in &lat_ticks {
            let (lo, hi) = axes.lon_range;
            lines.push(
                (0..=samples)
                    .map(|k| {
                        let lon = lo + (hi - lo) * k as f64 / samples as f64;
                        axes.wcs
                            .world_to_pixel(lon, lat)
                            .map(|(x, y)| layout.to_canvas(x, y))
                    })
                    .collect(),
            );
        }
        let max_jump = layout.pw.max(layout.ph) as f32 / 2.0;
        for line in &lines {
            stroke_grid_line(pixmap, line, s, max_jump, &mask);
        }
    }

    // Longitude ticks where grid lines cross the bottom edge.
    let n = 400;
    let bottom: Vec<(f64, Option<f64>)> = (0..=n)
        .map(|k| {
            let x = -0.5 + layout.iw as f64 * k as f64 / n as f64;
            let lon = axes
                .wcs
                .pixel_to_world(x, -0.5)
                .map(|(lon, _)| unwrap_lon(lon, axes.center_lon));
            (x, lon)
        })
        .collect();
    let mut placed: Vec<(f32, f32)> = Vec::new();
    let tick_size = 24.0 * s;
    for (x, lon) in crossings(&bottom, &lon_ticks, 180.0) {
        let (cx, _) = layout.to_canvas(x, -0.5);
        draw_tick(pixmap, cx, layout.bottom(), 0.0, -8.0 * s, s);
        let label = format_tick(lon, axes.lon_step, axes.lon_format);
        let half = label.chars().count() as f32 * tick_size * 0.3;
        if placed.iter().all(|&(a, b)| cx + half < a || cx - half > b) {
            placed.push((cx - half - 6.0 * s, cx + half + 6.0 * s));
            text.add(cx, layout.bottom() + 28.0 * s, label, tick_size, Anchor::Middle);
        }
    }

    // Latitude ticks along the left edge.
    let left: Vec<(f64, Option<f64>)> = (0..=n)
        .map(|k| {
            let y = -0.5 + layout.ih as f64 * k as f64 / n as f64;
            (y, axes.wcs.pixel_to_world(-0.5, y).map(|(_, lat)| lat))
        })
        .collect();
    let mut last_y: Option<f32> = None;
    for (y, lat) in crossings(&left, &lat_ticks, 90.0) {
        let (_, cy) = layout.to_canvas(-0.5, y);
        draw_tick(pixmap, layout.left(), cy, 8.0 * s, 0.0, s);
        if last_y.map_or(true, |prev| (prev - cy).abs() > tick_size * 1.2) {
            last_y = Some(cy);
            let label = format_tick(lat, axes.lat_step, axes.lat_format);
            text.add(layout.left() - 12.0 * s, cy, label, tick_size, Anchor::End);
        }
    }

    add_axis_labels(text, layout, &axes.labels.0, &axes.labels.1);
    Ok(())
}

/// Pixel-index axes for images without a celestial WCS.
fn draw_pixel_axes(
    pixmap: &mut Pixmap,
    text: &mut TextLayer,
    layout: &Layout,
    grid: bool,
) -> SkyResult<()> {
    let s = layout.scale;
    let tick_size = 24.0 * s;
    let x_step = choose_step(layout.iw as f64, TickFormat::Plain, 6).max(1.0);
    let y_step = choose_step(layout.ih as f64, TickFormat::Plain, 6).max(1.0);
    let xs = tick_values(0.0, layout.iw as f64 - 1.0, x_step);
    let ys = tick_values(0.0, layout.ih as f64 - 1.0, y_step);

    if grid {
        let mask = panel_mask(layout)?;
        let max_jump = f32::MAX;
        for &x in &xs {
            let line = vec![
                Some(layout.to_canvas(x, -0.5)),
                Some(layout.to_canvas(x, layout.ih as f64 - 0.5)),
            ];
            stroke_grid_line(pixmap, &line, s, max_jump, &mask);
        }
        for &y in &ys {
            let line = vec![
                Some(layout.to_canvas(-0.5, y)),
                Some(layout.to_canvas(layout.iw as f64 - 0.5, y)),
            ];
            stroke_grid_line(pixmap, &line, s, max_jump, &mask);
        }
    }

    for &x in &xs {
        let (cx, _) = layout.to_canvas(x, 0.0);
        draw_tick(pixmap, cx, layout.bottom(), 0.0, -8.0 * s, s);
        text.add(
            cx,
            layout.bottom() + 28.0 * s,
            format_tick(x, x_step, TickFormat::Plain),
            tick_size,
            Anchor::Middle,
        );
    }
    for &y in &ys {
        let (_, cy) = layout.to_canvas(0.0, y);
        draw_tick(pixmap, layout.left(), cy, 8.0 * s, 0.0, s);
        text.add(
            layout.left() - 12.0 * s,
            cy,
            format_tick(y, y_step, TickFormat::Plain),
            tick_size,
            Anchor::End,
        );
    }

    add_axis_labels(text, layout, "X (pixel)", "Y (pixel)");
    Ok(())
}

fn add_axis_labels(text: &mut TextLayer, layout: &Layout, x_label: &str, y_label: &str) {
    let s = layout.scale;
    text.add(
        layout.left() + layout.pw as f32 / 2.0,
        layout.bottom() + 85.0 * s,
        x_label,
        26.0 * s,
        Anchor::Middle,
    );
    text.add_rotated(
        layout.left() - 175.0 * s,
        layout.py as f32 + layout.ph as f32 / 2.0,
        y_label,
        26.0 * s,
        90.0,
    );
}

/// Positions along an edge where the sampled coordinate passes a tick value.
///
/// `samples` pairs an edge position with the world coordinate there; jumps
/// larger than `max_step` (longitude wrap, pole) are not treated as crossings.
fn crossings(samples: &[(f64, Option<f64>)], ticks: &[f64], max_step: f64) -> Vec<(f64, f64)> {
    let mut found = Vec::new();
    for pair in samples.windows(2) {
        let ((pa, va), (pb, vb)) = (pair[0], pair[1]);
        let (Some(va), Some(vb)) = (va, vb) else {
            continue;
        };
        if va == vb || (va - vb).abs() > max_step {
            continue;
        }
        for &t in ticks {
            let lo = va.min(vb);
            let hi = va.max(vb);
            // Half-open so a tick exactly on a sample is counted once.
            if (t >= lo && t < hi) || (t == hi && pb == samples[samples.len() - 1].0) {
                let frac = (t - va) / (vb - va);
                let pos = pa + (pb - pa) * frac;
                if !found.iter().any(|&(p, v): &(f64, f64)| v == t && (p - pos).abs() < 1e-6) {
                    found.push((pos, t));
                }
            }
        }
    }
    found
}

fn panel_mask(layout: &Layout) -> SkyResult<Mask> {
    let mut mask = Mask::new(layout.size, layout.size)
        .ok_or_else(|| SkyError::Render("Cannot allocate clip mask".to_string()))?;
    let rect = layout
        .panel_rect()
        .ok_or_else(|| SkyError::Render("Degenerate image panel".to_string()))?;
    let path = PathBuilder::from_rect(rect);
    mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
    Ok(mask)
}

fn stroke_grid_line(
    pixmap: &mut Pixmap,
    points: &[Option<(f32, f32)>],
    scale: f32,
    max_jump: f32,
    mask: &Mask,
) {
    let mut pb = PathBuilder::new();
    let mut prev: Option<(f32, f32)> = None;
    for point in points {
        match (*point, prev) {
            (Some((x, y)), Some((px, py))) if (x - px).hypot(y - py) <= max_jump => {
                pb.line_to(x, y);
            }
            (Some((x, y)), _) => pb.move_to(x, y),
            (None, _) => {}
        }
        prev = *point;
    }
    let Some(path) = pb.finish() else {
        return;
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 77);
    paint.anti_alias = true;

    let mut stroke = Stroke::default();
    stroke.width = 2.0 * scale;
    stroke.line_cap = LineCap::Round;
    stroke.dash = StrokeDash::new(vec![2.0 * scale, 3.3 * scale], 0.0);

    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), Some(mask));
}

fn black_stroke(width: f32) -> (Paint<'static>, Stroke) {
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    paint.anti_alias = true;
    let mut stroke = Stroke::default();
    stroke.width = width;
    (paint, stroke)
}

fn draw_tick(pixmap: &mut Pixmap, x: f32, y: f32, dx: f32, dy: f32, scale: f32) {
    let mut pb = PathBuilder::new();
    pb.move_to(x, y);
    pb.line_to(x + dx, y + dy);
    if let Some(path) = pb.finish() {
        let (paint, stroke) = black_stroke(1.5 * scale);
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

fn draw_frame(pixmap: &mut Pixmap, layout: &Layout) {
    if let Some(rect) = layout.panel_rect() {
        let path = PathBuilder::from_rect(rect);
        let (paint, stroke) = black_stroke(1.5 * layout.scale);
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

fn draw_colorbar(
    pixmap: &mut Pixmap,
    text: &mut TextLayer,
    layout: &Layout,
    norm: &Normalization,
    label: &str,
) {
    let s = layout.scale;
    let (cx, cy, cw, ch) = (layout.cx, layout.py, layout.cw, layout.ph);
    if cx + cw >= layout.size {
        return;
    }

    let stride = layout.size as usize * 4;
    let data = pixmap.data_mut();
    for row in 0..ch {
        let t = 1.0 - (row as f32 + 0.5) / ch as f32;
        let g = (t * 255.0).round() as u8;
        let start = (cy + row) as usize * stride + cx as usize * 4;
        for col in 0..cw as usize {
            let i = start + col * 4;
            data[i..i + 4].copy_from_slice(&[g, g, g, 255]);
        }
    }

    if let Some(rect) = Rect::from_xywh(cx as f32, cy as f32, cw as f32, ch as f32) {
        let path = PathBuilder::from_rect(rect);
        let (paint, stroke) = black_stroke(1.5 * s);
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    let tick_size = 22.0 * s;
    let right = (cx + cw) as f32;
    let bottom = (cy + ch) as f32;
    let (vmin, vmax) = (norm.vmin(), norm.vmax());
    let step = choose_step(vmax - vmin, TickFormat::Plain, 5);
    let values = if vmax > vmin {
        tick_values(vmin, vmax, step)
    } else {
        vec![vmin]
    };

    let mut last_y: Option<f32> = None;
    for v in values {
        let t = norm.apply(v);
        if !t.is_finite() {
            continue;
        }
        let y = bottom - ch as f32 * t as f32;
        draw_tick(pixmap, right, y, 8.0 * s, 0.0, s);
        if last_y.map_or(true, |prev| (prev - y).abs() > tick_size * 1.1) {
            last_y = Some(y);
            text.add(
                right + 12.0 * s,
                y,
                format_tick(v, step, TickFormat::Plain),
                tick_size,
                Anchor::Start,
            );
        }
    }

    text.add_rotated(
        (layout.size as f32 - 30.0 * s).max(right + 20.0 * s),
        cy as f32 + ch as f32 / 2.0,
        label,
        24.0 * s,
        90.0,
    );
}

/// Straight RGBA bytes from the premultiplied canvas.
fn demultiply(pixmap: &Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixmap.data().len());
    for p in pixmap.pixels() {
        let c = p.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}
