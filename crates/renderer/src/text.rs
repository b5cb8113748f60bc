//! Figure text rendered through usvg/resvg.
//!
//! Labels are collected into a [`TextLayer`], serialized as one SVG document
//! the size of the canvas and rasterized on top of it. Fonts come from the
//! system font database, loaded once per process.

use once_cell::sync::Lazy;
use std::fmt::Write;
use std::sync::Arc;
use tiny_skia::{Pixmap, Transform};
use tracing::{debug, warn};

static FONTS: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    if db.len() == 0 {
        warn!("No system fonts found; figure labels will be blank");
    } else {
        debug!(faces = db.len(), "Loaded system fonts");
    }
    Arc::new(db)
});

const FONT_FAMILY: &str = "DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif";

/// Horizontal anchoring of a label relative to its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn as_svg(&self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

/// One text label. `y` is the vertical centre of the text.
#[derive(Debug, Clone)]
pub struct Label {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub size: f32,
    pub anchor: Anchor,
    /// Counter-clockwise rotation in degrees about (`x`, `y`).
    pub rotation: f32,
}

/// Labels accumulated for one canvas.
#[derive(Debug, Default)]
pub struct TextLayer {
    labels: Vec<Label>,
}

impl TextLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, x: f32, y: f32, text: impl Into<String>, size: f32, anchor: Anchor) {
        self.labels.push(Label {
            x,
            y,
            text: text.into(),
            size,
            anchor,
            rotation: 0.0,
        });
    }

    pub fn add_rotated(&mut self, x: f32, y: f32, text: impl Into<String>, size: f32, rotation: f32) {
        self.labels.push(Label {
            x,
            y,
            text: text.into(),
            size,
            anchor: Anchor::Middle,
            rotation,
        });
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// SVG document covering a `width` x `height` canvas.
    pub fn to_svg(&self, width: u32, height: u32) -> String {
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        );
        for label in &self.labels {
            // Shift from the visual centre to the alphabetic baseline.
            let baseline = label.y + label.size * 0.35;
            let _ = write!(
                svg,
                r#"<text x="{x:.1}" y="{y:.1}" font-family="{family}" font-size="{size:.1}" text-anchor="{anchor}" fill="black""#,
                x = label.x,
                y = baseline,
                family = FONT_FAMILY,
                size = label.size,
                anchor = label.anchor.as_svg(),
            );
            if label.rotation != 0.0 {
                let _ = write!(
                    svg,
                    r#" transform="rotate({r:.1} {x:.1} {y:.1})""#,
                    r = -label.rotation,
                    x = label.x,
                    y = label.y
                );
            }
            let _ = write!(svg, ">{}</text>", escape(&label.text));
        }
        svg.push_str("</svg>");
        svg
    }

    /// Rasterize all labels onto `pixmap`.
    pub fn render(&self, pixmap: &mut Pixmap) -> Result<(), String> {
        if self.labels.is_empty() {
            return Ok(());
        }
        let svg = self.to_svg(pixmap.width(), pixmap.height());

        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(&FONTS);
        let tree = usvg::Tree::from_str(&svg, &opt)
            .map_err(|e| format!("Failed to parse label SVG: {}", e))?;

        resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
        Ok(())
    }
}

/// Escape text for inclusion in SVG character data.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("M51 <&> \"x\""), "M51 &lt;&amp;&gt; &quot;x&quot;");
        assert_eq!(escape("a\tb"), "a b");
    }

    #[test]
    fn test_svg_contains_labels() {
        let mut layer = TextLayer::new();
        layer.add(10.0, 20.0, "DSS2 Red - M51", 24.0, Anchor::Middle);
        layer.add_rotated(5.0, 50.0, "Declination (J2000)", 18.0, 90.0);
        let svg = layer.to_svg(100, 100);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("DSS2 Red - M51"));
        assert!(svg.contains(r#"text-anchor="middle""#));
        assert!(svg.contains("rotate(-90.0 5.0 50.0)"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn test_render_parses_and_keeps_canvas_size() {
        let mut layer = TextLayer::new();
        layer.add(50.0, 50.0, "13h29m <test>", 12.0, Anchor::Start);
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        pixmap.fill(tiny_skia::Color::WHITE);
        layer.render(&mut pixmap).unwrap();
        assert_eq!(pixmap.width(), 100);
    }
}
