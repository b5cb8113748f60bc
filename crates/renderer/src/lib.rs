//! Rendering of survey cutouts into annotated PNG figures.
//!
//! - [`stretch`]: zscale interval and asinh stretch
//! - [`ticks`]: sexagesimal and decimal tick spacing/labels
//! - [`text`]: label rasterization through usvg/resvg
//! - [`figure`]: canvas layout, WCS grid, colorbar
//! - [`png`]: PNG encoder

pub mod figure;
pub mod png;
pub mod stretch;
pub mod text;
pub mod ticks;

pub use figure::{render_cutout, RenderOptions, DEFAULT_FIGURE_SIZE};
pub use stretch::{AsinhStretch, Normalization, ZScaleInterval};
