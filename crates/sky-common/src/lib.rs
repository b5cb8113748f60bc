//! Common types and utilities shared across the skyview tile services.

pub mod error;
pub mod position;
pub mod product;
pub mod request;
pub mod slug;

pub use error::{SkyError, SkyResult};
pub use position::PositionQuery;
pub use product::{CacheStatus, CutoutProduct};
pub use request::{CutoutRequest, CutoutRequestBuilder, TileQuery};
pub use slug::{slugify, CacheKey, DEFAULT_SLUG};
