//! Texture atlas building.
//!
//! This module combines the per-material textures into a single atlas and
//! reports where each one was placed as a normalized UV rectangle.

mod builder;

pub use builder::{AtlasBuilder, PackedAtlas, PersistedAtlas, Placement, UvRect};
