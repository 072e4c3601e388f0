//! # Material Combiner
//!
//! A Rust library for collapsing multi-material meshes into a single material
//! backed by a packed texture atlas.
//!
//! ## Overview
//!
//! For every target object the library gathers the texture each material
//! contributes, packs them into one atlas, remaps the mesh UVs into the packed
//! rectangles, merges all submeshes into one and builds a combined material
//! from a representative source material. The atlas, material and mesh are
//! written as assets and then swapped onto the object.
//!
//! ## Quick Start
//!
//! ```ignore
//! use material_combiner::{
//!     BatchRunner, CombineContext, CombinerConfig, ColorEncoding, FsAssetStore,
//!     ShaderLibrary, SoftwareDevice,
//! };
//!
//! let store = FsAssetStore::new("path/to/project");
//! let shaders = ShaderLibrary::new();
//! let config = CombinerConfig::default();
//! let context = CombineContext {
//!     store: &store,
//!     device: &SoftwareDevice,
//!     shaders: &shaders,
//!     encoding: ColorEncoding::Gamma,
//! };
//!
//! let summary = BatchRunner::new(context, &config).run_all(&mut scene, &selection);
//! for line in &summary.errors {
//!     eprintln!("{}", line);
//! }
//! ```

pub mod error;
pub mod color;
pub mod texture;
pub mod material;
pub mod atlas;
pub mod mesh;
pub mod scene;
pub mod assets;
pub mod config;
pub mod pipeline;
pub mod batch;

// Re-export main types for convenience
pub use error::{CombinerError, Result};
pub use color::ColorEncoding;
pub use texture::{
    ReadbackDevice, SoftwareDevice, Texture, TextureAccess, TextureData, TextureResolutionPolicy,
};
pub use material::{Material, MaterialMerger, PropertyValue, Shader, ShaderChoice, ShaderLibrary};
pub use atlas::{AtlasBuilder, PackedAtlas, PersistedAtlas, UvRect};
pub use mesh::{remap, Bounds, Mesh, RemapReport};
pub use scene::{load_scene, ObjectId, Renderer, Scene, SceneDescription, SceneObject};
pub use assets::{AssetStore, FsAssetStore, OutputLayout};
pub use config::CombinerConfig;
pub use pipeline::{CombineContext, ObjectPipeline, ProcessFailure, ProcessReport, Stage};
pub use batch::{collect_targets, count_multi_material_descendants, BatchRunner, BatchSummary};
