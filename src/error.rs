//! Error types for the material combiner.

use thiserror::Error;

/// Result type alias using CombinerError.
pub type Result<T> = std::result::Result<T, CombinerError>;

/// Main error type for material combining operations.
#[derive(Error, Debug)]
pub enum CombinerError {
    /// Failed to parse or write JSON data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read or process an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Scene object handle or name did not resolve.
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Pixel buffer does not match the declared size or format.
    #[error("Invalid texture: {0}")]
    InvalidTexture(String),

    /// Copying a GPU-only texture back to the CPU failed.
    #[error("Texture readback failed: {0}")]
    Readback(String),

    /// Failed to build or persist the texture atlas.
    #[error("Atlas building error: {0}")]
    AtlasBuild(String),

    /// Asset store rejected a read or write.
    #[error("Asset error: {0}")]
    Asset(String),

    /// The object has no renderer component.
    #[error("no mesh renderer")]
    MissingRenderer,

    /// The renderer holds one material or none.
    #[error("already single material")]
    AlreadySingleMaterial,

    /// The object has no mesh holder, or the holder has no mesh.
    #[error("no mesh filter or mesh")]
    MissingMesh,

    /// No material contributed a texture.
    #[error("no textures to combine")]
    NoTextures,

    /// Every material slot on the renderer is empty.
    #[error("no source material to copy properties from")]
    NoSourceMaterial,
}
