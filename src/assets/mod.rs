//! Asset persistence.
//!
//! Assets are addressed by `/`-separated project paths such as
//! `Assets/Combined/Crate/Crate_Atlas.png`. [`AssetStore`] is the seam to the
//! host's asset database; [`FsAssetStore`] maps project paths onto a
//! directory on disk.

pub mod paths;

pub use paths::{
    ensure_folder, generate_output_path, generate_output_path_at, sanitize_file_name, OutputLayout,
};

use crate::color::ColorEncoding;
use crate::error::{CombinerError, Result};
use crate::material::MaterialAsset;
use crate::mesh::Mesh;
use crate::texture::{load_texture_from_bytes, TextureData};
use log::debug;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Storage for generated assets.
pub trait AssetStore {
    fn folder_exists(&self, path: &str) -> bool;

    /// Create a single folder. The parent must already exist.
    fn create_folder(&self, path: &str) -> Result<()>;

    /// Write a texture as PNG.
    fn write_texture(&self, path: &str, texture: &TextureData) -> Result<()>;

    /// Import a PNG, tagging its values with `encoding`.
    fn read_texture(&self, path: &str, encoding: ColorEncoding) -> Result<TextureData>;

    fn write_material(&self, path: &str, material: &MaterialAsset) -> Result<()>;

    fn read_material(&self, path: &str) -> Result<MaterialAsset>;

    fn write_mesh(&self, path: &str, mesh: &Mesh) -> Result<()>;

    fn read_mesh(&self, path: &str) -> Result<Mesh>;
}

/// Asset store backed by a project directory.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a project path.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if component == "." || component == ".." {
                return Err(CombinerError::Asset(format!(
                    "Asset path {} must not contain relative components",
                    path
                )));
            }
            resolved.push(component);
        }
        Ok(resolved)
    }

    fn create_file(&self, path: &str) -> Result<BufWriter<fs::File>> {
        let file_path = self.resolve(path)?;
        let file = fs::File::create(&file_path).map_err(|e| {
            CombinerError::Asset(format!("Failed to create {}: {}", file_path.display(), e))
        })?;
        Ok(BufWriter::new(file))
    }
}

impl AssetStore for FsAssetStore {
    fn folder_exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_dir()).unwrap_or(false)
    }

    fn create_folder(&self, path: &str) -> Result<()> {
        let dir = self.resolve(path)?;
        fs::create_dir(&dir).map_err(|e| {
            CombinerError::Asset(format!("Failed to create folder {}: {}", path, e))
        })?;
        debug!("Created folder {}", path);
        Ok(())
    }

    fn write_texture(&self, path: &str, texture: &TextureData) -> Result<()> {
        let png = texture.to_png()?;
        fs::write(self.resolve(path)?, png)?;
        debug!("Wrote texture {} ({}x{})", path, texture.width, texture.height);
        Ok(())
    }

    fn read_texture(&self, path: &str, encoding: ColorEncoding) -> Result<TextureData> {
        let bytes = fs::read(self.resolve(path)?)
            .map_err(|e| CombinerError::Asset(format!("Failed to read texture {}: {}", path, e)))?;
        load_texture_from_bytes(&bytes, encoding)
    }

    fn write_material(&self, path: &str, material: &MaterialAsset) -> Result<()> {
        serde_json::to_writer_pretty(self.create_file(path)?, material)?;
        debug!("Wrote material {}", path);
        Ok(())
    }

    fn read_material(&self, path: &str) -> Result<MaterialAsset> {
        let contents = fs::read_to_string(self.resolve(path)?)
            .map_err(|e| CombinerError::Asset(format!("Failed to read material {}: {}", path, e)))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_mesh(&self, path: &str, mesh: &Mesh) -> Result<()> {
        serde_json::to_writer(self.create_file(path)?, mesh)?;
        debug!("Wrote mesh {} ({} vertices)", path, mesh.vertex_count());
        Ok(())
    }

    fn read_mesh(&self, path: &str) -> Result<Mesh> {
        let contents = fs::read_to_string(self.resolve(path)?)
            .map_err(|e| CombinerError::Asset(format!("Failed to read mesh {}: {}", path, e)))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};
    use tempfile::TempDir;

    #[test]
    fn test_folders() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());

        assert!(!store.folder_exists("Assets"));
        store.create_folder("Assets").unwrap();
        assert!(store.folder_exists("Assets"));
        assert!(dir.path().join("Assets").is_dir());

        // Parent must exist
        assert!(store.create_folder("Assets/A/B").is_err());
    }

    #[test]
    fn test_relative_components_are_rejected() {
        let store = FsAssetStore::new("/tmp/project");
        assert!(store.resolve("Assets/../secret").is_err());
        assert_eq!(
            store.resolve("Assets/Combined/").unwrap(),
            PathBuf::from("/tmp/project/Assets/Combined")
        );
    }

    #[test]
    fn test_texture_round_trip_keeps_pixels() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());
        let texture = TextureData::solid(3, 2, [1.0, 0.5, 0.0, 1.0], ColorEncoding::Gamma);

        store.write_texture("atlas.png", &texture).unwrap();
        let back = store.read_texture("atlas.png", ColorEncoding::Linear).unwrap();

        assert_eq!((back.width, back.height), (3, 2));
        assert_eq!(back.pixels, texture.pixels);
        assert_eq!(back.encoding, ColorEncoding::Linear);
    }

    #[test]
    fn test_mesh_and_material_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());

        let mut mesh = Mesh::new("Combined_Crate");
        mesh.vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        mesh.uv = vec![Vec2::ZERO, Vec2::X, Vec2::Y];
        mesh.submeshes = vec![vec![0, 1, 2]];
        store.write_mesh("mesh.asset", &mesh).unwrap();
        assert_eq!(store.read_mesh("mesh.asset").unwrap(), mesh);

        let material = MaterialAsset {
            name: "Crate_Material".to_string(),
            shader: "Standard".to_string(),
            properties: Default::default(),
            keywords: vec!["_EMISSION".to_string()],
            render_queue: Some(2000),
        };
        store.write_material("m.mat", &material).unwrap();
        assert_eq!(store.read_material("m.mat").unwrap(), material);
    }

    #[test]
    fn test_missing_files_are_asset_errors() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());
        assert!(matches!(store.read_mesh("nope.asset"), Err(CombinerError::Asset(_))));
        assert!(matches!(
            store.read_texture("nope.png", ColorEncoding::Gamma),
            Err(CombinerError::Asset(_))
        ));
    }
}
