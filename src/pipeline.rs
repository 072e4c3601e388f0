//! Per-object combining pipeline.
//!
//! One pass per object:
//!
//! ```text
//! ValidateInputs -> ResolveOutputPath -> BuildTextureSet -> PackAtlas
//!     -> BuildMaterial -> RemapMesh -> Apply
//! ```
//!
//! Any stage may fail with a [`ProcessFailure`]. The object itself is only
//! touched in `Apply`, after everything else succeeded, so a failed run
//! leaves it exactly as it was.

use crate::assets::{
    ensure_folder, generate_output_path, sanitize_file_name, AssetStore, OutputLayout,
};
use crate::atlas::AtlasBuilder;
use crate::color::ColorEncoding;
use crate::config::CombinerConfig;
use crate::error::CombinerError;
use crate::material::{Material, MaterialAsset, MaterialMerger, ShaderLibrary};
use crate::mesh::{remap, Mesh, RemapReport, COMBINED_MESH_PREFIX};
use crate::scene::{ObjectId, Scene};
use crate::texture::access::average_color;
use crate::texture::{ReadbackDevice, TextureAccess};
use log::{debug, info, log_enabled, Level};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Pipeline stage, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ValidateInputs,
    ResolveOutputPath,
    BuildTextureSet,
    PackAtlas,
    BuildMaterial,
    RemapMesh,
    Apply,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ValidateInputs => "validate inputs",
            Stage::ResolveOutputPath => "resolve output path",
            Stage::BuildTextureSet => "build texture set",
            Stage::PackAtlas => "pack atlas",
            Stage::BuildMaterial => "build material",
            Stage::RemapMesh => "remap mesh",
            Stage::Apply => "apply",
        };
        f.write_str(name)
    }
}

/// Why one object could not be combined.
///
/// Displays as the reason alone, ready for `"<object>: <reason>"` lines.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ProcessFailure {
    pub stage: Stage,
    pub source: CombinerError,
}

fn at(stage: Stage) -> impl FnOnce(CombinerError) -> ProcessFailure {
    move |source| ProcessFailure { stage, source }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub object_name: String,
    pub output_folder: String,
    pub atlas_path: String,
    pub material_path: String,
    pub mesh_path: String,
    /// Textures packed into the atlas.
    pub texture_count: usize,
    /// Material slots that received the default texture.
    pub substituted: Vec<usize>,
    /// Uniform scale the packer applied to fit the atlas.
    pub atlas_scale: f32,
    pub remap: RemapReport,
    /// Handles now assigned to the object.
    pub material: Arc<Material>,
    pub mesh: Arc<Mesh>,
}

/// Collaborators shared by every object of a run.
#[derive(Clone, Copy)]
pub struct CombineContext<'a> {
    pub store: &'a dyn AssetStore,
    pub device: &'a dyn ReadbackDevice,
    pub shaders: &'a ShaderLibrary,
    /// Working colour encoding for every pixel read or written.
    pub encoding: ColorEncoding,
}

/// Inputs captured by validation; nothing here borrows the scene.
struct Inputs {
    name: String,
    materials: Vec<Option<Arc<Material>>>,
    mesh: Arc<Mesh>,
}

/// Combines a single object.
pub struct ObjectPipeline<'a> {
    context: CombineContext<'a>,
    config: &'a CombinerConfig,
}

impl<'a> ObjectPipeline<'a> {
    pub fn new(context: CombineContext<'a>, config: &'a CombinerConfig) -> Self {
        Self { context, config }
    }

    /// Run every stage for `id`, swapping its mesh and materials on success.
    pub fn process(
        &self,
        scene: &mut Scene,
        id: ObjectId,
    ) -> std::result::Result<ProcessReport, ProcessFailure> {
        let inputs = validate(scene, id).map_err(at(Stage::ValidateInputs))?;
        debug!(
            "Combining {} ({} materials, {} submeshes)",
            inputs.name,
            inputs.materials.len(),
            inputs.mesh.submesh_count()
        );

        let layout = self
            .resolve_output(&inputs.mesh.name)
            .map_err(at(Stage::ResolveOutputPath))?;

        // BuildTextureSet
        let policy = self.config.texture_policy();
        let access = TextureAccess::new(self.context.device, self.context.encoding);
        let set = access.collect(&inputs.materials, &policy);
        if set.is_empty() {
            return Err(at(Stage::BuildTextureSet)(CombinerError::NoTextures));
        }
        if log_enabled!(Level::Debug) {
            for (i, texture) in set.textures.iter().enumerate() {
                if let Some(average) = average_color(&texture.data) {
                    debug!(
                        "Texture {} ({}): {}x{}, average {:?}, alpha {}",
                        i,
                        texture.name,
                        texture.width(),
                        texture.height(),
                        average,
                        texture.data.has_transparency()
                    );
                }
            }
        }

        // PackAtlas
        let mut builder = AtlasBuilder::new(
            self.config.atlas_size,
            self.config.padding,
            self.context.encoding,
        );
        for texture in &set.textures {
            builder.add_texture(&texture.data);
        }
        let packed = builder.build().map_err(at(Stage::PackAtlas))?;
        let atlas_scale = packed.scale;
        let atlas = packed
            .persist(
                self.context.store,
                &layout.atlas_path(),
                format!("{}_Atlas", layout.safe_name),
            )
            .map_err(at(Stage::PackAtlas))?;

        // BuildMaterial
        let source = inputs
            .materials
            .iter()
            .flatten()
            .next()
            .ok_or_else(|| at(Stage::BuildMaterial)(CombinerError::NoSourceMaterial))?;
        let material = MaterialMerger::new(self.context.shaders).merge(
            &self.config.shader_choice(),
            atlas.texture(),
            source,
            &policy,
            format!("{}_Material", layout.safe_name),
        );
        self.context
            .store
            .write_material(&layout.material_path(), &MaterialAsset::from(&material))
            .map_err(at(Stage::BuildMaterial))?;

        // RemapMesh
        let (combined, remap_report) = remap(&inputs.mesh, &set.material_to_texture, atlas.uv_rects());
        let mesh = self
            .persist_mesh(&layout.mesh_path(), &combined)
            .map_err(at(Stage::RemapMesh))?;

        // Apply
        let material = Arc::new(material);
        let mesh = Arc::new(mesh);
        let object = scene
            .get_mut(id)
            .ok_or_else(|| at(Stage::Apply)(CombinerError::ObjectNotFound(id.to_string())))?;
        if let Some(filter) = object.mesh_filter.as_mut() {
            filter.mesh = Some(mesh.clone());
        }
        if let Some(renderer) = object.renderer.as_mut() {
            renderer.materials = vec![Some(material.clone())];
        }

        info!(
            "Combined {}: {} materials into {} ({} triangles)",
            inputs.name,
            inputs.materials.len(),
            layout.folder,
            mesh.triangle_count()
        );

        Ok(ProcessReport {
            object_name: inputs.name,
            output_folder: layout.folder.clone(),
            atlas_path: layout.atlas_path(),
            material_path: layout.material_path(),
            mesh_path: layout.mesh_path(),
            texture_count: set.len(),
            substituted: set.substituted,
            atlas_scale,
            remap: remap_report,
            material,
            mesh,
        })
    }

    fn resolve_output(&self, mesh_name: &str) -> crate::error::Result<OutputLayout> {
        let store = self.context.store;
        let safe_name = sanitize_file_name(mesh_name);

        ensure_folder(store, &self.config.output_base_path)?;
        let folder = generate_output_path(
            store,
            &self.config.output_base_path,
            &safe_name,
            self.config.use_timestamp_folder,
            self.config.prevent_overwrite,
        );
        if !store.folder_exists(&folder) {
            store.create_folder(&folder)?;
        }

        debug!("Output folder {}", folder);
        Ok(OutputLayout::new(folder, safe_name))
    }

    /// Write the mesh and hand back the reloaded copy.
    fn persist_mesh(&self, path: &str, mesh: &Mesh) -> crate::error::Result<Mesh> {
        self.context.store.write_mesh(path, mesh)?;
        let reloaded = self.context.store.read_mesh(path)?;

        if !reloaded.name.starts_with(COMBINED_MESH_PREFIX) {
            return Err(CombinerError::Asset(format!(
                "Reloaded mesh {} is named {}",
                path, reloaded.name
            )));
        }
        Ok(reloaded)
    }
}

fn validate(scene: &Scene, id: ObjectId) -> crate::error::Result<Inputs> {
    let object = scene.object(id)?;

    let renderer = object.renderer.as_ref().ok_or(CombinerError::MissingRenderer)?;
    if renderer.material_count() <= 1 {
        return Err(CombinerError::AlreadySingleMaterial);
    }
    let mesh = object.mesh().ok_or(CombinerError::MissingMesh)?;

    Ok(Inputs {
        name: object.name.clone(),
        materials: renderer.materials.clone(),
        mesh: mesh.clone(),
    })
}
