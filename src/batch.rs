//! Batch processing over a selection of objects.

use crate::config::CombinerConfig;
use crate::pipeline::{CombineContext, ObjectPipeline, ProcessReport};
use crate::scene::{ObjectId, Scene};
use log::{error, info};
use std::collections::HashSet;

/// Message reported when there is nothing to process.
pub const NO_SELECTION_MESSAGE: &str = "no objects selected";

/// Expand `selection` into the ordered list of objects to process.
///
/// Selected objects come first in selection order. With `recursive`, the
/// descendants holding several materials follow, grouped by the selected
/// object they were found under. Every object appears once.
pub fn collect_targets(scene: &Scene, selection: &[ObjectId], recursive: bool) -> Vec<ObjectId> {
    let mut seen = HashSet::new();
    let mut targets: Vec<ObjectId> = selection
        .iter()
        .copied()
        .filter(|&id| scene.get(id).is_some() && seen.insert(id))
        .collect();

    if !recursive {
        return targets;
    }

    for &id in selection {
        for child in scene.descendants(id) {
            let eligible = scene
                .get(child)
                .is_some_and(|object| object.has_multiple_materials());
            if eligible && seen.insert(child) {
                targets.push(child);
            }
        }
    }

    targets
}

/// Descendants of `id` (not `id` itself) whose renderer holds more than one
/// material.
pub fn count_multi_material_descendants(scene: &Scene, id: ObjectId) -> usize {
    scene
        .descendants(id)
        .into_iter()
        .filter(|&child| {
            scene
                .get(child)
                .is_some_and(|object| object.has_multiple_materials())
        })
        .count()
}

/// Aggregate result of a batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub success_count: usize,
    /// One `"<object-name>: <reason>"` line per failed object, in order.
    pub errors: Vec<String>,
    pub reports: Vec<ProcessReport>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the pipeline over many objects, one after another.
pub struct BatchRunner<'a> {
    context: CombineContext<'a>,
    config: &'a CombinerConfig,
}

impl<'a> BatchRunner<'a> {
    pub fn new(context: CombineContext<'a>, config: &'a CombinerConfig) -> Self {
        Self { context, config }
    }

    /// Process every target in order. A failing object never stops the batch.
    pub fn run_all(&self, scene: &mut Scene, selection: &[ObjectId]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        if selection.is_empty() {
            summary.errors.push(NO_SELECTION_MESSAGE.to_string());
            return summary;
        }
        if let Err(e) = self.config.validate() {
            summary.errors.push(format!("configuration: {}", e));
            return summary;
        }

        let targets = collect_targets(scene, selection, self.config.process_children_recursively);
        info!("Combining {} objects", targets.len());

        let pipeline = ObjectPipeline::new(self.context, self.config);
        for id in targets {
            let name = scene
                .get(id)
                .map_or_else(|| id.to_string(), |object| object.name.clone());

            match pipeline.process(scene, id) {
                Ok(report) => {
                    summary.success_count += 1;
                    summary.reports.push(report);
                }
                Err(failure) => {
                    error!("{} failed at {}: {}", name, failure.stage, failure);
                    summary.errors.push(format!("{}: {}", name, failure));
                }
            }
        }

        info!(
            "Batch finished: {} succeeded, {} failed",
            summary.success_count,
            summary.errors.len()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::FsAssetStore;
    use crate::color::ColorEncoding;
    use crate::material::{Material, ShaderLibrary};
    use crate::mesh::Mesh;
    use crate::scene::{Renderer, SceneObject};
    use crate::texture::{SoftwareDevice, Texture, TextureData};
    use glam::{Vec2, Vec3};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn material(library: &ShaderLibrary, name: &str) -> Option<Arc<Material>> {
        let mut material = Material::new(name, library.fallback());
        material.set_main_texture(Some(Arc::new(Texture::new(
            name,
            TextureData::solid(8, 8, [0.5, 0.5, 0.5, 1.0], ColorEncoding::Gamma),
        ))));
        Some(Arc::new(material))
    }

    fn object(library: &ShaderLibrary, name: &str, materials: usize) -> SceneObject {
        let mut mesh = Mesh::new(name);
        mesh.vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        mesh.uv = vec![Vec2::ZERO, Vec2::X, Vec2::Y];
        mesh.submeshes = vec![vec![0, 1, 2]; materials];

        SceneObject::new(name)
            .with_mesh(Arc::new(mesh))
            .with_renderer(Renderer::new(
                (0..materials)
                    .map(|i| material(library, &format!("{}_{}", name, i)))
                    .collect(),
            ))
    }

    /// Parent with two multi-material children and one single-material child.
    fn family(library: &ShaderLibrary) -> (Scene, ObjectId, [ObjectId; 3]) {
        let mut scene = Scene::new();
        let parent = scene.spawn(object(library, "Parent", 2));
        let a = scene.spawn_child(parent, object(library, "ChildA", 2)).unwrap();
        let single = scene.spawn_child(parent, object(library, "Single", 1)).unwrap();
        let b = scene.spawn_child(a, object(library, "ChildB", 3)).unwrap();
        (scene, parent, [a, single, b])
    }

    #[test]
    fn test_recursive_selection() {
        let library = ShaderLibrary::new();
        let (scene, parent, [a, single, b]) = family(&library);

        let targets = collect_targets(&scene, &[parent], true);
        assert_eq!(targets, vec![parent, a, b]);
        assert!(!targets.contains(&single));

        assert_eq!(collect_targets(&scene, &[parent], false), vec![parent]);
        assert_eq!(count_multi_material_descendants(&scene, parent), 2);
        assert_eq!(count_multi_material_descendants(&scene, b), 0);
    }

    #[test]
    fn test_selection_is_deduplicated() {
        let library = ShaderLibrary::new();
        let (scene, parent, [a, single, b]) = family(&library);

        let targets = collect_targets(&scene, &[a, parent, a], true);
        assert_eq!(targets, vec![a, parent, b]);

        // Explicit selection is kept even when ineligible
        let targets = collect_targets(&scene, &[single], true);
        assert_eq!(targets, vec![single]);
    }

    #[test]
    fn test_selected_objects_precede_descendants() {
        let library = ShaderLibrary::new();
        let mut scene = Scene::new();
        let first = scene.spawn(object(&library, "First", 2));
        let second = scene.spawn(object(&library, "Second", 2));
        let child = scene.spawn_child(first, object(&library, "Child", 2)).unwrap();

        let targets = collect_targets(&scene, &[first, second], true);
        assert_eq!(targets, vec![first, second, child]);
    }

    #[test]
    fn test_empty_selection() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());
        let library = ShaderLibrary::new();
        let config = CombinerConfig::default();
        let context = CombineContext {
            store: &store,
            device: &SoftwareDevice,
            shaders: &library,
            encoding: ColorEncoding::Gamma,
        };

        let summary = BatchRunner::new(context, &config).run_all(&mut Scene::new(), &[]);
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.errors, vec![NO_SELECTION_MESSAGE.to_string()]);
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());
        let library = ShaderLibrary::new();
        let config = CombinerConfig::default()
            .with_atlas_size(512)
            .with_timestamp_folder(false);
        let context = CombineContext {
            store: &store,
            device: &SoftwareDevice,
            shaders: &library,
            encoding: ColorEncoding::Linear,
        };

        let (mut scene, parent, [a, single, b]) = family(&library);
        let summary = BatchRunner::new(context, &config).run_all(&mut scene, &[single, parent, b]);

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.errors, vec!["Single: already single material".to_string()]);
        assert_eq!(summary.reports[0].object_name, "Parent");
        assert_eq!(summary.reports[1].object_name, "ChildB");
        assert!(!summary.is_success());

        // Unselected child untouched
        assert_eq!(scene.get(a).unwrap().material_count(), 2);
        assert_eq!(scene.get(b).unwrap().material_count(), 1);
    }

    #[test]
    fn test_recursive_batch_processes_three() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());
        let library = ShaderLibrary::new();
        let config = CombinerConfig::default()
            .with_atlas_size(512)
            .with_timestamp_folder(false)
            .with_recursive(true);
        let context = CombineContext {
            store: &store,
            device: &SoftwareDevice,
            shaders: &library,
            encoding: ColorEncoding::Gamma,
        };

        let (mut scene, parent, [_, single, _]) = family(&library);
        let summary = BatchRunner::new(context, &config).run_all(&mut scene, &[parent]);

        assert_eq!(summary.success_count, 3);
        assert!(summary.is_success());
        assert_eq!(scene.get(single).unwrap().mesh().unwrap().name, "Single");
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());
        let library = ShaderLibrary::new();
        let config = CombinerConfig::default().with_atlas_size(100);
        let context = CombineContext {
            store: &store,
            device: &SoftwareDevice,
            shaders: &library,
            encoding: ColorEncoding::Gamma,
        };

        let (mut scene, parent, _) = family(&library);
        let summary = BatchRunner::new(context, &config).run_all(&mut scene, &[parent]);
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("configuration:"));
    }
}
