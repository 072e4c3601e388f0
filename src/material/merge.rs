//! Building the combined material.
//!
//! The combined material carries the atlas in its main slot (and the custom
//! slot when one is in use) and a best-effort copy of the representative
//! source material's scalar, vector and colour properties, keywords and render
//! queue. Properties the destination shader does not declare are dropped.

use super::{Material, PropertyKind, Shader, ShaderLibrary};
use crate::texture::{Texture, TextureResolutionPolicy};
use log::{debug, warn};
use std::sync::Arc;

/// Where the combined material's shader comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderChoice {
    /// Reuse the source material's shader.
    KeepOriginal,
    /// Look up a shader by name, falling back to the unlit textured shader.
    Named(String),
}

impl ShaderChoice {
    /// Pick the shader for a material combined from `source`.
    pub fn select(&self, source: &Material, library: &ShaderLibrary) -> Arc<Shader> {
        match self {
            ShaderChoice::KeepOriginal => source.shader().clone(),
            ShaderChoice::Named(name) => library.find(name).unwrap_or_else(|| {
                let fallback = library.fallback();
                warn!(
                    "Shader '{}' not found, using {} instead",
                    name, fallback.name
                );
                fallback
            }),
        }
    }
}

/// Outcome counts of a property copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Values written to the destination.
    pub copied: usize,
    /// Texture properties left alone.
    pub skipped_textures: usize,
    /// Declared on the source only.
    pub missing_on_destination: usize,
    /// Kinds that are never copied, or values whose kind disagrees.
    pub unsupported: usize,
}

/// Copy declared properties, keywords and render queue from `source`.
///
/// Colour, float, range and vector values are copied by value when the
/// destination declares the same name. Textures are skipped. Keywords are
/// only ever added.
pub fn copy_material_properties(source: &Material, destination: &mut Material) -> CopyStats {
    let mut stats = CopyStats::default();

    debug!(
        "Copying material properties: {} ({}) -> {} ({})",
        source.name,
        source.shader().name,
        destination.name,
        destination.shader().name
    );

    for property in &source.shader().properties {
        let Some(destination_kind) = destination.shader().property_kind(&property.name) else {
            debug!("Property '{}' is not on the destination material", property.name);
            stats.missing_on_destination += 1;
            continue;
        };

        match property.kind {
            PropertyKind::Texture => {
                stats.skipped_textures += 1;
            }
            PropertyKind::Color | PropertyKind::Float | PropertyKind::Range | PropertyKind::Vector => {
                let Some(value) = source.get(&property.name) else {
                    continue;
                };
                if value.matches(property.kind) && value.matches(destination_kind) {
                    destination.set(property.name.clone(), value.clone());
                    stats.copied += 1;
                } else {
                    warn!(
                        "Property '{}' holds a value that does not fit {:?} -> {:?}",
                        property.name, property.kind, destination_kind
                    );
                    stats.unsupported += 1;
                }
            }
            PropertyKind::Int => {
                warn!(
                    "Unsupported property type {:?} for {}",
                    property.kind, property.name
                );
                stats.unsupported += 1;
            }
        }
    }

    for keyword in source.keywords() {
        if !destination.is_keyword_enabled(keyword) {
            debug!("Enabling shader keyword {}", keyword);
            destination.enable_keyword(keyword);
        }
    }

    destination.set_render_queue(source.render_queue());

    debug!(
        "Copied {} properties ({} textures skipped, {} not on destination)",
        stats.copied, stats.skipped_textures, stats.missing_on_destination
    );
    stats
}

/// Creates combined materials from an atlas and a representative source.
pub struct MaterialMerger<'a> {
    library: &'a ShaderLibrary,
}

impl<'a> MaterialMerger<'a> {
    pub fn new(library: &'a ShaderLibrary) -> Self {
        Self { library }
    }

    /// Build the combined material.
    pub fn merge(
        &self,
        choice: &ShaderChoice,
        atlas: &Arc<Texture>,
        source: &Material,
        policy: &TextureResolutionPolicy,
        name: impl Into<String>,
    ) -> Material {
        let shader = choice.select(source, self.library);
        let mut combined = Material::new(name, shader);

        if !policy.use_main_slot_by_default && combined.has_property(&policy.custom_slot_name) {
            combined.set_texture(policy.custom_slot_name.clone(), Some(atlas.clone()));
            debug!("Assigned atlas to {}", policy.custom_slot_name);
        }
        combined.set_main_texture(Some(atlas.clone()));

        copy_material_properties(source, &mut combined);
        combined
    }
}
