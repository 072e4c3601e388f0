//! Texture resolution, readback and default substitution.
//!
//! Given a material, [`TextureResolutionPolicy`] decides which slot supplies
//! its texture. [`TextureAccess`] then makes that texture CPU-readable and
//! substitutes a solid default when nothing usable is found, building the
//! ordered texture list handed to the atlas packer together with the
//! material-to-texture index the remapper reads later.

use super::{Texture, TextureData};
use crate::color::{unpack_rgba8, ColorEncoding};
use crate::error::{CombinerError, Result};
use crate::material::{Material, MAIN_TEXTURE_PROPERTY};
use log::{debug, error, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Side length of the substitute texture for materials without one.
pub const DEFAULT_TEXTURE_SIZE: u32 = 64;

/// Material ordinal -> index into the packed texture list.
pub type MaterialTextureIndex = BTreeMap<usize, usize>;

/// Which texture slot a material contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureResolutionPolicy {
    /// Read the main texture slot only.
    pub use_main_slot_by_default: bool,
    /// Slot tried first when `use_main_slot_by_default` is false.
    pub custom_slot_name: String,
}

impl Default for TextureResolutionPolicy {
    fn default() -> Self {
        Self {
            use_main_slot_by_default: true,
            custom_slot_name: MAIN_TEXTURE_PROPERTY.to_string(),
        }
    }
}

impl TextureResolutionPolicy {
    pub fn main_slot() -> Self {
        Self::default()
    }

    pub fn custom_slot(name: impl Into<String>) -> Self {
        Self {
            use_main_slot_by_default: false,
            custom_slot_name: name.into(),
        }
    }

    /// Resolve the texture `material` contributes.
    ///
    /// With a custom slot configured, a declared and non-empty custom slot
    /// wins; otherwise the main slot is used. `None` is not an error.
    pub fn resolve(&self, material: &Material) -> Option<Arc<Texture>> {
        if !self.use_main_slot_by_default && material.has_property(&self.custom_slot_name) {
            if let Some(texture) = material.texture(&self.custom_slot_name) {
                debug!(
                    "Material {} uses texture slot {}",
                    material.name, self.custom_slot_name
                );
                return Some(texture.clone());
            }
        }

        let texture = material.main_texture().cloned();
        if texture.is_some() {
            debug!("Material {} uses its main texture", material.name);
        }
        texture
    }
}

/// Copies GPU-resident pixels into CPU memory.
///
/// One blocking round trip per call: the blit into an offscreen buffer in
/// `target` encoding completes before the pixels are returned.
pub trait ReadbackDevice {
    fn read_back(&self, source: &Texture, target: ColorEncoding) -> Result<TextureData>;
}

/// CPU stand-in for the GPU blit.
///
/// Renders the source into an RGBA8 buffer in the target encoding with point
/// sampling, so pixel values are preserved apart from the encoding change.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareDevice;

impl ReadbackDevice for SoftwareDevice {
    fn read_back(&self, source: &Texture, target: ColorEncoding) -> Result<TextureData> {
        let data = &source.data;
        if data.width == 0 || data.height == 0 {
            return Err(CombinerError::Readback(format!(
                "{} has an empty {}x{} surface",
                source.name, data.width, data.height
            )));
        }
        let mut pixels = data
            .to_rgba8()
            .map_err(|e| CombinerError::Readback(format!("{}: {}", source.name, e)))?;
        ColorEncoding::transcode_rgba8(&mut pixels, data.encoding, target);

        Ok(TextureData::new(data.width, data.height, pixels, target))
    }
}

/// Allocate a solid white texture pre-encoded for `encoding`.
pub fn create_default_texture(width: u32, height: u32, encoding: ColorEncoding) -> TextureData {
    let white = encoding.encode_display_color([1.0, 1.0, 1.0, 1.0]);
    TextureData::solid(width, height, white, encoding)
}

/// Ordered textures for the atlas plus the index into them per material.
///
/// Both halves are built in the same pass so positions stay aligned with the
/// rects the packer returns.
#[derive(Debug, Clone, Default)]
pub struct TextureSet {
    pub textures: Vec<Arc<Texture>>,
    pub material_to_texture: MaterialTextureIndex,
    /// Material ordinals that received the default texture.
    pub substituted: Vec<usize>,
}

impl TextureSet {
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }
}

/// Texture lookups in one working colour encoding.
pub struct TextureAccess<'a> {
    device: &'a dyn ReadbackDevice,
    encoding: ColorEncoding,
}

impl<'a> TextureAccess<'a> {
    pub fn new(device: &'a dyn ReadbackDevice, encoding: ColorEncoding) -> Self {
        Self { device, encoding }
    }

    pub fn encoding(&self) -> ColorEncoding {
        self.encoding
    }

    /// Return a CPU-readable version of `texture`.
    ///
    /// A readable texture is returned as the same handle. Otherwise the
    /// device copies it into a new readable texture; on failure this logs and
    /// returns `None` so the caller can substitute a default.
    pub fn make_readable(&self, texture: &Arc<Texture>) -> Option<Arc<Texture>> {
        if texture.readable {
            return Some(texture.clone());
        }

        match self.device.read_back(texture, self.encoding) {
            Ok(data) => {
                debug!(
                    "Copied {} to a readable {}x{} texture",
                    texture.name, data.width, data.height
                );
                Some(Arc::new(Texture::new(texture.name.clone(), data)))
            }
            Err(e) => {
                error!("Failed to copy texture {}: {}", texture.name, e);
                None
            }
        }
    }

    /// Default substitute texture in the working encoding.
    pub fn create_default(&self, width: u32, height: u32) -> Arc<Texture> {
        Arc::new(Texture::new(
            "Default",
            create_default_texture(width, height, self.encoding),
        ))
    }

    /// Resolve every material slot into the texture set.
    ///
    /// Empty slots get no entry. Materials without a usable texture get the
    /// 64x64 default.
    pub fn collect(
        &self,
        materials: &[Option<Arc<Material>>],
        policy: &TextureResolutionPolicy,
    ) -> TextureSet {
        let mut set = TextureSet::default();

        for (i, material) in materials.iter().enumerate() {
            let Some(material) = material else {
                warn!("Material slot {} is empty, skipping", i);
                continue;
            };

            let resolved = policy.resolve(material);
            let texture = match resolved.as_ref().and_then(|t| self.make_readable(t)) {
                Some(texture) => texture,
                None => {
                    if resolved.is_some() {
                        warn!(
                            "Texture of material {} could not be read, using default texture",
                            material.name
                        );
                    } else {
                        warn!(
                            "Material {} ({}) has no texture, using default texture",
                            i, material.name
                        );
                    }
                    set.substituted.push(i);
                    self.create_default(DEFAULT_TEXTURE_SIZE, DEFAULT_TEXTURE_SIZE)
                }
            };

            set.textures.push(texture);
            set.material_to_texture.insert(i, set.textures.len() - 1);
        }

        set
    }
}

/// Average colour of a texture, for diagnostics.
pub(crate) fn average_color(data: &TextureData) -> Option<[f32; 4]> {
    if data.width == 0 || data.height == 0 || !data.is_consistent() {
        return None;
    }
    let count = (data.width * data.height) as f32;
    let mut sum = [0.0f32; 4];
    for y in 0..data.height {
        for x in 0..data.width {
            let c = unpack_rgba8(data.get_pixel(x, y));
            for i in 0..4 {
                sum[i] += c[i];
            }
        }
    }
    Some(sum.map(|s| s / count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{PropertyKind, Shader};
    use crate::texture::PixelFormat;

    struct FailingDevice;

    impl ReadbackDevice for FailingDevice {
        fn read_back(&self, source: &Texture, _target: ColorEncoding) -> Result<TextureData> {
            Err(CombinerError::Readback(format!("device lost for {}", source.name)))
        }
    }

    fn solid(name: &str, color: [f32; 4]) -> Arc<Texture> {
        Arc::new(Texture::new(
            name,
            TextureData::solid(32, 32, color, ColorEncoding::Gamma),
        ))
    }

    fn material_with_main(texture: Option<Arc<Texture>>) -> Material {
        let mut material = Material::new("mat", Arc::new(Shader::standard()));
        material.set_main_texture(texture);
        material
    }

    #[test]
    fn test_main_slot_is_resolved() {
        let texture = solid("main", [1.0, 0.0, 0.0, 1.0]);
        let material = material_with_main(Some(texture.clone()));

        let resolved = TextureResolutionPolicy::main_slot().resolve(&material).unwrap();
        assert!(Arc::ptr_eq(&resolved, &texture));
    }

    #[test]
    fn test_custom_slot_is_preferred() {
        let main = solid("main", [1.0, 0.0, 0.0, 1.0]);
        let emission = solid("emission", [0.0, 1.0, 0.0, 1.0]);
        let mut material = material_with_main(Some(main));
        material.set_texture("_EmissionMap", Some(emission.clone()));

        let resolved = TextureResolutionPolicy::custom_slot("_EmissionMap")
            .resolve(&material)
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &emission));
    }

    #[test]
    fn test_main_slot_policy_ignores_custom_slot() {
        let main = solid("main", [1.0, 0.0, 0.0, 1.0]);
        let mut material = material_with_main(Some(main.clone()));
        material.set_texture("_EmissionMap", Some(solid("emission", [0.0; 4])));

        let policy = TextureResolutionPolicy {
            use_main_slot_by_default: true,
            custom_slot_name: "_EmissionMap".to_string(),
        };
        assert!(Arc::ptr_eq(&policy.resolve(&material).unwrap(), &main));
    }

    #[test]
    fn test_custom_slot_falls_back_to_main() {
        let main = solid("main", [1.0, 0.0, 0.0, 1.0]);
        let material = material_with_main(Some(main.clone()));

        // Declared but empty
        let resolved = TextureResolutionPolicy::custom_slot("_EmissionMap")
            .resolve(&material)
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &main));

        // Not declared by the shader at all
        let resolved = TextureResolutionPolicy::custom_slot("_DetailAlbedoMap")
            .resolve(&material)
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &main));
    }

    #[test]
    fn test_undeclared_custom_slot_value_is_ignored() {
        let shader = Shader::new("Bare").with_property(MAIN_TEXTURE_PROPERTY, PropertyKind::Texture);
        let mut material = Material::new("m", Arc::new(shader));
        material.set_texture("_Hidden", Some(solid("hidden", [0.0; 4])));

        assert!(TextureResolutionPolicy::custom_slot("_Hidden")
            .resolve(&material)
            .is_none());
    }

    #[test]
    fn test_no_texture_resolves_to_none() {
        let material = material_with_main(None);
        assert!(TextureResolutionPolicy::main_slot().resolve(&material).is_none());
        assert!(TextureResolutionPolicy::custom_slot("_EmissionMap")
            .resolve(&material)
            .is_none());
    }

    #[test]
    fn test_readable_texture_is_returned_unchanged() {
        let access = TextureAccess::new(&SoftwareDevice, ColorEncoding::Gamma);
        let texture = solid("readable", [0.5, 0.5, 0.5, 1.0]);

        let result = access.make_readable(&texture).unwrap();
        assert!(Arc::ptr_eq(&result, &texture));
    }

    #[test]
    fn test_gpu_only_texture_is_copied() {
        let access = TextureAccess::new(&SoftwareDevice, ColorEncoding::Gamma);
        let red = TextureData::with_format(
            2,
            1,
            PixelFormat::Rgb8,
            vec![255, 0, 0, 255, 0, 0],
            ColorEncoding::Gamma,
        );
        let texture = Arc::new(Texture::gpu_only("red", red));

        let result = access.make_readable(&texture).unwrap();
        assert!(!Arc::ptr_eq(&result, &texture));
        assert!(result.readable);
        assert_eq!(result.data.format, PixelFormat::Rgba8);
        assert_eq!(result.data.get_pixel(1, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn test_readback_converts_to_working_encoding() {
        let access = TextureAccess::new(&SoftwareDevice, ColorEncoding::Linear);
        let grey = TextureData::solid(1, 1, [0.5, 0.5, 0.5, 1.0], ColorEncoding::Gamma);
        let texture = Arc::new(Texture::gpu_only("grey", grey));

        let result = access.make_readable(&texture).unwrap();
        assert_eq!(result.data.encoding, ColorEncoding::Linear);
        // 0.5 in gamma is ~0.218 in linear
        let px = result.data.get_pixel(0, 0);
        assert!(px[0] > 50 && px[0] < 60, "got {}", px[0]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_failed_readback_returns_none() {
        let access = TextureAccess::new(&FailingDevice, ColorEncoding::Gamma);
        let texture = Arc::new(Texture::gpu_only(
            "lost",
            TextureData::solid(4, 4, [1.0; 4], ColorEncoding::Gamma),
        ));
        assert!(access.make_readable(&texture).is_none());
    }

    #[test]
    fn test_default_texture_is_white_in_both_encodings() {
        for encoding in [ColorEncoding::Gamma, ColorEncoding::Linear] {
            let data = create_default_texture(8, 4, encoding);
            assert_eq!(data.width, 8);
            assert_eq!(data.height, 4);
            assert_eq!(data.encoding, encoding);
            assert!(data.pixels.iter().all(|&b| b == 255));
        }
    }

    #[test]
    fn test_collect_aligns_indices_and_substitutes_defaults() {
        let access = TextureAccess::new(&FailingDevice, ColorEncoding::Gamma);
        let red = solid("red", [1.0, 0.0, 0.0, 1.0]);
        let lost = Arc::new(Texture::gpu_only(
            "lost",
            TextureData::solid(16, 16, [0.0; 4], ColorEncoding::Gamma),
        ));

        let materials = vec![
            Some(Arc::new(material_with_main(Some(red.clone())))),
            None,
            Some(Arc::new(material_with_main(None))),
            Some(Arc::new(material_with_main(Some(lost)))),
        ];

        let set = access.collect(&materials, &TextureResolutionPolicy::main_slot());

        assert_eq!(set.len(), 3);
        assert_eq!(set.material_to_texture.get(&0), Some(&0));
        assert_eq!(set.material_to_texture.get(&1), None);
        assert_eq!(set.material_to_texture.get(&2), Some(&1));
        assert_eq!(set.material_to_texture.get(&3), Some(&2));
        assert_eq!(set.substituted, vec![2, 3]);

        assert!(Arc::ptr_eq(&set.textures[0], &red));
        assert_eq!(set.textures[1].width(), DEFAULT_TEXTURE_SIZE);
        assert_eq!(set.textures[2].height(), DEFAULT_TEXTURE_SIZE);
    }

    #[test]
    fn test_collect_with_only_empty_slots_is_empty() {
        let access = TextureAccess::new(&SoftwareDevice, ColorEncoding::Gamma);
        let set = access.collect(&[None, None], &TextureResolutionPolicy::main_slot());
        assert!(set.is_empty());
        assert!(set.material_to_texture.is_empty());
    }

    #[test]
    fn test_average_color_of_solid_texture() {
        let data = TextureData::solid(4, 4, [1.0, 0.0, 0.0, 1.0], ColorEncoding::Gamma);
        let avg = average_color(&data).unwrap();
        assert_eq!(avg, [1.0, 0.0, 0.0, 1.0]);
    }
}
