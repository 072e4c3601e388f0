//! Combiner configuration.

use crate::error::{CombinerError, Result};
use crate::material::{ShaderChoice, MAIN_TEXTURE_PROPERTY};
use crate::texture::TextureResolutionPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Atlas sizes offered to the operator.
pub const ATLAS_SIZE_CHOICES: [u32; 5] = [512, 1024, 2048, 4096, 8192];

/// Configuration for combining objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CombinerConfig {
    /// Project folder receiving one subfolder per object.
    pub output_base_path: String,
    /// Atlas side length in pixels.
    pub atlas_size: u32,
    /// Pixels of padding around each packed texture.
    pub padding: u32,
    /// Suffix output folders with `yyyyMMdd_HHmmss`.
    pub use_timestamp_folder: bool,
    /// Reuse the source material's shader for the combined material.
    pub keep_original_shader: bool,
    /// Shader used when not keeping the original one.
    pub default_shader_name: String,
    /// Read textures from the main slot only.
    pub use_main_texture_by_default: bool,
    /// Texture slot tried first when not using the main slot.
    pub custom_texture_property_name: String,
    /// Append `_N` instead of reusing an existing output folder.
    pub prevent_overwrite: bool,
    /// Also combine descendants that hold several materials.
    pub process_children_recursively: bool,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self {
            output_base_path: "Assets/Combined".to_string(),
            atlas_size: 2048,
            padding: 2,
            use_timestamp_folder: true,
            keep_original_shader: true,
            default_shader_name: String::new(),
            use_main_texture_by_default: true,
            custom_texture_property_name: MAIN_TEXTURE_PROPERTY.to_string(),
            prevent_overwrite: true,
            process_children_recursively: false,
        }
    }
}

impl CombinerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !ATLAS_SIZE_CHOICES.contains(&self.atlas_size) {
            return Err(CombinerError::InvalidConfig(format!(
                "atlasSize {} is not one of {:?}",
                self.atlas_size, ATLAS_SIZE_CHOICES
            )));
        }
        if self.padding.saturating_mul(2) >= self.atlas_size {
            return Err(CombinerError::InvalidConfig(format!(
                "padding {} leaves no room in a {} atlas",
                self.padding, self.atlas_size
            )));
        }
        if self.output_base_path.trim_matches('/').is_empty() {
            return Err(CombinerError::InvalidConfig(
                "outputBasePath must not be empty".to_string(),
            ));
        }
        if !self.use_main_texture_by_default && self.custom_texture_property_name.is_empty() {
            return Err(CombinerError::InvalidConfig(
                "customTexturePropertyName must be set when not using the main texture".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_atlas_size(mut self, size: u32) -> Self {
        self.atlas_size = size;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_output_base_path(mut self, path: impl Into<String>) -> Self {
        self.output_base_path = path.into();
        self
    }

    /// Use a fixed named shader instead of the source material's.
    pub fn with_shader(mut self, name: impl Into<String>) -> Self {
        self.keep_original_shader = false;
        self.default_shader_name = name.into();
        self
    }

    /// Prefer a custom texture slot over the main one.
    pub fn with_custom_texture_property(mut self, name: impl Into<String>) -> Self {
        self.use_main_texture_by_default = false;
        self.custom_texture_property_name = name.into();
        self
    }

    pub fn with_timestamp_folder(mut self, enabled: bool) -> Self {
        self.use_timestamp_folder = enabled;
        self
    }

    pub fn with_recursive(mut self, enabled: bool) -> Self {
        self.process_children_recursively = enabled;
        self
    }

    pub fn texture_policy(&self) -> TextureResolutionPolicy {
        TextureResolutionPolicy {
            use_main_slot_by_default: self.use_main_texture_by_default,
            custom_slot_name: self.custom_texture_property_name.clone(),
        }
    }

    pub fn shader_choice(&self) -> ShaderChoice {
        if self.keep_original_shader {
            ShaderChoice::KeepOriginal
        } else {
            ShaderChoice::Named(self.default_shader_name.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CombinerConfig::default();
        assert_eq!(config.output_base_path, "Assets/Combined");
        assert_eq!(config.atlas_size, 2048);
        assert_eq!(config.padding, 2);
        assert!(config.use_timestamp_folder);
        assert!(config.prevent_overwrite);
        assert!(!config.process_children_recursively);
        assert_eq!(config.custom_texture_property_name, MAIN_TEXTURE_PROPERTY);
        assert!(config.validate().is_ok());
        assert_eq!(config.shader_choice(), ShaderChoice::KeepOriginal);
        assert_eq!(config.texture_policy(), TextureResolutionPolicy::main_slot());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CombinerConfig::from_json_str(
            r#"{ "atlasSize": 512, "keepOriginalShader": false, "defaultShaderName": "Unlit/Texture" }"#,
        )
        .unwrap();

        assert_eq!(config.atlas_size, 512);
        assert_eq!(config.padding, 2);
        assert_eq!(
            config.shader_choice(),
            ShaderChoice::Named("Unlit/Texture".to_string())
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_size = CombinerConfig::default().with_atlas_size(1000);
        assert!(matches!(bad_size.validate(), Err(CombinerError::InvalidConfig(_))));

        let bad_padding = CombinerConfig::default().with_atlas_size(512).with_padding(256);
        assert!(bad_padding.validate().is_err());

        let no_base = CombinerConfig::default().with_output_base_path("/");
        assert!(no_base.validate().is_err());

        let no_slot = CombinerConfig::default().with_custom_texture_property("");
        assert!(no_slot.validate().is_err());

        assert!(CombinerConfig::from_json_str(r#"{ "atlasSize": 300 }"#).is_err());
    }

    #[test]
    fn test_custom_slot_policy() {
        let config = CombinerConfig::default().with_custom_texture_property("_BaseMap");
        let policy = config.texture_policy();
        assert!(!policy.use_main_slot_by_default);
        assert_eq!(policy.custom_slot_name, "_BaseMap");
    }
}
