//! Shaders, materials and their property bags.
//!
//! A [`Shader`] declares which named properties exist and of which kind. A
//! [`Material`] references a shader and stores values for those names, plus
//! enabled keywords and a render queue. Property access is by name and tagged
//! value, so copying between materials iterates declarations instead of
//! relying on reflection.

pub mod merge;

pub use merge::{copy_material_properties, CopyStats, MaterialMerger, ShaderChoice};

use crate::texture::Texture;
use glam::Vec4;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Conventional name of the main texture slot.
pub const MAIN_TEXTURE_PROPERTY: &str = "_MainTex";
/// Built-in fallback shader used when a configured shader is missing.
pub const UNLIT_TEXTURE_SHADER: &str = "Unlit/Texture";
/// Built-in lit shader.
pub const STANDARD_SHADER: &str = "Standard";
/// Render queue of opaque geometry.
pub const DEFAULT_RENDER_QUEUE: i32 = 2000;

/// Kind of a shader-declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Color,
    Vector,
    Float,
    Range,
    Texture,
    /// Integer properties; not copied between materials.
    Int,
}

/// One property declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderProperty {
    pub name: String,
    pub kind: PropertyKind,
}

fn default_main_texture() -> String {
    MAIN_TEXTURE_PROPERTY.to_string()
}

fn default_render_queue() -> i32 {
    DEFAULT_RENDER_QUEUE
}

/// A shader: a name and its declared properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shader {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<ShaderProperty>,
    /// Property that acts as the main texture slot.
    #[serde(default = "default_main_texture")]
    pub main_texture: String,
    /// Render queue new materials start with.
    #[serde(default = "default_render_queue")]
    pub render_queue: i32,
}

impl Shader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            main_texture: default_main_texture(),
            render_queue: DEFAULT_RENDER_QUEUE,
        }
    }

    /// Declare a property.
    pub fn with_property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.push(ShaderProperty {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn with_render_queue(mut self, queue: i32) -> Self {
        self.render_queue = queue;
        self
    }

    /// Check whether the shader declares `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.name == name)
    }

    pub fn property_kind(&self, name: &str) -> Option<PropertyKind> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.kind)
    }

    /// The built-in unlit textured shader.
    pub fn unlit_texture() -> Self {
        Self::new(UNLIT_TEXTURE_SHADER).with_property(MAIN_TEXTURE_PROPERTY, PropertyKind::Texture)
    }

    /// The built-in lit shader.
    pub fn standard() -> Self {
        Self::new(STANDARD_SHADER)
            .with_property("_Color", PropertyKind::Color)
            .with_property(MAIN_TEXTURE_PROPERTY, PropertyKind::Texture)
            .with_property("_Cutoff", PropertyKind::Range)
            .with_property("_Glossiness", PropertyKind::Range)
            .with_property("_Metallic", PropertyKind::Range)
            .with_property("_BumpScale", PropertyKind::Float)
            .with_property("_BumpMap", PropertyKind::Texture)
            .with_property("_EmissionColor", PropertyKind::Color)
            .with_property("_EmissionMap", PropertyKind::Texture)
            .with_property("_Mode", PropertyKind::Float)
    }
}

/// Tagged property value.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Color(Vec4),
    Vector(Vec4),
    Float(f32),
    Int(i32),
    Texture(Option<Arc<Texture>>),
}

impl PropertyValue {
    /// Whether this value can be stored in a property of `kind`.
    pub fn matches(&self, kind: PropertyKind) -> bool {
        matches!(
            (self, kind),
            (PropertyValue::Color(_), PropertyKind::Color)
                | (PropertyValue::Vector(_), PropertyKind::Vector)
                | (PropertyValue::Float(_), PropertyKind::Float | PropertyKind::Range)
                | (PropertyValue::Int(_), PropertyKind::Int)
                | (PropertyValue::Texture(_), PropertyKind::Texture)
        )
    }
}

/// A material instance.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    shader: Arc<Shader>,
    properties: BTreeMap<String, PropertyValue>,
    keywords: BTreeSet<String>,
    render_queue: i32,
}

impl Material {
    pub fn new(name: impl Into<String>, shader: Arc<Shader>) -> Self {
        let render_queue = shader.render_queue;
        Self {
            name: name.into(),
            shader,
            properties: BTreeMap::new(),
            keywords: BTreeSet::new(),
            render_queue,
        }
    }

    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    /// Check whether the material's shader declares `name`.
    pub fn has_property(&self, name: &str) -> bool {
        self.shader.declares(name)
    }

    /// Stored value for `name`, if one was set.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.properties.insert(name.into(), value);
    }

    /// All stored values, ordered by name.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn texture(&self, name: &str) -> Option<&Arc<Texture>> {
        match self.properties.get(name) {
            Some(PropertyValue::Texture(Some(texture))) => Some(texture),
            _ => None,
        }
    }

    pub fn set_texture(&mut self, name: impl Into<String>, texture: Option<Arc<Texture>>) {
        self.set(name, PropertyValue::Texture(texture));
    }

    /// Texture in the shader's main texture slot.
    pub fn main_texture(&self) -> Option<&Arc<Texture>> {
        self.texture(&self.shader.main_texture)
    }

    pub fn set_main_texture(&mut self, texture: Option<Arc<Texture>>) {
        let slot = self.shader.main_texture.clone();
        self.set_texture(slot, texture);
    }

    pub fn color(&self, name: &str) -> Option<Vec4> {
        match self.properties.get(name) {
            Some(PropertyValue::Color(c)) => Some(*c),
            _ => None,
        }
    }

    pub fn set_color(&mut self, name: impl Into<String>, color: Vec4) {
        self.set(name, PropertyValue::Color(color));
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.properties.get(name) {
            Some(PropertyValue::Float(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn set_float(&mut self, name: impl Into<String>, value: f32) {
        self.set(name, PropertyValue::Float(value));
    }

    pub fn vector(&self, name: &str) -> Option<Vec4> {
        match self.properties.get(name) {
            Some(PropertyValue::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn set_vector(&mut self, name: impl Into<String>, value: Vec4) {
        self.set(name, PropertyValue::Vector(value));
    }

    pub fn enable_keyword(&mut self, keyword: impl Into<String>) {
        self.keywords.insert(keyword.into());
    }

    pub fn is_keyword_enabled(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn render_queue(&self) -> i32 {
        self.render_queue
    }

    pub fn set_render_queue(&mut self, queue: i32) {
        self.render_queue = queue;
    }
}

/// Shaders available to the combiner, looked up by name.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    shaders: HashMap<String, Arc<Shader>>,
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderLibrary {
    /// Library holding the built-in shaders.
    pub fn new() -> Self {
        let mut library = Self {
            shaders: HashMap::new(),
        };
        library.register(Shader::unlit_texture());
        library.register(Shader::standard());
        library
    }

    /// Add or replace a shader, returning the shared handle.
    pub fn register(&mut self, shader: Shader) -> Arc<Shader> {
        let shader = Arc::new(shader);
        self.shaders.insert(shader.name.clone(), shader.clone());
        shader
    }

    pub fn find(&self, name: &str) -> Option<Arc<Shader>> {
        self.shaders.get(name).cloned()
    }

    /// The unlit textured shader, even if it was replaced or never registered.
    pub fn fallback(&self) -> Arc<Shader> {
        self.find(UNLIT_TEXTURE_SHADER)
            .unwrap_or_else(|| Arc::new(Shader::unlit_texture()))
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

/// Serialized form of a property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyAsset {
    Color([f32; 4]),
    Vector([f32; 4]),
    Float(f32),
    Int(i32),
    /// Texture reference by asset path (or name when never persisted).
    Texture(Option<String>),
}

/// Serialized form of a material, written as the `.mat` asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialAsset {
    pub name: String,
    pub shader: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyAsset>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub render_queue: Option<i32>,
}

impl From<&Material> for MaterialAsset {
    fn from(material: &Material) -> Self {
        let properties = material
            .properties()
            .map(|(name, value)| {
                let asset = match value {
                    PropertyValue::Color(c) => PropertyAsset::Color(c.to_array()),
                    PropertyValue::Vector(v) => PropertyAsset::Vector(v.to_array()),
                    PropertyValue::Float(f) => PropertyAsset::Float(*f),
                    PropertyValue::Int(i) => PropertyAsset::Int(*i),
                    PropertyValue::Texture(t) => {
                        PropertyAsset::Texture(t.as_ref().map(|t| t.reference().to_string()))
                    }
                };
                (name.to_string(), asset)
            })
            .collect();

        Self {
            name: material.name.clone(),
            shader: material.shader().name.clone(),
            properties,
            keywords: material.keywords().map(str::to_string).collect(),
            render_queue: Some(material.render_queue()),
        }
    }
}
