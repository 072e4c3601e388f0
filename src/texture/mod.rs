//! Texture data and handles.
//!
//! [`TextureData`] is a CPU-side pixel grid. [`Texture`] wraps it with the
//! metadata the host attaches to a texture asset, most importantly whether
//! CPU code may read the pixels directly.

pub mod access;

pub use access::{
    create_default_texture, MaterialTextureIndex, ReadbackDevice, SoftwareDevice, TextureAccess,
    TextureResolutionPolicy, TextureSet, DEFAULT_TEXTURE_SIZE,
};

use crate::color::{pack_rgba8, ColorEncoding};
use crate::error::{CombinerError, Result};
use image::{ImageEncoder, RgbaImage};

/// Layout of the bytes in [`TextureData::pixels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4 bytes per pixel.
    Rgba8,
    /// 3 bytes per pixel, implicitly opaque.
    Rgb8,
    /// 1 byte per pixel, replicated to RGB, implicitly opaque.
    Luma8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Luma8 => 1,
        }
    }
}

/// Raw pixel grid, rows stored top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Pixel bytes, `width * height * format.bytes_per_pixel()` long.
    pub pixels: Vec<u8>,
    /// Encoding of the stored colour values.
    pub encoding: ColorEncoding,
}

impl TextureData {
    /// Create a new texture from RGBA data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, encoding: ColorEncoding) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            pixels,
            encoding,
        }
    }

    /// Create a texture with a non-RGBA layout.
    pub fn with_format(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
        encoding: ColorEncoding,
    ) -> Self {
        Self {
            width,
            height,
            format,
            pixels,
            encoding,
        }
    }

    /// Create a texture filled with one normalized colour, stored as given.
    pub fn solid(width: u32, height: u32, color: [f32; 4], encoding: ColorEncoding) -> Self {
        let px = pack_rgba8(color);
        let pixels = (0..width as usize * height as usize)
            .flat_map(|_| px)
            .collect();
        Self::new(width, height, pixels, encoding)
    }

    /// Number of bytes the declared size and format require.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Whether the pixel buffer matches the declared size and format.
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.expected_len()
    }

    /// Check if this texture has transparency.
    pub fn has_transparency(&self) -> bool {
        match self.format {
            PixelFormat::Rgba8 => self.pixels.chunks(4).any(|pixel| pixel[3] < 255),
            PixelFormat::Rgb8 | PixelFormat::Luma8 => false,
        }
    }

    /// Get a pixel at (x, y) as RGBA.
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let bpp = self.format.bytes_per_pixel();
        let idx = (y as usize * self.width as usize + x as usize) * bpp;
        match self.format {
            PixelFormat::Rgba8 => [
                self.pixels[idx],
                self.pixels[idx + 1],
                self.pixels[idx + 2],
                self.pixels[idx + 3],
            ],
            PixelFormat::Rgb8 => [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2], 255],
            PixelFormat::Luma8 => {
                let l = self.pixels[idx];
                [l, l, l, 255]
            }
        }
    }

    /// Expand to packed RGBA8 bytes.
    pub fn to_rgba8(&self) -> Result<Vec<u8>> {
        if !self.is_consistent() {
            return Err(CombinerError::InvalidTexture(format!(
                "{}x{} {:?} needs {} bytes, buffer has {}",
                self.width,
                self.height,
                self.format,
                self.expected_len(),
                self.pixels.len()
            )));
        }
        Ok(match self.format {
            PixelFormat::Rgba8 => self.pixels.clone(),
            PixelFormat::Rgb8 => self
                .pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            PixelFormat::Luma8 => self.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        })
    }

    /// Convert to an `image` buffer for resampling or encoding.
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        let rgba = self.to_rgba8()?;
        RgbaImage::from_raw(self.width, self.height, rgba).ok_or_else(|| {
            CombinerError::InvalidTexture(format!(
                "pixel buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }

    /// Export the texture as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let rgba = self.to_rgba8()?;
        let mut bytes = Vec::new();
        let cursor = std::io::Cursor::new(&mut bytes);
        let encoder = image::codecs::png::PngEncoder::new(cursor);

        encoder
            .write_image(&rgba, self.width, self.height, image::ExtendedColorType::Rgba8)
            .map_err(|e| CombinerError::AtlasBuild(format!("Failed to encode PNG: {}", e)))?;

        Ok(bytes)
    }
}

/// Load a texture from encoded image bytes, tagging it with `encoding`.
///
/// PNG carries no reliable colour-space flag, so the importer decides how the
/// values are interpreted.
pub fn load_texture_from_bytes(data: &[u8], encoding: ColorEncoding) -> Result<TextureData> {
    let img = image::load_from_memory(data)?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(TextureData::new(width, height, rgba.into_raw(), encoding))
}

/// A texture asset as the host sees it.
#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub data: TextureData,
    /// When false the pixels live on the GPU only and must go through a
    /// [`ReadbackDevice`] before CPU code may use them.
    pub readable: bool,
    /// Project path of the persisted asset, if any.
    pub asset_path: Option<String>,
}

impl Texture {
    /// A CPU-readable texture.
    pub fn new(name: impl Into<String>, data: TextureData) -> Self {
        Self {
            name: name.into(),
            data,
            readable: true,
            asset_path: None,
        }
    }

    /// A texture whose pixels are GPU resident.
    pub fn gpu_only(name: impl Into<String>, data: TextureData) -> Self {
        Self {
            readable: false,
            ..Self::new(name, data)
        }
    }

    pub fn with_asset_path(mut self, path: impl Into<String>) -> Self {
        self.asset_path = Some(path.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.data.width
    }

    pub fn height(&self) -> u32 {
        self.data.height
    }

    /// Name used when the texture is referenced from a persisted material.
    pub fn reference(&self) -> &str {
        self.asset_path.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_pixel() {
        let tex = TextureData::new(
            2,
            2,
            vec![255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255],
            ColorEncoding::Gamma,
        );

        assert_eq!(tex.get_pixel(0, 0), [255, 0, 0, 255]); // Red
        assert_eq!(tex.get_pixel(1, 0), [0, 255, 0, 255]); // Green
        assert_eq!(tex.get_pixel(0, 1), [0, 0, 255, 255]); // Blue
        assert_eq!(tex.get_pixel(1, 1), [255, 255, 255, 255]); // White
    }

    #[test]
    fn test_has_transparency() {
        let opaque = TextureData::new(1, 1, vec![255, 0, 0, 255], ColorEncoding::Gamma);
        assert!(!opaque.has_transparency());

        let transparent = TextureData::new(1, 1, vec![255, 0, 0, 128], ColorEncoding::Gamma);
        assert!(transparent.has_transparency());
    }

    #[test]
    fn test_rgb_and_luma_expand_to_rgba() {
        let rgb = TextureData::with_format(
            2,
            1,
            PixelFormat::Rgb8,
            vec![1, 2, 3, 4, 5, 6],
            ColorEncoding::Gamma,
        );
        assert_eq!(rgb.to_rgba8().unwrap(), vec![1, 2, 3, 255, 4, 5, 6, 255]);

        let luma = TextureData::with_format(1, 1, PixelFormat::Luma8, vec![9], ColorEncoding::Gamma);
        assert_eq!(luma.get_pixel(0, 0), [9, 9, 9, 255]);
    }

    #[test]
    fn test_inconsistent_buffer_is_rejected() {
        let broken = TextureData::new(4, 4, vec![0; 3], ColorEncoding::Gamma);
        assert!(!broken.is_consistent());
        assert!(broken.to_rgba8().is_err());
    }

    #[test]
    fn test_png_round_trip_keeps_pixels() {
        let tex = TextureData::solid(3, 2, [1.0, 0.0, 0.5, 1.0], ColorEncoding::Linear);
        let png = tex.to_png().unwrap();
        let loaded = load_texture_from_bytes(&png, ColorEncoding::Linear).unwrap();
        assert_eq!(loaded.width, 3);
        assert_eq!(loaded.height, 2);
        assert_eq!(loaded.pixels, tex.pixels);
        assert_eq!(loaded.encoding, ColorEncoding::Linear);
    }
}
