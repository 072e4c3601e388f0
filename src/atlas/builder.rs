//! Texture atlas builder using MaxRects packing.

use crate::assets::AssetStore;
use crate::color::{gamma_to_linear, linear_to_gamma, pack_rgba8, unpack_rgba8, ColorEncoding};
use crate::error::{CombinerError, Result};
use crate::texture::{Texture, TextureData};
use glam::Vec2;
use image::imageops::{self, FilterType};
use image::{Rgba, Rgba32FImage, RgbaImage};
use log::{debug, warn};
use std::sync::Arc;

const UV_EPSILON: f32 = 1e-5;

/// A normalized region within the texture atlas.
///
/// Origin is the bottom-left corner of the atlas with v pointing up, matching
/// mesh UVs. Pixel rows are stored top-down, so `y` is measured from the last
/// row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl UvRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x_max(&self) -> f32 {
        self.x + self.width
    }

    pub fn y_max(&self) -> f32 {
        self.y + self.height
    }

    /// Transform a local UV coordinate (0-1) to atlas coordinate.
    pub fn transform_uv(&self, uv: Vec2) -> Vec2 {
        Vec2::new(self.x + uv.x * self.width, self.y + uv.y * self.height)
    }

    /// Check if an atlas coordinate falls inside this rect (edges included).
    pub fn contains(&self, uv: Vec2) -> bool {
        uv.x >= self.x - UV_EPSILON
            && uv.x <= self.x_max() + UV_EPSILON
            && uv.y >= self.y - UV_EPSILON
            && uv.y <= self.y_max() + UV_EPSILON
    }

    /// Check if two rects share any interior area.
    pub fn overlaps(&self, other: &UvRect) -> bool {
        self.x < other.x_max() - UV_EPSILON
            && other.x < self.x_max() - UV_EPSILON
            && self.y < other.y_max() - UV_EPSILON
            && other.y < self.y_max() - UV_EPSILON
    }
}

/// Pixel placement of one texture's content, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Atlas packed in memory but not yet persisted.
///
/// UV rects only become available once the atlas has been written and
/// reloaded through [`PackedAtlas::persist`].
#[derive(Debug)]
pub struct PackedAtlas {
    /// Atlas pixels, RGBA in the atlas encoding.
    pub image: TextureData,
    /// Content placement per input, in input order.
    pub placements: Vec<Placement>,
    /// Uniform scale applied to every input (1.0 when nothing was shrunk).
    pub scale: f32,
    uv_rects: Vec<UvRect>,
}

impl PackedAtlas {
    /// Side length in pixels.
    pub fn size(&self) -> u32 {
        self.image.width
    }

    /// Number of packed textures.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Write the atlas as PNG at `path`, reload it and hand out the stable
    /// texture handle together with the UV rects.
    pub fn persist(
        self,
        store: &dyn AssetStore,
        path: &str,
        name: impl Into<String>,
    ) -> Result<PersistedAtlas> {
        store.write_texture(path, &self.image)?;

        let reloaded = store.read_texture(path, self.image.encoding)?;
        if reloaded.width != self.image.width || reloaded.height != self.image.height {
            return Err(CombinerError::AtlasBuild(format!(
                "Reloaded atlas {} is {}x{}, expected {}x{}",
                path, reloaded.width, reloaded.height, self.image.width, self.image.height
            )));
        }
        debug!(
            "Reloaded atlas {} ({}x{}, {:?})",
            path, reloaded.width, reloaded.height, reloaded.encoding
        );

        let texture = Texture::new(name, reloaded).with_asset_path(path);
        Ok(PersistedAtlas {
            texture: Arc::new(texture),
            uv_rects: self.uv_rects,
            path: path.to_string(),
        })
    }
}

/// Atlas after the storage round trip; safe to derive UVs from.
#[derive(Debug, Clone)]
pub struct PersistedAtlas {
    texture: Arc<Texture>,
    uv_rects: Vec<UvRect>,
    path: String,
}

impl PersistedAtlas {
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    /// One rect per packed texture, in input order.
    pub fn uv_rects(&self) -> &[UvRect] {
        &self.uv_rects
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Builder for creating texture atlases.
///
/// Inputs keep their insertion order in the output. When the set does not fit
/// at full resolution every input is halved and packing retried; packing fails
/// once an input would shrink below one pixel.
pub struct AtlasBuilder<'a> {
    size: u32,
    padding: u32,
    encoding: ColorEncoding,
    textures: Vec<&'a TextureData>,
}

impl<'a> AtlasBuilder<'a> {
    /// Create a new atlas builder for a square atlas of side `size`.
    pub fn new(size: u32, padding: u32, encoding: ColorEncoding) -> Self {
        Self {
            size,
            padding,
            encoding,
            textures: Vec::new(),
        }
    }

    /// Add a texture to the atlas.
    pub fn add_texture(&mut self, texture: &'a TextureData) {
        self.textures.push(texture);
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Build the texture atlas.
    pub fn build(self) -> Result<PackedAtlas> {
        if self.textures.is_empty() {
            return Err(CombinerError::AtlasBuild("No textures to pack".to_string()));
        }
        if self.size == 0 || self.padding.saturating_mul(2) >= self.size {
            return Err(CombinerError::AtlasBuild(format!(
                "Padding {} leaves no room in a {}x{} atlas",
                self.padding, self.size, self.size
            )));
        }

        debug!(
            "Packing {} textures into {}x{} (padding {})",
            self.textures.len(),
            self.size,
            self.size,
            self.padding
        );

        // Bring every input into the atlas encoding up front
        let images = self
            .textures
            .iter()
            .map(|t| -> Result<RgbaImage> {
                let mut image = t.to_rgba_image()?;
                ColorEncoding::transcode_rgba8(&mut image, t.encoding, self.encoding);
                Ok(image)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut level = 0u32;
        loop {
            let mut sizes = Vec::with_capacity(images.len());
            for image in &images {
                let (w, h) = (image.width() >> level, image.height() >> level);
                if w == 0 || h == 0 {
                    return Err(CombinerError::AtlasBuild(format!(
                        "Failed to pack {} textures into {}x{} atlas",
                        images.len(),
                        self.size,
                        self.size
                    )));
                }
                sizes.push((w, h));
            }

            if let Some(placements) = pack_rects(&sizes, self.size, self.padding) {
                let scale = 1.0 / (1u32 << level) as f32;
                if level > 0 {
                    warn!(
                        "Textures did not fit in {}x{}, scaled by {}",
                        self.size, self.size, scale
                    );
                }
                return Ok(self.composite(&images, &placements, scale));
            }

            level += 1;
        }
    }

    fn composite(&self, images: &[RgbaImage], placements: &[Placement], scale: f32) -> PackedAtlas {
        let mut atlas = RgbaImage::new(self.size, self.size);

        for (image, placement) in images.iter().zip(placements) {
            if image.width() == placement.width && image.height() == placement.height {
                blit_with_padding(&mut atlas, image, placement, self.padding);
            } else {
                let resized = resample(image, placement.width, placement.height, self.encoding);
                blit_with_padding(&mut atlas, &resized, placement, self.padding);
            }
        }

        let size = self.size as f32;
        let uv_rects = placements
            .iter()
            .map(|p| {
                UvRect::new(
                    p.x as f32 / size,
                    (self.size - (p.y + p.height)) as f32 / size,
                    p.width as f32 / size,
                    p.height as f32 / size,
                )
            })
            .collect();

        PackedAtlas {
            image: TextureData::new(self.size, self.size, atlas.into_raw(), self.encoding),
            placements: placements.to_vec(),
            scale,
            uv_rects,
        }
    }
}

/// Copy `image` into the atlas at `placement`, filling the padding ring with
/// the nearest edge pixel so filtering does not bleed neighbours in.
fn blit_with_padding(atlas: &mut RgbaImage, image: &RgbaImage, placement: &Placement, padding: u32) {
    let (w, h) = image.dimensions();
    let left = placement.x as i64 - padding as i64;
    let top = placement.y as i64 - padding as i64;

    for py in 0..(h + padding * 2) {
        for px in 0..(w + padding * 2) {
            let dst_x = left + px as i64;
            let dst_y = top + py as i64;
            if dst_x < 0 || dst_y < 0 || dst_x >= atlas.width() as i64 || dst_y >= atlas.height() as i64 {
                continue;
            }

            let sx = (px as i64 - padding as i64).clamp(0, w as i64 - 1) as u32;
            let sy = (py as i64 - padding as i64).clamp(0, h as i64 - 1) as u32;
            atlas.put_pixel(dst_x as u32, dst_y as u32, *image.get_pixel(sx, sy));
        }
    }
}

/// Resize in linear light, returning pixels in `encoding`.
fn resample(image: &RgbaImage, width: u32, height: u32, encoding: ColorEncoding) -> RgbaImage {
    let linear = Rgba32FImage::from_fn(image.width(), image.height(), |x, y| {
        let c = unpack_rgba8(image.get_pixel(x, y).0);
        Rgba(match encoding {
            ColorEncoding::Gamma => gamma_to_linear(c),
            ColorEncoding::Linear => c,
        })
    });

    let resized = imageops::resize(&linear, width, height, FilterType::Triangle);

    RgbaImage::from_fn(width, height, |x, y| {
        let c = resized.get_pixel(x, y).0;
        Rgba(pack_rgba8(match encoding {
            ColorEncoding::Gamma => linear_to_gamma(c),
            ColorEncoding::Linear => c,
        }))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl Rect {
    fn right(&self) -> u32 {
        self.x + self.w
    }

    fn bottom(&self) -> u32 {
        self.y + self.h
    }

    fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Free-space bookkeeping for the MaxRects algorithm.
struct MaxRects {
    free: Vec<Rect>,
}

impl MaxRects {
    fn new(size: u32) -> Self {
        Self {
            free: vec![Rect {
                x: 0,
                y: 0,
                w: size,
                h: size,
            }],
        }
    }

    /// Place a `w`x`h` block using best short side fit.
    fn insert(&mut self, w: u32, h: u32) -> Option<Rect> {
        let mut best: Option<(Rect, u32, u32)> = None;

        for free in &self.free {
            if free.w < w || free.h < h {
                continue;
            }
            let leftover_x = free.w - w;
            let leftover_y = free.h - h;
            let short_side = leftover_x.min(leftover_y);
            let long_side = leftover_x.max(leftover_y);

            let better = match best {
                None => true,
                Some((_, best_short, best_long)) => {
                    short_side < best_short || (short_side == best_short && long_side < best_long)
                }
            };
            if better {
                best = Some((Rect { x: free.x, y: free.y, w, h }, short_side, long_side));
            }
        }

        let (placed, _, _) = best?;
        self.split(&placed);
        self.prune();
        Some(placed)
    }

    fn split(&mut self, placed: &Rect) {
        let mut next = Vec::with_capacity(self.free.len() + 4);

        for free in self.free.drain(..) {
            if !free.intersects(placed) {
                next.push(free);
                continue;
            }

            if placed.x > free.x {
                next.push(Rect { x: free.x, y: free.y, w: placed.x - free.x, h: free.h });
            }
            if placed.right() < free.right() {
                next.push(Rect {
                    x: placed.right(),
                    y: free.y,
                    w: free.right() - placed.right(),
                    h: free.h,
                });
            }
            if placed.y > free.y {
                next.push(Rect { x: free.x, y: free.y, w: free.w, h: placed.y - free.y });
            }
            if placed.bottom() < free.bottom() {
                next.push(Rect {
                    x: free.x,
                    y: placed.bottom(),
                    w: free.w,
                    h: free.bottom() - placed.bottom(),
                });
            }
        }

        self.free = next;
    }

    /// Drop free rects fully covered by another one.
    fn prune(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let mut removed_i = false;
            let mut j = i + 1;
            while j < self.free.len() {
                if self.free[j].contains(&self.free[i]) {
                    self.free.remove(i);
                    removed_i = true;
                    break;
                }
                if self.free[i].contains(&self.free[j]) {
                    self.free.remove(j);
                } else {
                    j += 1;
                }
            }
            if !removed_i {
                i += 1;
            }
        }
    }
}

/// Pack content sizes into a square of side `atlas_size`.
///
/// Returns content placements in input order, or `None` if something does
/// not fit. Larger blocks go first; ties keep their input order.
fn pack_rects(sizes: &[(u32, u32)], atlas_size: u32, padding: u32) -> Option<Vec<Placement>> {
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        sizes[b]
            .1
            .cmp(&sizes[a].1)
            .then(sizes[b].0.cmp(&sizes[a].0))
    });

    let mut packer = MaxRects::new(atlas_size);
    let mut placements = vec![None; sizes.len()];

    for idx in order {
        let (w, h) = sizes[idx];
        let slot = packer.insert(w + padding * 2, h + padding * 2)?;
        placements[idx] = Some(Placement {
            x: slot.x + padding,
            y: slot.y + padding,
            width: w,
            height: h,
        });
    }

    placements.into_iter().collect()
}
