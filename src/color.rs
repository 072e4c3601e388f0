//! Gamma/linear colour encoding.
//!
//! The working encoding is passed explicitly to everything that creates or
//! samples pixel data instead of being read from a process-wide setting.

use serde::{Deserialize, Serialize};

/// Exponent used for gamma <-> linear conversion.
pub const GAMMA: f32 = 2.2;

/// How stored colour values relate to light intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorEncoding {
    /// Values are gamma encoded (sRGB-like).
    #[default]
    Gamma,
    /// Values are proportional to light intensity.
    Linear,
}

impl ColorEncoding {
    pub fn is_linear(self) -> bool {
        self == ColorEncoding::Linear
    }

    /// Encode a display-referred colour for storage in this encoding.
    ///
    /// In linear space the RGB channels are converted from gamma to linear so
    /// a synthesized colour matches textures that were imported as sRGB.
    pub fn encode_display_color(self, color: [f32; 4]) -> [f32; 4] {
        match self {
            ColorEncoding::Gamma => color,
            ColorEncoding::Linear => gamma_to_linear(color),
        }
    }

    /// Convert a single normalized colour from `from` into `to`.
    pub fn transcode(color: [f32; 4], from: ColorEncoding, to: ColorEncoding) -> [f32; 4] {
        match (from, to) {
            (ColorEncoding::Gamma, ColorEncoding::Linear) => gamma_to_linear(color),
            (ColorEncoding::Linear, ColorEncoding::Gamma) => linear_to_gamma(color),
            _ => color,
        }
    }

    /// Convert packed RGBA8 pixels in place from `from` into `to`.
    pub fn transcode_rgba8(pixels: &mut [u8], from: ColorEncoding, to: ColorEncoding) {
        if from == to {
            return;
        }
        for px in pixels.chunks_exact_mut(4) {
            let converted = Self::transcode(unpack_rgba8([px[0], px[1], px[2], px[3]]), from, to);
            px.copy_from_slice(&pack_rgba8(converted));
        }
    }
}

/// Gamma to linear on RGB, alpha untouched.
pub fn gamma_to_linear(color: [f32; 4]) -> [f32; 4] {
    [
        color[0].max(0.0).powf(GAMMA),
        color[1].max(0.0).powf(GAMMA),
        color[2].max(0.0).powf(GAMMA),
        color[3],
    ]
}

/// Linear to gamma on RGB, alpha untouched.
pub fn linear_to_gamma(color: [f32; 4]) -> [f32; 4] {
    [
        color[0].max(0.0).powf(1.0 / GAMMA),
        color[1].max(0.0).powf(1.0 / GAMMA),
        color[2].max(0.0).powf(1.0 / GAMMA),
        color[3],
    ]
}

pub fn unpack_rgba8(px: [u8; 4]) -> [f32; 4] {
    [
        px[0] as f32 / 255.0,
        px[1] as f32 / 255.0,
        px[2] as f32 / 255.0,
        px[3] as f32 / 255.0,
    ]
}

pub fn pack_rgba8(color: [f32; 4]) -> [u8; 4] {
    let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [q(color[0]), q(color[1]), q(color[2]), q(color[3])]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_is_encoding_invariant() {
        let white = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(ColorEncoding::Gamma.encode_display_color(white), white);
        assert_eq!(ColorEncoding::Linear.encode_display_color(white), white);
    }

    #[test]
    fn test_linear_darkens_midtones() {
        let grey = [0.5, 0.5, 0.5, 0.5];
        let linear = ColorEncoding::Linear.encode_display_color(grey);
        assert!((linear[0] - 0.5f32.powf(2.2)).abs() < 1e-6);
        // Alpha is never gamma corrected
        assert_eq!(linear[3], 0.5);
    }

    #[test]
    fn test_transcode_round_trip_is_close() {
        let c = [0.2, 0.4, 0.8, 1.0];
        let there = ColorEncoding::transcode(c, ColorEncoding::Gamma, ColorEncoding::Linear);
        let back = ColorEncoding::transcode(there, ColorEncoding::Linear, ColorEncoding::Gamma);
        for i in 0..4 {
            assert!((c[i] - back[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_transcode_rgba8_same_encoding_is_noop() {
        let mut px = vec![10, 128, 250, 255];
        ColorEncoding::transcode_rgba8(&mut px, ColorEncoding::Linear, ColorEncoding::Linear);
        assert_eq!(px, vec![10, 128, 250, 255]);
    }

    #[test]
    fn test_pack_unpack() {
        assert_eq!(pack_rgba8(unpack_rgba8([0, 64, 200, 255])), [0, 64, 200, 255]);
        assert_eq!(pack_rgba8([2.0, -1.0, 0.5, 1.0]), [255, 0, 128, 255]);
    }
}
