//! Math types and glam re-exports.
//!
//! We re-export [glam](https://docs.rs/glam) types so users don't need to
//! depend on it directly. Everything here serializes, since these types sit
//! inside components that travel through scene documents and scripts
//! (glam vectors serialize as arrays: `[x, y]`).

use serde::{Deserialize, Serialize};

pub use glam::{Affine2, Mat2, Vec2, Vec3};

/// Linear RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Self = Self { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const RED: Self = Self { r: 1.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const GREEN: Self = Self { r: 0.0, g: 1.0, b: 0.0, a: 1.0 };
    pub const BLUE: Self = Self { r: 0.0, g: 0.0, b: 1.0, a: 1.0 };

    /// Create a color from RGB (alpha = 1).
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// A normalized rectangle within a texture (UV space, 0.0–1.0).
///
/// (0,0) is the top-left corner and (1,1) the bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// The full texture (0,0) to (1,1).
    pub const FULL: Self = Self {
        min: Vec2::ZERO,
        max: Vec2::ONE,
    };

    /// Build from pixel coordinates and texture dimensions.
    pub fn from_pixels(x: f32, y: f32, w: f32, h: f32, tex_w: f32, tex_h: f32) -> Self {
        Self {
            min: Vec2::new(x / tex_w, y / tex_h),
            max: Vec2::new((x + w) / tex_w, (y + h) / tex_h),
        }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::FULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_from_pixels() {
        let rect = Rect::from_pixels(32.0, 0.0, 32.0, 32.0, 128.0, 64.0);
        assert_eq!(rect.min, Vec2::new(0.25, 0.0));
        assert_eq!(rect.max, Vec2::new(0.5, 0.5));
        assert_eq!(rect.size(), Vec2::new(0.25, 0.5));
    }

    #[test]
    fn color_defaults_to_white_and_fills_missing_fields() {
        let color: Color = serde_json::from_str(r#"{ "r": 0.5 }"#).unwrap();
        assert_eq!(color, Color::rgba(0.5, 1.0, 1.0, 1.0));
    }
}
