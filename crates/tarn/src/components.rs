//! # Engine Components
//!
//! Plain data attached to entities and consumed by the collaborators that
//! live outside this crate (renderer, physics stepper, text and UI layers).
//!
//! Every field has a documented default and every type is
//! `#[serde(default)]`, so a script or scene document only spells out what
//! differs:
//!
//! ```text
//! Sprite.new{ texture = "hero.png" }   -- color white, size auto, layer 0
//! ```
//!
//! Components never own native resources. [`Physics`] carries a
//! [`BodyHandle`] into the physics subsystem's body table, not a body.

use serde::{Deserialize, Serialize};

use crate::ecs::Registry;
use crate::math::{Affine2, Color, Rect, Vec2};
use crate::reflect::{MetaRegistry, Reflect, ReflectError};

// ── Transform ───────────────────────────────────────────────────────────

/// Local position, rotation (radians) and scale, relative to the parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Transform {
    /// Origin, no rotation, uniform scale of 1.
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: 0.0,
        scale: Vec2::ONE,
    };

    pub fn from_xy(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    /// Return a copy with uniform scale applied.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec2::splat(scale);
        self
    }

    /// Local-to-parent matrix: scale, then rotate, then translate.
    pub fn matrix(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ── Sprite ──────────────────────────────────────────────────────────────

/// A textured quad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sprite {
    /// Texture asset name. Empty draws the built-in white texture.
    pub texture: String,
    /// Tint color multiplied with the texture sample.
    pub color: Color,
    /// Size in world units. Zero means "use the texture size".
    pub size: Vec2,
    pub flip_x: bool,
    pub flip_y: bool,
    /// UV sub-region of the texture. Defaults to the full texture.
    pub texture_rect: Rect,
    /// Draw order; higher layers draw on top.
    pub layer: i32,
    pub hidden: bool,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            texture: String::new(),
            color: Color::WHITE,
            size: Vec2::ZERO,
            flip_x: false,
            flip_y: false,
            texture_rect: Rect::FULL,
            layer: 0,
            hidden: false,
        }
    }
}

impl Sprite {
    pub fn new(texture: &str) -> Self {
        Self {
            texture: texture.to_string(),
            ..Self::default()
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn size(mut self, width: f32, height: f32) -> Self {
        self.size = Vec2::new(width, height);
        self
    }

    pub fn layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }
}

// ── Animation ───────────────────────────────────────────────────────────

/// Sprite-sheet playback state. The renderer reads `current_frame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Animation {
    /// Frames in the strip (default 1).
    pub frame_count: u32,
    /// Frames per second (default 10).
    pub frame_rate: f32,
    /// Index of the strip's first frame in the sheet.
    pub frame_offset: u32,
    pub current_frame: u32,
    /// Strip runs down the sheet instead of across.
    pub vertical: bool,
    /// Wrap around after the last frame (default true).
    pub looping: bool,
    /// Seconds accumulated toward the next frame.
    pub elapsed: f32,
    /// Set once a non-looping strip reaches its last frame.
    pub finished: bool,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            frame_count: 1,
            frame_rate: 10.0,
            frame_offset: 0,
            current_frame: 0,
            vertical: false,
            looping: true,
            elapsed: 0.0,
            finished: false,
        }
    }
}

impl Animation {
    pub fn new(frame_count: u32, frame_rate: f32) -> Self {
        Self {
            frame_count,
            frame_rate,
            ..Self::default()
        }
    }

    /// Advance playback by `dt` seconds. Cost does not depend on `dt`.
    pub fn advance(&mut self, dt: f32) {
        if self.finished || self.frame_rate <= 0.0 || self.frame_count == 0 {
            return;
        }
        let frame_time = 1.0 / self.frame_rate;
        self.elapsed += dt;
        if !self.elapsed.is_finite() {
            self.elapsed = 0.0;
            return;
        }
        if self.elapsed < frame_time {
            return;
        }

        let steps = (f64::from(self.elapsed) / f64::from(frame_time)).floor() as u64;
        self.elapsed %= frame_time;

        let last = self.frame_count - 1;
        let to_last = u64::from(last.saturating_sub(self.current_frame));
        if steps <= to_last {
            self.current_frame += steps as u32;
        } else if self.looping {
            let count = u64::from(self.frame_count);
            self.current_frame = ((u64::from(self.current_frame) + steps % count) % count) as u32;
        } else {
            self.current_frame = last;
            self.finished = true;
            self.elapsed = 0.0;
        }
    }

    /// Index of the displayed frame in the whole sheet.
    pub fn sheet_frame(&self) -> u32 {
        self.frame_offset + self.current_frame
    }

    pub fn restart(&mut self) {
        self.current_frame = 0;
        self.elapsed = 0.0;
        self.finished = false;
    }
}

/// Advance every [`Animation`] by `dt` seconds.
pub fn advance_animations(registry: &mut Registry, dt: f32) {
    registry.query::<(&mut Animation,)>(|_, (animation,)| animation.advance(dt));
}

// ── Colliders ───────────────────────────────────────────────────────────

/// Axis-aligned box, centered on the entity plus `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxCollider {
    /// Full width and height (default 16x16).
    pub size: Vec2,
    pub offset: Vec2,
    /// Report overlaps without resolving them.
    pub trigger: bool,
}

impl Default for BoxCollider {
    fn default() -> Self {
        Self {
            size: Vec2::splat(16.0),
            offset: Vec2::ZERO,
            trigger: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleCollider {
    /// Default 8.
    pub radius: f32,
    pub offset: Vec2,
    pub trigger: bool,
}

impl Default for CircleCollider {
    fn default() -> Self {
        Self {
            radius: 8.0,
            offset: Vec2::ZERO,
            trigger: false,
        }
    }
}

// ── Physics ─────────────────────────────────────────────────────────────

/// Index into the physics subsystem's body table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    #[default]
    Static,
    Dynamic,
    Kinematic,
}

/// Body parameters plus the handle of the body built from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Physics {
    pub body_type: BodyType,
    /// Default 1.
    pub density: f32,
    /// Default 0.3.
    pub friction: f32,
    pub restitution: f32,
    pub fixed_rotation: bool,
    /// Set by the physics subsystem once the body exists. Never persisted:
    /// handles are not stable across runs.
    #[serde(skip)]
    pub body: Option<BodyHandle>,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            density: 1.0,
            friction: 0.3,
            restitution: 0.0,
            fixed_rotation: false,
            body: None,
        }
    }
}

impl Physics {
    pub fn dynamic() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            ..Self::default()
        }
    }
}

// ── Text & UI ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Text {
    pub text: String,
    /// Font asset name. Empty uses the built-in font.
    pub font: String,
    pub color: Color,
    /// Pixel size (default 16).
    pub size: f32,
    /// Wrap width in world units; 0 disables wrapping.
    pub wrap_width: f32,
    pub hidden: bool,
}

impl Default for Text {
    fn default() -> Self {
        Self {
            text: String::new(),
            font: String::new(),
            color: Color::WHITE,
            size: 16.0,
            wrap_width: 0.0,
            hidden: false,
        }
    }
}

impl Text {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }
}

/// Marks an entity as screen-space UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ui {
    /// Default true.
    pub visible: bool,
    pub hoverable: bool,
    /// Draw order among UI elements.
    pub layer: i32,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            visible: true,
            hoverable: false,
            layer: 0,
        }
    }
}

// ── Reflection ──────────────────────────────────────────────────────────

macro_rules! reflect_names {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(impl Reflect for $ty {
            const TYPE_NAME: &'static str = $name;
        })*
    };
}

reflect_names! {
    Transform => "Transform",
    Sprite => "Sprite",
    Animation => "Animation",
    BoxCollider => "BoxCollider",
    CircleCollider => "CircleCollider",
    Physics => "Physics",
    Text => "Text",
    Ui => "UI",
}

/// Register every engine component with the bridge.
pub fn register_engine_components(meta: &mut MetaRegistry) -> Result<(), ReflectError> {
    meta.register_component::<Transform>()?;
    meta.register_component::<Sprite>()?;
    meta.register_component::<Animation>()?;
    meta.register_component::<BoxCollider>()?;
    meta.register_component::<CircleCollider>()?;
    meta.register_component::<Physics>()?;
    meta.register_component::<Text>()?;
    meta.register_component::<Ui>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{MetaAny, MetaTarget, op};
    use serde_json::json;

    #[test]
    fn transform_matrix_applies_scale_rotation_translation() {
        let t = Transform::from_xy(10.0, 0.0)
            .with_rotation(std::f32::consts::FRAC_PI_2)
            .with_scale(2.0);
        let p = t.matrix().transform_point2(Vec2::new(1.0, 0.0));
        assert!((p - Vec2::new(10.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn partial_documents_take_field_defaults() {
        let sprite: Sprite = serde_json::from_value(json!({ "texture": "hero.png" })).unwrap();
        assert_eq!(sprite.texture, "hero.png");
        assert_eq!(sprite.color, Color::WHITE);
        assert_eq!(sprite.texture_rect, Rect::FULL);

        let t: Transform = serde_json::from_value(json!({ "position": [3.0, 4.0] })).unwrap();
        assert_eq!(t.position, Vec2::new(3.0, 4.0));
        assert_eq!(t.scale, Vec2::ONE);

        let body: Physics = serde_json::from_value(json!({ "body_type": "dynamic" })).unwrap();
        assert_eq!(body.body_type, BodyType::Dynamic);
        assert_eq!(body.density, 1.0);
    }

    #[test]
    fn body_handle_is_not_persisted() {
        let physics = Physics {
            body: Some(BodyHandle(42)),
            ..Physics::dynamic()
        };
        let json = serde_json::to_value(physics).unwrap();
        assert!(json.get("body").is_none());
        let back: Physics = serde_json::from_value(json).unwrap();
        assert_eq!(back.body, None);
    }

    #[test]
    fn animation_loops_and_finishes() {
        let mut looping = Animation::new(3, 10.0);
        looping.advance(0.25);
        assert_eq!(looping.current_frame, 2);
        looping.advance(0.1);
        assert_eq!(looping.current_frame, 0);

        let mut once = Animation {
            looping: false,
            ..Animation::new(2, 10.0)
        };
        once.advance(1.0);
        assert!(once.finished);
        assert_eq!(once.current_frame, 1);
        once.restart();
        assert!(!once.finished);
    }

    #[test]
    fn animation_huge_step_is_bounded() {
        let mut looping = Animation::new(4, 60.0);
        looping.advance(1.0e6);
        assert!(looping.current_frame < 4);
        assert!(looping.elapsed >= 0.0 && looping.elapsed < 1.0 / 60.0);

        let mut once = Animation {
            looping: false,
            ..Animation::new(4, 60.0)
        };
        once.advance(1.0e6);
        assert!(once.finished);
        assert_eq!(once.current_frame, 3);

        let mut broken = Animation::new(4, 60.0);
        broken.advance(f32::INFINITY);
        assert_eq!(broken.current_frame, 0);
        assert_eq!(broken.elapsed, 0.0);
    }

    #[test]
    fn animation_wraps_across_many_loops() {
        let mut anim = Animation::new(3, 10.0);
        // 7 frames at 10 fps: two full loops plus one.
        anim.advance(0.75);
        assert_eq!(anim.current_frame, 1);
    }

    #[test]
    fn advance_animations_runs_over_registry() {
        let mut registry = Registry::new();
        let e = registry.create_entity("walker", "");
        registry.add(e, Animation::new(4, 4.0));
        advance_animations(&mut registry, 0.5);
        assert_eq!(registry.get::<Animation>(e).current_frame, 2);
    }

    #[test]
    fn engine_components_register_and_validate() {
        let mut meta = MetaRegistry::new();
        register_engine_components(&mut meta).unwrap();
        meta.validate().unwrap();
        assert_eq!(meta.len(), 8);
        assert_eq!(meta.find_by_name("UI"), Some(Ui::TYPE_ID));
        assert!(register_engine_components(&mut meta).is_err());

        let mut registry = Registry::new();
        let e = registry.create_entity("box", "");
        meta.invoke(
            BoxCollider::TYPE_ID,
            op::ADD,
            MetaTarget::Entity(&mut registry, e),
            vec![MetaAny::new(json!({ "trigger": true }))],
        );
        let collider = registry.get::<BoxCollider>(e);
        assert!(collider.trigger);
        assert_eq!(collider.size, Vec2::splat(16.0));
    }
}
