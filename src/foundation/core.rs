use crate::foundation::error::{SlidecastError, SlidecastResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Reference output height the subtitle style is authored against. All style
/// pixel values are rescaled by `output_height / REFERENCE_HEIGHT` before use.
pub const REFERENCE_HEIGHT: f64 = 1080.0;

/// Absolute 0-based frame index in export timeline space.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> SlidecastResult<Self> {
        if den == 0 {
            return Err(SlidecastError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(SlidecastError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert seconds to frame count using floor semantics.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64()).floor().max(0.0) as u64
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> SlidecastResult<Self> {
        let s = hex.strip_prefix('#').unwrap_or(hex);
        if s.len() != 6 && s.len() != 8 {
            return Err(SlidecastError::validation(format!(
                "color '{hex}' must be #rrggbb or #rrggbbaa"
            )));
        }
        let byte = |i: usize| -> SlidecastResult<u8> {
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| {
                SlidecastError::validation(format!("color '{hex}' has invalid hex digits"))
            })
        };
        Ok(Self {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: if s.len() == 8 { byte(6)? } else { 255 },
        })
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Scale the alpha channel by `opacity` in `[0, 1]`.
    pub fn with_opacity(self, opacity: f32) -> Self {
        let a = (f32::from(self.a) * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

impl serde::Serialize for Rgba8 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Rgba8 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_validates_zero_components() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
        let fps = Fps::new(30, 1).unwrap();
        assert_eq!(fps.as_f64(), 30.0);
        assert!((fps.frame_duration_secs() - 1.0 / 30.0).abs() < 1e-12);
        assert_eq!(fps.secs_to_frames_floor(4.0), 120);
    }

    #[test]
    fn rgba_hex_round_trips() {
        let c = Rgba8::from_hex("#1a2b3c").unwrap();
        assert_eq!(c, Rgba8::opaque(0x1a, 0x2b, 0x3c));
        assert_eq!(c.to_hex(), "#1a2b3c");

        let c = Rgba8::from_hex("102030ff").unwrap();
        assert_eq!(c.a, 255);

        assert!(Rgba8::from_hex("#12345").is_err());
        assert!(Rgba8::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn rgba_serde_uses_hex_strings() {
        let c = Rgba8::opaque(255, 0, 16);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"#ff0010\"");
        let back: Rgba8 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn with_opacity_scales_alpha() {
        let c = Rgba8::opaque(10, 20, 30).with_opacity(0.5);
        assert_eq!(c.a, 128);
        assert_eq!(Rgba8::opaque(1, 2, 3).with_opacity(2.0).a, 255);
    }

    #[test]
    fn mul_div255_rounds() {
        assert_eq!(mul_div255_u16(255, 255), 255);
        assert_eq!(mul_div255_u16(255, 0), 0);
        assert_eq!(mul_div255_u16(128, 128), 64);
    }
}
