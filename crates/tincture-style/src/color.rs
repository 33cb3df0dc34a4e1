//! Packed ARGB colors and the HSL math used to derive palettes.

use std::fmt;
use std::str::FromStr;

use tincture_guard::{GuardError, format_color, parse_color};

/// Luminance below which text on a color is drawn white.
pub const ON_COLOR_THRESHOLD: f64 = 127.5;

/// A 32-bit `0xAARRGGBB` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Argb(pub u32);

impl Argb {
    pub const WHITE: Self = Self(0xFFFF_FFFF);
    pub const BLACK: Self = Self(0xFF00_0000);

    #[inline]
    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    /// Opaque color from channels.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(0xFF, r, g, b)
    }

    #[inline]
    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    #[inline]
    #[must_use]
    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self::new(alpha, self.r(), self.g(), self.b())
    }

    /// Parse `#RRGGBB` (opaque) or `#AARRGGBB`.
    pub fn from_hex(hex: &str) -> Result<Self, GuardError> {
        parse_color(hex).map(Self)
    }

    /// Canonical uppercase `#AARRGGBB`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format_color(self.0)
    }

    /// Perceived brightness on a 0–255 scale (`0.299R + 0.587G + 0.114B`).
    #[must_use]
    pub fn luminance(self) -> f64 {
        0.299 * f64::from(self.r()) + 0.587 * f64::from(self.g()) + 0.114 * f64::from(self.b())
    }

    /// Foreground to draw on top of this color: white on dark, black on light.
    #[must_use]
    pub fn on_color(self) -> Self {
        if self.luminance() < ON_COLOR_THRESHOLD {
            Self::WHITE
        } else {
            Self::BLACK
        }
    }

    #[must_use]
    pub fn to_hsl(self) -> Hsl {
        let r = f64::from(self.r()) / 255.0;
        let g = f64::from(self.g()) / 255.0;
        let b = f64::from(self.b()) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let delta = max - min;
        if delta == 0.0 {
            return Hsl { h: 0.0, s: 0.0, l };
        }
        let s = delta / (1.0 - (2.0 * l - 1.0).abs());
        let h = if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        Hsl {
            h,
            s: s.clamp(0.0, 1.0),
            l,
        }
    }

    /// Convert back from HSL, clamping every channel to `[0, 255]`.
    #[must_use]
    pub fn from_hsl(hsl: Hsl, alpha: u8) -> Self {
        let Hsl { h, s, l } = hsl.normalized();
        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let sector = h / 60.0;
        let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
        let (r1, g1, b1) = match sector as u8 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = l - c / 2.0;
        Self::new(alpha, channel(r1 + m), channel(g1 + m), channel(b1 + m))
    }
}

fn channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

impl fmt::Display for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Argb {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<u32> for Argb {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Argb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Argb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let literal = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Self::from_hex(&literal).map_err(serde::de::Error::custom)
    }
}

/// Hue in degrees, saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    /// Hue wrapped into `[0, 360)`, the other components clamped.
    #[must_use]
    pub fn normalized(self) -> Self {
        let h = self.h.rem_euclid(360.0);
        Self {
            h: if h >= 360.0 { 0.0 } else { h },
            s: self.s.clamp(0.0, 1.0),
            l: self.l.clamp(0.0, 1.0),
        }
    }

    #[must_use]
    pub fn rotate(self, degrees: f64) -> Self {
        Self {
            h: (self.h + degrees).rem_euclid(360.0),
            ..self
        }
    }

    /// Move lightness toward white (`amount > 0`) or black (`amount < 0`).
    ///
    /// `amount` is the fraction of the remaining distance, so `1.0` is white
    /// and `-1.0` is black.
    #[must_use]
    pub fn shift_lightness(self, amount: f64) -> Self {
        let amount = amount.clamp(-1.0, 1.0);
        let l = if amount >= 0.0 {
            self.l + (1.0 - self.l) * amount
        } else {
            self.l * (1.0 + amount)
        };
        Self {
            l: l.clamp(0.0, 1.0),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_unpack_in_argb_order() {
        let color = Argb(0x8012_3456);
        assert_eq!((color.a(), color.r(), color.g(), color.b()), (0x80, 0x12, 0x34, 0x56));
        assert_eq!(Argb::new(0x80, 0x12, 0x34, 0x56), color);
        assert_eq!(color.with_alpha(0xFF), Argb(0xFF12_3456));
    }

    #[test]
    fn hex_goes_through_the_guard() {
        assert_eq!(Argb::from_hex("#6200EE"), Ok(Argb(0xFF62_00EE)));
        assert_eq!("#FF6200EE".parse::<Argb>(), Ok(Argb(0xFF62_00EE)));
        assert!(Argb::from_hex("6200EE").is_err());
        assert_eq!(Argb(0xFF62_00EE).to_string(), "#FF6200EE");
    }

    #[test]
    fn on_color_follows_the_luminance_threshold() {
        assert_eq!(Argb::BLACK.on_color(), Argb::WHITE);
        assert_eq!(Argb::WHITE.on_color(), Argb::BLACK);
        // 0.299*98 + 0.114*238 ≈ 56.4
        assert_eq!(Argb(0xFF62_00EE).on_color(), Argb::WHITE);
        assert_eq!(Argb::rgb(255, 235, 59).on_color(), Argb::BLACK);
        assert!((Argb::WHITE.luminance() - 255.0).abs() < 1e-9);
    }

    #[test]
    fn hsl_round_trips_within_one_step() {
        for color in [
            Argb::rgb(98, 0, 238),
            Argb::rgb(255, 87, 34),
            Argb::rgb(0, 150, 136),
            Argb::rgb(128, 128, 128),
            Argb::WHITE,
            Argb::BLACK,
        ] {
            let back = Argb::from_hsl(color.to_hsl(), color.a());
            for (x, y) in [(color.r(), back.r()), (color.g(), back.g()), (color.b(), back.b())] {
                assert!(x.abs_diff(y) <= 1, "{color} -> {back}");
            }
        }
    }

    #[test]
    fn rotate_wraps_hue() {
        let hsl = Hsl { h: 350.0, s: 0.5, l: 0.5 };
        assert!((hsl.rotate(30.0).h - 20.0).abs() < 1e-9);
        assert!((hsl.rotate(-360.0).h - 350.0).abs() < 1e-9);
    }

    #[test]
    fn lightness_shift_is_relative_to_remaining_distance() {
        let hsl = Hsl { h: 0.0, s: 1.0, l: 0.4 };
        assert!((hsl.shift_lightness(0.5).l - 0.7).abs() < 1e-9);
        assert!((hsl.shift_lightness(-0.5).l - 0.2).abs() < 1e-9);
        assert!((hsl.shift_lightness(1.0).l - 1.0).abs() < 1e-9);
        assert!(hsl.shift_lightness(-2.0).l.abs() < 1e-9);
    }

    #[test]
    fn pure_hues_convert_exactly() {
        let red = Hsl { h: 0.0, s: 1.0, l: 0.5 };
        assert_eq!(Argb::from_hsl(red, 0xFF), Argb::rgb(255, 0, 0));
        assert_eq!(Argb::from_hsl(red.rotate(120.0), 0xFF), Argb::rgb(0, 255, 0));
        assert_eq!(Argb::from_hsl(red.rotate(240.0), 0xFF), Argb::rgb(0, 0, 255));
        assert_eq!(Argb::from_hsl(red.rotate(360.0), 0x40), Argb::new(0x40, 255, 0, 0));
    }
}
