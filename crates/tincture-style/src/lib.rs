#![forbid(unsafe_code)]

//! Color vocabulary for tincture override packages.
//!
//! # Role in tincture
//! `tincture-style` turns one base color into everything a resource table
//! needs: semantic roles with readable foregrounds and a tonal ramp. It has
//! no I/O and no knowledge of archives; `tincture-compiler` decides which
//! tiers to emit and how to serialize them.
//!
//! # This crate provides
//! - [`Argb`], a packed 32-bit color with HSL conversion and the
//!   `0.299R + 0.587G + 0.114B` luminance used for on-color selection.
//! - [`DerivedPalette`] with [`Role`] recipes and a [`RampTier`]-dependent
//!   tonal ramp.

/// Packed colors and HSL math.
pub mod color;
/// Semantic roles and tonal ramps.
pub mod palette;

pub use color::{Argb, Hsl, ON_COLOR_THRESHOLD};
pub use palette::{
    BASELINE_STEPS, DerivedPalette, RAMP_END, RAMP_MIDPOINT, RampStop, RampTier, Role,
    ramp_lightness,
};

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::Argb;

    #[test]
    fn argb_serializes_as_hex_literal() {
        let json = serde_json::to_string(&Argb(0xFF62_00EE)).expect("serialize");
        assert_eq!(json, "\"#FF6200EE\"");
        let back: Argb = serde_json::from_str("\"#6200EE\"").expect("deserialize");
        assert_eq!(back, Argb(0xFF62_00EE));
        assert!(serde_json::from_str::<Argb>("\"blue\"").is_err());
    }
}
