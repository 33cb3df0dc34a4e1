//! Semantic roles and tonal ramps derived from a single base color.
//!
//! Every role is a fixed recipe applied to the base color's HSL form: a hue
//! rotation (or a fixed hue), a saturation adjustment, and a lightness shift
//! toward white or black. Each base role has an `on-*` partner chosen by
//! [`Argb::on_color`]. The tonal ramp keeps the base hue and saturation and
//! only walks lightness, from white at step 0 through the base lightness at
//! step 500 to black at step 1000.

use crate::color::{Argb, Hsl};

/// Ramp steps emitted by the baseline tier.
pub const BASELINE_STEPS: [u16; 14] = [
    0, 10, 50, 100, 200, 300, 400, 500, 600, 700, 800, 900, 950, 1000,
];

/// Spacing of the rich tier's ramp.
pub const RICH_STEP: u16 = 50;

/// Step that carries the base lightness.
pub const RAMP_MIDPOINT: u16 = 500;

/// Last ramp step.
pub const RAMP_END: u16 = 1000;

/// Named color purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Primary,
    OnPrimary,
    PrimaryContainer,
    OnPrimaryContainer,
    Secondary,
    OnSecondary,
    Tertiary,
    OnTertiary,
    Surface,
    OnSurface,
    Error,
    OnError,
}

impl Role {
    pub const ALL: [Role; 12] = [
        Role::Primary,
        Role::OnPrimary,
        Role::PrimaryContainer,
        Role::OnPrimaryContainer,
        Role::Secondary,
        Role::OnSecondary,
        Role::Tertiary,
        Role::OnTertiary,
        Role::Surface,
        Role::OnSurface,
        Role::Error,
        Role::OnError,
    ];

    /// Resource key for this role.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::OnPrimary => "on-primary",
            Self::PrimaryContainer => "primary-container",
            Self::OnPrimaryContainer => "on-primary-container",
            Self::Secondary => "secondary",
            Self::OnSecondary => "on-secondary",
            Self::Tertiary => "tertiary",
            Self::OnTertiary => "on-tertiary",
            Self::Surface => "surface",
            Self::OnSurface => "on-surface",
            Self::Error => "error",
            Self::OnError => "on-error",
        }
    }

    /// The background role an `on-*` role is drawn over.
    #[must_use]
    pub const fn background(self) -> Option<Role> {
        match self {
            Self::OnPrimary => Some(Self::Primary),
            Self::OnPrimaryContainer => Some(Self::PrimaryContainer),
            Self::OnSecondary => Some(Self::Secondary),
            Self::OnTertiary => Some(Self::Tertiary),
            Self::OnSurface => Some(Self::Surface),
            Self::OnError => Some(Self::Error),
            _ => None,
        }
    }

    fn recipe(self) -> Option<Recipe> {
        let recipe = match self {
            Self::PrimaryContainer => Recipe::shift(0.70),
            Self::Secondary => Recipe::rotate(30.0),
            Self::Tertiary => Recipe::rotate(-30.0),
            Self::Surface => Recipe {
                saturation_scale: 0.15,
                ..Recipe::shift(0.92)
            },
            Self::Error => Recipe {
                fixed_hue: Some(ERROR_HUE),
                saturation_floor: 0.6,
                ..Recipe::shift(-0.10)
            },
            _ => return None,
        };
        Some(recipe)
    }
}

const ERROR_HUE: f64 = 4.0;

#[derive(Debug, Clone, Copy)]
struct Recipe {
    hue_offset: f64,
    fixed_hue: Option<f64>,
    saturation_scale: f64,
    saturation_floor: f64,
    lightness_shift: f64,
}

impl Recipe {
    const IDENTITY: Self = Self {
        hue_offset: 0.0,
        fixed_hue: None,
        saturation_scale: 1.0,
        saturation_floor: 0.0,
        lightness_shift: 0.0,
    };

    const fn rotate(degrees: f64) -> Self {
        Self {
            hue_offset: degrees,
            ..Self::IDENTITY
        }
    }

    const fn shift(amount: f64) -> Self {
        Self {
            lightness_shift: amount,
            ..Self::IDENTITY
        }
    }

    fn apply(self, base: Hsl) -> Hsl {
        let hue = match self.fixed_hue {
            Some(hue) => Hsl { h: hue, ..base },
            None => base.rotate(self.hue_offset),
        };
        let s = (hue.s * self.saturation_scale).max(self.saturation_floor);
        Hsl { s, ..hue }.shift_lightness(self.lightness_shift)
    }
}

/// Resource tier a palette is derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RampTier {
    /// 14 ramp steps, lightness quantized to hundredths.
    Baseline,
    /// 21 ramp steps (every 50), full-precision lightness.
    Rich,
}

impl RampTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Rich => "rich",
        }
    }

    #[must_use]
    pub fn steps(self) -> Vec<u16> {
        match self {
            Self::Baseline => BASELINE_STEPS.to_vec(),
            Self::Rich => (0..=RAMP_END).step_by(usize::from(RICH_STEP)).collect(),
        }
    }

    fn quantize(self, lightness: f64) -> f64 {
        match self {
            Self::Baseline => (lightness * 100.0).round() / 100.0,
            Self::Rich => lightness,
        }
    }
}

/// Lightness at `step` for a base lightness of `base`.
///
/// Linear from 1.0 at step 0 to `base` at step 500, then linear to 0.0 at
/// step 1000. Steps past the end clamp to black.
#[must_use]
pub fn ramp_lightness(step: u16, base: f64) -> f64 {
    let t = f64::from(step.min(RAMP_END));
    let mid = f64::from(RAMP_MIDPOINT);
    let base = base.clamp(0.0, 1.0);
    if t <= mid {
        1.0 + (base - 1.0) * (t / mid)
    } else {
        base * (1.0 - (t - mid) / (f64::from(RAMP_END) - mid))
    }
}

/// One stop of a tonal ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampStop {
    pub step: u16,
    pub color: Argb,
}

impl RampStop {
    /// Resource key, e.g. `ramp_500`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("ramp_{}", self.step)
    }
}

/// Every role plus the tonal ramp for one base color and tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPalette {
    source: Argb,
    tier: RampTier,
    roles: Vec<(Role, Argb)>,
    ramp: Vec<RampStop>,
}

impl DerivedPalette {
    #[must_use]
    pub fn derive(source: Argb, tier: RampTier) -> Self {
        let base = source.to_hsl();
        let alpha = source.a();
        let resolve = |hsl: Hsl| {
            let l = tier.quantize(hsl.l);
            Argb::from_hsl(Hsl { l, ..hsl }, alpha)
        };

        let mut roles: Vec<(Role, Argb)> = Vec::with_capacity(Role::ALL.len());
        for role in Role::ALL {
            let color = match (role, role.background(), role.recipe()) {
                (Role::Primary, _, _) => source,
                (_, Some(background), _) => roles
                    .iter()
                    .find(|(r, _)| *r == background)
                    .map_or(source.on_color(), |(_, bg)| bg.on_color()),
                (_, None, Some(recipe)) => resolve(recipe.apply(base)),
                (_, None, None) => source,
            };
            roles.push((role, color));
        }

        let ramp = tier
            .steps()
            .into_iter()
            .map(|step| RampStop {
                step,
                color: resolve(Hsl {
                    l: ramp_lightness(step, base.l),
                    ..base
                }),
            })
            .collect();

        Self {
            source,
            tier,
            roles,
            ramp,
        }
    }

    #[must_use]
    pub fn source(&self) -> Argb {
        self.source
    }

    #[must_use]
    pub fn tier(&self) -> RampTier {
        self.tier
    }

    #[must_use]
    pub fn get(&self, role: Role) -> Argb {
        self.roles
            .iter()
            .find(|(r, _)| *r == role)
            .map_or(self.source, |(_, color)| *color)
    }

    pub fn roles(&self) -> impl Iterator<Item = (Role, Argb)> + '_ {
        self.roles.iter().copied()
    }

    #[must_use]
    pub fn ramp(&self) -> &[RampStop] {
        &self.ramp
    }

    /// Flat `name -> color` listing: roles first, then the ramp in step order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Argb)> {
        self.roles
            .iter()
            .map(|(role, color)| (role.name().to_string(), *color))
            .chain(self.ramp.iter().map(|stop| (stop.name(), stop.color)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OCEAN: Argb = Argb(0xFF62_00EE);

    #[test]
    fn primary_is_the_base_color() {
        let palette = DerivedPalette::derive(OCEAN, RampTier::Baseline);
        assert_eq!(palette.get(Role::Primary), OCEAN);
        assert_eq!(palette.get(Role::OnPrimary), Argb::WHITE);
    }

    #[test]
    fn on_roles_contrast_with_their_background() {
        for base in [OCEAN, Argb::rgb(255, 235, 59), Argb::WHITE, Argb::BLACK] {
            let palette = DerivedPalette::derive(base, RampTier::Rich);
            for role in Role::ALL {
                if let Some(background) = role.background() {
                    assert_eq!(palette.get(role), palette.get(background).on_color());
                }
            }
        }
    }

    #[test]
    fn container_and_surface_are_lighter_than_primary() {
        let palette = DerivedPalette::derive(OCEAN, RampTier::Baseline);
        let primary = palette.get(Role::Primary).to_hsl().l;
        assert!(palette.get(Role::PrimaryContainer).to_hsl().l > primary);
        assert!(palette.get(Role::Surface).to_hsl().l > 0.9);
        assert_eq!(palette.get(Role::OnSurface), Argb::BLACK);
    }

    #[test]
    fn secondary_and_tertiary_rotate_hue() {
        let palette = DerivedPalette::derive(Argb::rgb(255, 0, 0), RampTier::Rich);
        let secondary = palette.get(Role::Secondary).to_hsl().h;
        let tertiary = palette.get(Role::Tertiary).to_hsl().h;
        assert!((secondary - 30.0).abs() < 1.0, "{secondary}");
        assert!((tertiary - 330.0).abs() < 1.0, "{tertiary}");
    }

    #[test]
    fn error_stays_red_for_grey_bases() {
        let palette = DerivedPalette::derive(Argb::rgb(128, 128, 128), RampTier::Baseline);
        let error = palette.get(Role::Error);
        assert!(error.r() > error.g() && error.r() > error.b(), "{error}");
    }

    #[test]
    fn ramp_endpoints_are_white_base_and_black() {
        let palette = DerivedPalette::derive(Argb::rgb(0, 150, 136), RampTier::Rich);
        let ramp = palette.ramp();
        assert_eq!(ramp.len(), 21);
        assert_eq!(ramp[0].color, Argb::WHITE);
        assert_eq!(ramp[ramp.len() - 1].color, Argb::BLACK);
        let mid = ramp.iter().find(|stop| stop.step == RAMP_MIDPOINT).expect("midpoint");
        let base = Argb::rgb(0, 150, 136);
        for (x, y) in [(mid.color.r(), base.r()), (mid.color.g(), base.g()), (mid.color.b(), base.b())] {
            assert!(x.abs_diff(y) <= 1);
        }
    }

    #[test]
    fn baseline_tier_has_fourteen_named_steps() {
        let palette = DerivedPalette::derive(OCEAN, RampTier::Baseline);
        let names: Vec<String> = palette.ramp().iter().map(RampStop::name).collect();
        assert_eq!(names.len(), 14);
        assert_eq!(names.first().map(String::as_str), Some("ramp_0"));
        assert_eq!(names.last().map(String::as_str), Some("ramp_1000"));
        assert_eq!(palette.entries().len(), Role::ALL.len() + 14);
    }

    #[test]
    fn ramp_lightness_is_piecewise_linear() {
        assert!((ramp_lightness(0, 0.4) - 1.0).abs() < 1e-9);
        assert!((ramp_lightness(250, 0.4) - 0.7).abs() < 1e-9);
        assert!((ramp_lightness(500, 0.4) - 0.4).abs() < 1e-9);
        assert!((ramp_lightness(750, 0.4) - 0.2).abs() < 1e-9);
        assert!(ramp_lightness(1000, 0.4).abs() < 1e-9);
        assert!(ramp_lightness(4000, 0.4).abs() < 1e-9);
    }

    #[test]
    fn derivation_keeps_source_alpha() {
        let translucent = Argb(0x8062_00EE);
        let palette = DerivedPalette::derive(translucent, RampTier::Baseline);
        assert_eq!(palette.get(Role::Secondary).a(), 0x80);
        assert!(palette.ramp().iter().all(|stop| stop.color.a() == 0x80));
    }
}
