//! Theme specification to override package.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tincture_guard::{GuardError, check_priority, require_identity, slug_segment};
use tincture_style::DerivedPalette;
use tracing::debug;

use crate::archive::write_archive;
use crate::error::Result;
use crate::manifest::{FORMAT_VERSION, Manifest, ResourceTable, ResourceTier};
use crate::package::{OverridePackage, sha256_hex};
use crate::spec::ThemeSpec;

/// Identity prefix used when none is configured.
pub const DEFAULT_IDENTITY_PREFIX: &str = "com.tincture.overlay";

/// Knobs shared by every compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Reverse-DNS prefix for generated identities.
    pub identity_prefix: String,
    /// Priority used when the spec does not set one.
    pub default_priority: i32,
    /// Emit `res/values-rich/colors.json` alongside the baseline table.
    pub emit_rich_tier: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            identity_prefix: DEFAULT_IDENTITY_PREFIX.to_string(),
            default_priority: 0,
            emit_rich_tier: true,
        }
    }
}

/// Builds [`OverridePackage`]s. No file I/O.
#[derive(Debug)]
pub struct PackageCompiler {
    options: CompilerOptions,
    counter: AtomicU64,
}

impl Default for PackageCompiler {
    fn default() -> Self {
        Self {
            options: CompilerOptions::default(),
            counter: AtomicU64::new(0),
        }
    }
}

impl PackageCompiler {
    /// Validate `options` and build a compiler.
    pub fn new(options: CompilerOptions) -> Result<Self> {
        require_identity(&options.identity_prefix)?;
        check_priority(i64::from(options.default_priority))?;
        Ok(Self {
            options,
            counter: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile under a freshly generated identity, version 1, stamped now.
    pub fn compile_theme(&self, spec: &ThemeSpec) -> Result<OverridePackage> {
        let now = Utc::now();
        let identity = self.next_identity(spec, now)?;
        self.compile_with_identity(spec, &identity, 1, now)
    }

    /// Fully deterministic compile: the same inputs give the same bytes.
    pub fn compile_with_identity(
        &self,
        spec: &ThemeSpec,
        identity: &str,
        version: u32,
        created_at: DateTime<Utc>,
    ) -> Result<OverridePackage> {
        let display_name = spec.validate()?.to_string();
        require_identity(identity)?;
        if version == 0 {
            return Err(GuardError::argument("compile", "package version must be at least 1").into());
        }
        let priority = spec.priority.unwrap_or(self.options.default_priority);

        let mut tiers = vec![ResourceTier::Baseline];
        if self.options.emit_rich_tier {
            tiers.push(ResourceTier::Rich);
        }
        let tables: Vec<(ResourceTier, ResourceTable)> = tiers
            .iter()
            .map(|tier| {
                let palette = DerivedPalette::derive(spec.base_color, tier.ramp_tier());
                (*tier, ResourceTable::from_palette(&palette))
            })
            .collect();

        let targets = spec.targets();
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            identity: identity.to_string(),
            display_name: display_name.clone(),
            targets: targets.clone(),
            features: spec.target_features.iter().copied().collect(),
            priority,
            version,
            created_at,
            tiers,
            source_color: spec.base_color,
        };
        let payload = write_archive(&manifest, &tables)?;
        let digest = sha256_hex(&payload);

        debug!(
            target: "tincture_compiler::compile",
            identity,
            version,
            bytes = payload.len(),
            targets = targets.len(),
            digest = %&digest[..12],
            "compiled override package"
        );

        Ok(OverridePackage {
            identity: identity.to_string(),
            payload,
            targets,
            priority,
            created_at,
            version,
            display_name,
            digest,
        })
    }

    /// `{prefix}.{slug}_{millis}_{counter}`.
    pub fn next_identity(&self, spec: &ThemeSpec, now: DateTime<Utc>) -> Result<String> {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let identity = format!(
            "{}.{}_{}_{}",
            self.options.identity_prefix,
            slug_segment(&spec.display_name),
            now.timestamp_millis().max(0),
            counter
        );
        require_identity(&identity)?;
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tincture_style::Argb;
    use tracing_test::traced_test;

    use super::*;
    use crate::TargetFeature;
    use crate::error::CompileError;

    fn ocean() -> ThemeSpec {
        ThemeSpec::new(Argb(0xFF62_00EE), "Ocean", [TargetFeature::StatusBar])
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("timestamp")
    }

    #[test]
    fn generated_identities_are_unique_and_valid() {
        let compiler = PackageCompiler::default();
        let first = compiler.next_identity(&ocean(), stamp()).expect("identity");
        let second = compiler.next_identity(&ocean(), stamp()).expect("identity");
        assert_ne!(first, second);
        assert!(first.starts_with("com.tincture.overlay.ocean_"));
        assert!(tincture_guard::is_valid_identity(&second));
    }

    #[test]
    fn compile_with_identity_is_deterministic() {
        let compiler = PackageCompiler::default();
        let a = compiler
            .compile_with_identity(&ocean(), "com.example.ocean", 3, stamp())
            .expect("compile");
        let b = compiler
            .compile_with_identity(&ocean(), "com.example.ocean", 3, stamp())
            .expect("compile");
        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
        assert_eq!(a.version, 3);
    }

    #[test]
    fn spec_priority_overrides_the_default() {
        let compiler = PackageCompiler::new(CompilerOptions {
            default_priority: 5,
            ..CompilerOptions::default()
        })
        .expect("compiler");
        let defaulted = compiler
            .compile_with_identity(&ocean(), "com.example.ocean", 1, stamp())
            .expect("compile");
        assert_eq!(defaulted.priority, 5);
        let explicit = compiler
            .compile_with_identity(&ocean().with_priority(-3), "com.example.ocean", 1, stamp())
            .expect("compile");
        assert_eq!(explicit.priority, -3);
        assert_eq!(explicit.open().expect("open").manifest().priority, -3);
    }

    #[test]
    fn rich_tier_can_be_disabled() {
        let compiler = PackageCompiler::new(CompilerOptions {
            emit_rich_tier: false,
            ..CompilerOptions::default()
        })
        .expect("compiler");
        let package = compiler
            .compile_with_identity(&ocean(), "com.example.ocean", 1, stamp())
            .expect("compile");
        let reader = package.open().expect("open");
        assert!(reader.rich_table().is_none());
        assert_eq!(reader.manifest().tiers, vec![ResourceTier::Baseline]);
    }

    #[test]
    fn invalid_inputs_are_rejected_before_archiving() {
        let compiler = PackageCompiler::default();
        let bad_name = ThemeSpec::new(Argb::BLACK, "x; reboot", []);
        let err = compiler.compile_theme(&bad_name).expect_err("bad name");
        assert!(err.is_validation());

        let err = compiler
            .compile_with_identity(&ocean(), "Not An Identity", 1, stamp())
            .expect_err("bad identity");
        assert!(matches!(err, CompileError::Invalid(GuardError::InvalidIdentity { .. })));

        assert!(
            compiler
                .compile_with_identity(&ocean(), "com.example.ocean", 0, stamp())
                .is_err()
        );
    }

    #[test]
    fn options_are_validated() {
        assert!(
            PackageCompiler::new(CompilerOptions {
                identity_prefix: "tincture".to_string(),
                ..CompilerOptions::default()
            })
            .is_err()
        );
        assert!(
            PackageCompiler::new(CompilerOptions {
                default_priority: 2000,
                ..CompilerOptions::default()
            })
            .is_err()
        );
    }

    #[traced_test]
    #[test]
    fn compile_logs_identity_and_size() {
        let compiler = PackageCompiler::default();
        compiler
            .compile_with_identity(&ocean(), "com.example.ocean", 1, stamp())
            .expect("compile");
        assert!(logs_contain("compiled override package"));
        assert!(logs_contain("com.example.ocean"));
    }
}
