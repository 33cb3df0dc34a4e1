//! Compile a theme, then read the archive back the way an installer would.

use chrono::{TimeZone, Utc};
use tincture_compiler::{
    ArchiveReader, PackageCompiler, ResourceTier, TargetFeature, ThemeSpec,
};
use tincture_style::{Argb, Role};

#[test]
fn ocean_status_bar_manifest_lists_exactly_one_target() {
    let spec = ThemeSpec::from_hex("#FF6200EE", "Ocean", [TargetFeature::StatusBar])
        .expect("spec");
    let package = PackageCompiler::default().compile_theme(&spec).expect("compile");

    let reader = ArchiveReader::from_bytes(&package.payload).expect("read archive");
    let manifest = reader.manifest();
    assert_eq!(manifest.targets, vec!["com.android.systemui"]);
    assert_eq!(manifest.features, vec![TargetFeature::StatusBar]);
    assert_eq!(manifest.display_name, "Ocean");
    assert_eq!(manifest.identity, package.identity);
    assert_eq!(manifest.source_color, Argb(0xFF62_00EE));
    assert_eq!(package.targets, manifest.targets);
    assert_eq!(package.version, 1);

    let baseline = reader.baseline_table();
    assert_eq!(baseline.get(Role::Primary.name()), Some(Argb(0xFF62_00EE)));
    assert_eq!(baseline.get(Role::OnPrimary.name()), Some(Argb::WHITE));
}

#[test]
fn empty_feature_set_yields_a_structurally_valid_archive() {
    let spec = ThemeSpec::new(Argb::rgb(0, 150, 136), "Teal", []);
    let package = PackageCompiler::default().compile_theme(&spec).expect("compile");
    assert!(package.targets.is_empty());

    let reader = package.open().expect("read archive");
    assert!(reader.manifest().targets.is_empty());
    assert!(reader.entries().iter().any(|entry| entry == "assets/"));
    assert!(!reader.baseline_table().is_empty());
}

#[test]
fn display_name_and_feature_targets_round_trip() {
    let features = [
        TargetFeature::Launcher,
        TargetFeature::QuickSettings,
        TargetFeature::StatusBar,
        TargetFeature::Settings,
    ];
    let spec = ThemeSpec::new(Argb::rgb(255, 87, 34), "  Deep Ember ", features);
    let created_at = Utc.with_ymd_and_hms(2026, 5, 4, 3, 2, 1).single().expect("timestamp");
    let package = PackageCompiler::default()
        .compile_with_identity(&spec, "com.example.ember", 2, created_at)
        .expect("compile");

    let reader = package.open().expect("read archive");
    let manifest = reader.manifest();
    assert_eq!(manifest.display_name, "Deep Ember");
    assert_eq!(manifest.created_at, created_at);
    assert_eq!(manifest.version, 2);
    assert_eq!(
        manifest.targets,
        vec!["com.android.systemui", "com.android.settings", "com.android.launcher3"]
    );
    assert_eq!(manifest.tiers, vec![ResourceTier::Baseline, ResourceTier::Rich]);
}

#[test]
fn rich_ramp_is_finer_and_monotonic() {
    let spec = ThemeSpec::new(Argb::rgb(63, 81, 181), "Indigo", [TargetFeature::SystemAccents]);
    let package = PackageCompiler::default().compile_theme(&spec).expect("compile");
    let reader = package.open().expect("read archive");

    let baseline = reader.baseline_table().ramp();
    let rich = reader.rich_table().expect("rich tier").ramp();
    assert_eq!(baseline.len(), 14);
    assert_eq!(rich.len(), 21);
    for ramp in [&baseline, &rich] {
        for pair in ramp.windows(2) {
            assert!(pair[0].1.luminance() >= pair[1].1.luminance());
        }
    }
}

#[test]
fn digest_identifies_the_payload() {
    let spec = ThemeSpec::new(Argb::BLACK, "Night", [TargetFeature::LockScreen]);
    let compiler = PackageCompiler::default();
    let first = compiler.compile_theme(&spec).expect("compile");
    let second = compiler.compile_theme(&spec).expect("compile");
    assert_ne!(first.identity, second.identity);
    assert_ne!(first.digest, second.digest);
    assert!(first.digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}
