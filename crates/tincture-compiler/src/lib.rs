#![forbid(unsafe_code)]

//! Theme specifications to resource-override archives.
//!
//! # Role in tincture
//! `tincture-compiler` is the packaging step of the pipeline. It takes a
//! validated [`ThemeSpec`], derives a palette with `tincture-style`, and
//! writes a gzip-compressed tar archive entirely in memory. Installing the
//! bytes is someone else's job.
//!
//! # This crate provides
//! - [`PackageCompiler`] with [`compile_theme`](PackageCompiler::compile_theme)
//!   and the deterministic
//!   [`compile_with_identity`](PackageCompiler::compile_with_identity).
//! - [`OverridePackage`], the compiled payload plus its metadata and digest.
//! - [`ArchiveReader`] for inspecting archives without unpacking them.
//! - [`TargetFeature`] and the feature-to-target mapping.

/// Archive writer and reader.
pub mod archive;
/// Package compilation.
pub mod compiler;
/// Error type for compilation and archive parsing.
pub mod error;
/// Host features and target identifiers.
pub mod feature;
/// Manifest and resource table types.
pub mod manifest;
/// Compiled packages.
pub mod package;
/// Compile requests.
pub mod spec;

pub use archive::{ArchiveReader, MAX_ENTRY_BYTES, write_archive};
pub use compiler::{CompilerOptions, DEFAULT_IDENTITY_PREFIX, PackageCompiler};
pub use error::{CompileError, Result};
pub use feature::{TargetFeature, targets_for};
pub use manifest::{FORMAT_VERSION, Manifest, ResourceTable, ResourceTier};
pub use package::OverridePackage;
pub use spec::ThemeSpec;
