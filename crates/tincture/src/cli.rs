use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tincture_compiler::{ArchiveReader, TargetFeature, ThemeSpec};
use tincture_registry::{BatchReport, OverlayEntry};
use tincture_style::Argb;

use crate::config::{AgentConfig, LogFormat};
use crate::error::{AgentError, Result};
use crate::logging;
use crate::pipeline::{Agent, inspect_archive};

#[derive(Debug, Parser)]
#[command(
    name = "tincture",
    about = "Compile, install, and manage resource-override theme packages",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "scratch-dir", global = true)]
    pub scratch_dir: Option<PathBuf>,

    /// Registry file; overrides `registry_path`.
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,

    /// Helper program; overrides `helper.program`.
    #[arg(long, global = true)]
    pub helper: Option<String>,

    /// Per-call helper deadline such as `30s` or `1500ms`.
    #[arg(long = "call-timeout", global = true)]
    pub call_timeout: Option<String>,

    #[arg(long = "log-format", global = true, value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    /// Load the configured file, then apply flag overrides.
    pub fn resolve_config(&self) -> Result<AgentConfig> {
        let mut config = AgentConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir.clone_from(dir);
        }
        if let Some(path) = &self.registry {
            config.registry_path.clone_from(path);
        }
        if let Some(helper) = &self.helper {
            config.helper.program.clone_from(helper);
        }
        if let Some(timeout) = &self.call_timeout {
            config.call_timeout.clone_from(timeout);
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok(config)
    }
}

fn parse_log_format(raw: &str) -> std::result::Result<LogFormat, String> {
    match raw {
        "fmt" => Ok(LogFormat::Fmt),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format {other:?} (expected fmt or json)")),
    }
}

#[derive(Debug, Clone, Args)]
pub struct ThemeArgs {
    /// Base color as `#RRGGBB` or `#AARRGGBB`.
    #[arg(long)]
    pub color: String,

    #[arg(long)]
    pub name: String,

    /// Host feature to theme; repeatable.
    #[arg(long = "feature")]
    pub features: Vec<TargetFeature>,

    #[arg(long, allow_negative_numbers = true)]
    pub priority: Option<i32>,
}

impl ThemeArgs {
    pub fn to_spec(&self) -> Result<ThemeSpec> {
        let spec = ThemeSpec::new(
            Argb::from_hex(&self.color)?,
            self.name.clone(),
            self.features.iter().copied(),
        );
        Ok(match self.priority {
            Some(priority) => spec.with_priority(priority),
            None => spec,
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile a theme to an archive file without installing it.
    Compile {
        #[command(flatten)]
        theme: ThemeArgs,

        #[arg(long)]
        out: PathBuf,
    },

    /// Print the manifest and tables of an archive.
    Inspect { archive: PathBuf },

    /// Compile, install, and enable a theme.
    Apply(ThemeArgs),

    /// Rebuild an installed overlay from a new theme.
    Update {
        identity: String,

        #[command(flatten)]
        theme: ThemeArgs,
    },

    Enable { identity: String },

    Disable { identity: String },

    /// Set overlay priority.
    Priority {
        identity: String,

        #[arg(allow_negative_numbers = true)]
        priority: i32,
    },

    /// Uninstall an overlay.
    Remove { identity: String },

    /// List recorded overlays.
    List {
        /// Only enabled overlays, in application order.
        #[arg(long)]
        enabled: bool,
    },

    #[command(name = "batch-enable")]
    BatchEnable {
        #[arg(required = true)]
        identities: Vec<String>,
    },

    #[command(name = "batch-disable")]
    BatchDisable {
        #[arg(required = true)]
        identities: Vec<String>,
    },

    /// Uninstall several overlays, continuing past failures.
    #[command(name = "batch-remove")]
    BatchRemove {
        #[arg(required = true)]
        identities: Vec<String>,
    },

    #[command(name = "settings-get")]
    SettingsGet { namespace: String, key: String },

    #[command(name = "settings-put")]
    SettingsPut {
        namespace: String,
        key: String,
        value: String,
    },

    /// Report whether a command line is on the privileged menu.
    #[command(name = "check-command")]
    CheckCommand { command: String },

    /// Connection state and overlay counts.
    Status,
}

impl Commands {
    /// Commands that issue privileged calls connect first.
    fn needs_connection(&self) -> bool {
        !matches!(
            self,
            Self::Compile { .. }
                | Self::Inspect { .. }
                | Self::List { .. }
                | Self::CheckCommand { .. }
                | Self::Status
        )
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.global.resolve_config()?;
    logging::init(config.log_format, config.log_filter.as_deref());
    run(cli, config)
}

pub fn run(cli: Cli, config: AgentConfig) -> Result<()> {
    let out = Output { json: cli.global.json };
    match cli.command {
        Commands::Inspect { archive } => {
            let reader = inspect_archive(&archive)?;
            out.inspect(&reader)
        }
        Commands::CheckCommand { command } => {
            let allowed = tincture_guard::validate_command(&command);
            out.value(&serde_json::json!({ "command": command, "allowed": allowed }), || {
                if allowed { "allowed" } else { "denied" }.to_string()
            })?;
            if allowed {
                Ok(())
            } else {
                Err(AgentError::exit(1, format!("command not allowed: {command}")))
            }
        }
        command => {
            let agent = Agent::from_config(config)?;
            if command.needs_connection() {
                agent.connect()?;
            }
            dispatch(&agent, command, &out)
        }
    }
}

fn dispatch(agent: &Agent, command: Commands, out: &Output) -> Result<()> {
    match command {
        Commands::Compile { theme, out: path } => {
            let package = agent.compile(&theme.to_spec()?)?;
            std::fs::write(&path, &package.payload).map_err(|e| AgentError::io(&path, e))?;
            out.value(
                &serde_json::json!({
                    "identity": package.identity,
                    "path": path,
                    "bytes": package.size(),
                    "digest": package.digest,
                    "targets": package.targets,
                }),
                || format!("{} -> {} ({} bytes)", package.identity, path.display(), package.size()),
            )
        }
        Commands::Apply(theme) => {
            let outcome = agent.apply(&theme.to_spec()?)?;
            out.entry(&outcome.entry)?;
            if let Some(reason) = &outcome.priority_failure {
                eprintln!("warning: priority not applied: {reason}");
            }
            if let Some(reason) = &outcome.enable_failure {
                eprintln!("warning: installed but not enabled: {reason}");
            }
            Ok(())
        }
        Commands::Update { identity, theme } => {
            out.entry(&agent.update(&identity, &theme.to_spec()?)?)
        }
        Commands::Enable { identity } => out.entry(&agent.set_enabled(&identity, true)?),
        Commands::Disable { identity } => out.entry(&agent.set_enabled(&identity, false)?),
        Commands::Priority { identity, priority } => {
            out.entry(&agent.set_priority(&identity, priority)?)
        }
        Commands::Remove { identity } => {
            let entry = agent.remove(&identity)?;
            out.value(&entry, || format!("removed {}", entry.identity))
        }
        Commands::List { enabled } => {
            let entries = if enabled {
                agent.registry().enabled()
            } else {
                agent.registry().list()
            };
            out.list(&entries)
        }
        Commands::BatchEnable { identities } => {
            out.batch(agent.batch_set_enabled(&identities, true))
        }
        Commands::BatchDisable { identities } => {
            out.batch(agent.batch_set_enabled(&identities, false))
        }
        Commands::BatchRemove { identities } => out.batch(agent.batch_remove(&identities)),
        Commands::SettingsGet { namespace, key } => {
            let value = agent.read_setting(&namespace, &key)?;
            out.value(&value, || value.clone().unwrap_or_else(|| "null".to_string()))
        }
        Commands::SettingsPut {
            namespace,
            key,
            value,
        } => {
            agent.write_setting(&namespace, &key, &value)?;
            out.value(&serde_json::json!({ "ok": true }), || "ok".to_string())
        }
        Commands::Status => {
            let status = agent.status();
            out.value(&status, || {
                format!(
                    "connection: {}\ninstalled: {}\nenabled: {}",
                    status.connection,
                    status.installed,
                    status.enabled.join(", ")
                )
            })
        }
        Commands::Inspect { .. } | Commands::CheckCommand { .. } => Ok(()),
    }
}

struct Output {
    json: bool,
}

impl Output {
    fn value<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", human());
        }
        Ok(())
    }

    fn entry(&self, entry: &OverlayEntry) -> Result<()> {
        self.value(entry, || entry_line(entry))
    }

    fn list(&self, entries: &[OverlayEntry]) -> Result<()> {
        self.value(&entries, || {
            if entries.is_empty() {
                "no overlays recorded".to_string()
            } else {
                entries.iter().map(entry_line).collect::<Vec<_>>().join("\n")
            }
        })
    }

    /// Print the report either way; an incomplete batch is still an error.
    fn batch(&self, result: Result<BatchReport>) -> Result<()> {
        match result {
            Ok(report) => self.value(&report, || format!("{} applied", report.succeeded)),
            Err(AgentError::PartialBatch { operation, report }) => {
                self.value(&report, || {
                    let mut lines = vec![format!("{} applied", report.succeeded)];
                    lines.extend(
                        report
                            .failed
                            .iter()
                            .map(|f| format!("failed {}: {}", f.identity, f.reason)),
                    );
                    lines.join("\n")
                })?;
                Err(AgentError::PartialBatch { operation, report })
            }
            Err(other) => Err(other),
        }
    }

    fn inspect(&self, reader: &ArchiveReader) -> Result<()> {
        let manifest = reader.manifest();
        if self.json {
            let value = serde_json::json!({
                "manifest": manifest,
                "baseline": reader.baseline_table(),
                "rich": reader.rich_table(),
                "entries": reader.entries(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
        println!("identity: {}", manifest.identity);
        println!("name:     {}", manifest.display_name);
        println!("version:  {}", manifest.version);
        println!("priority: {}", manifest.priority);
        println!("targets:  {}", manifest.targets.join(", "));
        println!("source:   {}", manifest.source_color);
        for (name, color) in reader.baseline_table().iter() {
            println!("  {name:<24} {color}");
        }
        Ok(())
    }
}

fn entry_line(entry: &OverlayEntry) -> String {
    format!(
        "{} [{}] priority={} v{} {}",
        entry.identity,
        if entry.enabled { "enabled" } else { "disabled" },
        entry.priority,
        entry.version,
        entry.display_name
    )
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_parses_repeated_features_and_negative_priority() {
        let cli = Cli::try_parse_from([
            "tincture",
            "apply",
            "--color",
            "#FF6200EE",
            "--name",
            "Ocean",
            "--feature",
            "status-bar",
            "--feature",
            "quick_settings",
            "--priority",
            "-5",
        ])
        .expect("parse args");
        let Commands::Apply(theme) = cli.command else {
            panic!("expected apply");
        };
        let spec = theme.to_spec().expect("to spec");
        assert_eq!(spec.priority, Some(-5));
        assert_eq!(spec.target_features.len(), 2);
        assert!(spec.target_features.contains(&TargetFeature::StatusBar));
    }

    #[test]
    fn global_flags_override_config() {
        let cli = Cli::try_parse_from([
            "tincture",
            "status",
            "--scratch-dir",
            "/tmp/tincture-test",
            "--call-timeout",
            "2s",
            "--log-format",
            "json",
            "--json",
        ])
        .expect("parse args");
        assert!(cli.global.json);
        let config = cli.global.resolve_config().expect("resolve config");
        assert_eq!(config.scratch_dir, PathBuf::from("/tmp/tincture-test"));
        assert_eq!(config.call_timeout(), std::time::Duration::from_secs(2));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn batch_commands_require_identities() {
        assert!(Cli::try_parse_from(["tincture", "batch-enable"]).is_err());
        let cli =
            Cli::try_parse_from(["tincture", "batch-disable", "com.example.a", "com.example.b"])
                .expect("parse args");
        assert!(matches!(
            cli.command,
            Commands::BatchDisable { identities } if identities.len() == 2
        ));

        assert!(Cli::try_parse_from(["tincture", "batch-remove"]).is_err());
        let cli = Cli::try_parse_from(["tincture", "batch-remove", "com.example.a"])
            .expect("parse args");
        assert!(matches!(
            cli.command,
            Commands::BatchRemove { identities } if identities == ["com.example.a"]
        ));
    }

    #[test]
    fn priority_accepts_negative_values() {
        let cli = Cli::try_parse_from(["tincture", "priority", "com.example.a", "-20"]).expect("parse args");
        assert!(matches!(
            cli.command,
            Commands::Priority { priority: -20, .. }
        ));
    }

    #[test]
    fn unknown_feature_is_a_parse_error() {
        let parsed = Cli::try_parse_from([
            "tincture", "compile", "--color", "#000000", "--name", "x", "--feature", "toaster",
            "--out", "/tmp/x.pkg",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn check_command_reports_denial_through_the_exit_code() {
        let deny = Cli::try_parse_from(["tincture", "check-command", "rm -rf /"]).expect("parse args");
        let err = run(deny, AgentConfig::default()).expect_err("denied command should fail");
        assert_eq!(err.exit_code(), 1);

        let allow = Cli::try_parse_from([
            "tincture",
            "check-command",
            "cmd overlay enable com.example.theme",
        ])
        .expect("parse args");
        assert!(run(allow, AgentConfig::default()).is_ok());
    }

    #[test]
    fn inspect_of_a_missing_file_is_an_io_error() {
        let cli = Cli::try_parse_from(["tincture", "inspect", "/nonexistent/tincture.pkg"]).expect("parse args");
        let err = run(cli, AgentConfig::default()).expect_err("missing archive should fail");
        assert_eq!(err.kind(), crate::error::FailureKind::Io);
    }
}
