//! The end-to-end customization pipeline.
//!
//! [`Agent`] owns one of each component and sequences them: compile a
//! [`ThemeSpec`], stage the archive in the scratch directory, hand it to the
//! registry for install and enable, and report the outcome both as a return
//! value and on the [`EventHub`].

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tincture_broker::{
    ConnectionState, HelperTransport, PrivilegedBroker, ProcessTransport, TransportError,
};
use tincture_compiler::{ArchiveReader, OverridePackage, PackageCompiler, ThemeSpec};
use tincture_guard::{SettingKey, validate_command};
use tincture_registry::{
    BatchReport, InstallOutcome, JsonFileStore, OverlayEntry, OverlayRegistry, RegistryStore,
};
use tracing::{info, warn};

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::events::{EventHub, PipelineEvent, Stage};
use crate::scratch::ScratchDir;

/// Snapshot for `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    #[serde(serialize_with = "serialize_state")]
    pub connection: ConnectionState,
    pub installed: usize,
    pub enabled: Vec<String>,
}

pub struct Agent {
    config: AgentConfig,
    compiler: PackageCompiler,
    broker: Arc<PrivilegedBroker>,
    registry: OverlayRegistry,
    scratch: ScratchDir,
    events: EventHub,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("scratch", &self.scratch)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Assemble from explicit parts. The configuration must validate.
    pub fn new(
        config: AgentConfig,
        transport: impl HelperTransport + 'static,
        store: impl RegistryStore + 'static,
    ) -> Result<Self> {
        let config = config.validated()?;
        let compiler = PackageCompiler::new(config.compiler_options())?;
        let scratch = ScratchDir::create(&config.scratch_dir)?;
        let broker = Arc::new(PrivilegedBroker::new(transport, config.broker_config()));
        let registry = OverlayRegistry::open(
            Arc::clone(&broker),
            store,
            config.enable_failure_policy,
        )?;
        Ok(Self {
            config,
            compiler,
            broker,
            registry,
            scratch,
            events: EventHub::new(),
        })
    }

    /// Process-backed helper and the JSON registry file named in `config`.
    pub fn from_config(config: AgentConfig) -> Result<Self> {
        let transport = helper_transport(&config)?;
        let store = JsonFileStore::new(config.registry_file());
        Self::new(config, transport, store)
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn broker(&self) -> &PrivilegedBroker {
        &self.broker
    }

    #[must_use]
    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    #[must_use]
    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Request permission from the helper if not already connected.
    pub fn connect(&self) -> Result<ConnectionState> {
        let result = self.broker.connect().map_err(AgentError::from);
        self.report(Stage::Connect, Vec::new(), result)
    }

    /// Compile without touching the host.
    pub fn compile(&self, spec: &ThemeSpec) -> Result<OverridePackage> {
        let result = self.compiler.compile_theme(spec).map_err(AgentError::from);
        self.report_with(Stage::Compile, result, |p| vec![p.identity.clone()])
    }

    /// Compile, install, prioritize, and enable a new overlay.
    pub fn apply(&self, spec: &ThemeSpec) -> Result<InstallOutcome> {
        let result = self.install_new(spec);
        self.report_with(Stage::Install, result, |o| vec![o.entry.identity.clone()])
    }

    fn install_new(&self, spec: &ThemeSpec) -> Result<InstallOutcome> {
        let package = self.compiler.compile_theme(spec)?;
        let archive = self.scratch.write_package(&package)?;
        let outcome = self.registry.install(&package, archive.path())?;
        info!(
            target: "tincture::pipeline",
            identity = %package.identity,
            bytes = package.size(),
            enabled = outcome.entry.enabled,
            "theme applied"
        );
        Ok(outcome)
    }

    /// Recompile `identity` from `spec` one version up and reinstall it.
    pub fn update(&self, identity: &str, spec: &ThemeSpec) -> Result<OverlayEntry> {
        let result = self.reinstall(identity, spec);
        self.report(Stage::Update, vec![identity.to_string()], result)
    }

    fn reinstall(&self, identity: &str, spec: &ThemeSpec) -> Result<OverlayEntry> {
        let current = self
            .registry
            .get(identity)
            .ok_or_else(|| AgentError::invalid(format!("overlay not installed: {identity}")))?;
        let version = current
            .version
            .checked_add(1)
            .ok_or_else(|| AgentError::invalid(format!("{identity} cannot be versioned further")))?;
        let package = self
            .compiler
            .compile_with_identity(spec, identity, version, Utc::now())?;
        let archive = self.scratch.write_package(&package)?;
        let entry = self.registry.reinstall(&package, archive.path())?;
        info!(
            target: "tincture::pipeline",
            identity,
            version,
            "theme updated"
        );
        Ok(entry)
    }

    pub fn set_enabled(&self, identity: &str, enabled: bool) -> Result<OverlayEntry> {
        let stage = if enabled { Stage::Enable } else { Stage::Disable };
        let result = self
            .registry
            .set_enabled(identity, enabled)
            .map_err(AgentError::from);
        self.report(stage, vec![identity.to_string()], result)
    }

    pub fn set_priority(&self, identity: &str, priority: i32) -> Result<OverlayEntry> {
        let result = self
            .registry
            .set_priority(identity, priority)
            .map_err(AgentError::from);
        self.report(Stage::Priority, vec![identity.to_string()], result)
    }

    pub fn remove(&self, identity: &str) -> Result<OverlayEntry> {
        let result = self.registry.delete(identity).map_err(AgentError::from);
        self.report(Stage::Remove, vec![identity.to_string()], result)
    }

    /// Apply to every identity; an incomplete report is an error carrying it.
    pub fn batch_set_enabled(&self, identities: &[String], enabled: bool) -> Result<BatchReport> {
        let (stage, operation) = if enabled {
            (Stage::Enable, "batch-enable")
        } else {
            (Stage::Disable, "batch-disable")
        };
        let report = self.registry.batch_set_enabled(identities, enabled);
        self.report_batch(stage, operation, identities, report)
    }

    pub fn batch_set_priority(&self, items: &[(String, i32)]) -> Result<BatchReport> {
        let identities: Vec<String> = items.iter().map(|(id, _)| id.clone()).collect();
        let report = self.registry.batch_set_priority(items);
        self.report_batch(Stage::Priority, "batch-priority", &identities, report)
    }

    pub fn batch_remove(&self, identities: &[String]) -> Result<BatchReport> {
        let report = self.registry.batch_delete(identities);
        self.report_batch(Stage::Remove, "batch-remove", identities, report)
    }

    pub fn read_setting(&self, namespace: &str, name: &str) -> Result<Option<String>> {
        let key = setting_key(namespace, name)?;
        let result = self.broker.read_setting(key).map_err(AgentError::from);
        self.report(Stage::Settings, Vec::new(), result)
    }

    pub fn write_setting(&self, namespace: &str, name: &str, value: &str) -> Result<()> {
        let key = setting_key(namespace, name)?;
        let result = self.broker.write_setting(key, value).map_err(AgentError::from);
        self.report(Stage::Settings, Vec::new(), result)
    }

    /// Whether `command` is on the privileged verb menu. Never runs it.
    #[must_use]
    pub fn check_command(&self, command: &str) -> bool {
        validate_command(command)
    }

    #[must_use]
    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            connection: self.broker.state(),
            installed: self.registry.len(),
            enabled: self
                .registry
                .enabled()
                .into_iter()
                .map(|e| e.identity)
                .collect(),
        }
    }

    fn report<T>(&self, stage: Stage, identities: Vec<String>, result: Result<T>) -> Result<T> {
        self.report_with(stage, result, |_| identities)
    }

    fn report_with<T>(
        &self,
        stage: Stage,
        result: Result<T>,
        identities: impl FnOnce(&T) -> Vec<String>,
    ) -> Result<T> {
        let event = match &result {
            Ok(value) => PipelineEvent::Succeeded {
                stage,
                identities: identities(value),
            },
            Err(err) => {
                warn!(
                    target: "tincture::pipeline",
                    stage = stage.as_str(),
                    kind = err.kind().as_str(),
                    error = %err,
                    "pipeline step failed"
                );
                PipelineEvent::Failed {
                    stage,
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        };
        self.events.publish(event);
        result
    }

    fn report_batch(
        &self,
        stage: Stage,
        operation: &'static str,
        identities: &[String],
        report: BatchReport,
    ) -> Result<BatchReport> {
        let failed = report.failed_identities();
        let succeeded: Vec<String> = identities
            .iter()
            .filter(|id| !failed.contains(&id.as_str()))
            .cloned()
            .collect();
        if !succeeded.is_empty() {
            self.events.publish(PipelineEvent::Succeeded {
                stage,
                identities: succeeded,
            });
        }
        if report.is_complete() {
            return Ok(report);
        }
        let err = AgentError::PartialBatch { operation, report };
        self.report(stage, Vec::new(), Err(err))
    }
}

fn serialize_state<S: serde::Serializer>(
    state: &ConnectionState,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(state.as_str())
}

/// Read an archive from disk and parse it.
pub fn inspect_archive(path: &Path) -> Result<ArchiveReader> {
    let bytes = std::fs::read(path).map_err(|e| AgentError::io(path, e))?;
    Ok(ArchiveReader::from_bytes(&bytes)?)
}

fn setting_key(namespace: &str, name: &str) -> Result<SettingKey> {
    SettingKey::lookup(namespace, name)
        .ok_or_else(|| AgentError::invalid(format!("setting not allowed: {namespace} {name}")))
}

fn helper_transport(config: &AgentConfig) -> Result<ProcessTransport> {
    let program = config.helper.program.as_str();
    let transport = if Path::new(program).is_absolute() {
        ProcessTransport::new(program, config.helper.args.clone())
    } else {
        match ProcessTransport::discover(program, config.helper.args.clone()) {
            Ok(transport) => transport,
            // Connecting reports the missing helper as BrokerUnavailable.
            Err(TransportError::HelperMissing(_)) => {
                ProcessTransport::new(program, config.helper.args.clone())
            }
            Err(err) => return Err(AgentError::invalid(err.to_string())),
        }
    };
    Ok(match &config.helper.probe {
        Some(probe) => transport.with_probe(probe.clone(), config.call_timeout()),
        None => transport,
    })
}
