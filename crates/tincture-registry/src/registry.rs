//! The overlay table and its broker-gated mutations.
//!
//! Every mutation that touches the host runs the broker call first and
//! writes the table only after it succeeds, all while holding the lock for
//! that identity. Two calls on the same identity therefore apply in some
//! serial order; calls on different identities run in parallel.
//!
//! Transitions that read or change relations (install, enable, disable,
//! delete, and relation edits) additionally hold one registry-wide gate,
//! taken before the identity lock. Conflicts are symmetric: an overlay
//! cannot be enabled while any enabled overlay lists it in
//! `conflicts_with`, and an overlay cannot be disabled or deleted while an
//! enabled overlay lists it in `depends_on`.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tincture_broker::PrivilegedBroker;
use tincture_compiler::OverridePackage;
use tincture_guard::{GuardError, OverlayVerb, check_priority, require_identity};
use tracing::{debug, info, warn};

use crate::entry::OverlayEntry;
use crate::error::{RegistryError, Result};
use crate::store::{RegistryStore, Table};

/// What `install` does when the final enable step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnableFailurePolicy {
    /// Record the overlay as installed but disabled.
    #[default]
    KeepDisabled,
    /// Uninstall again and record nothing.
    Rollback,
}

/// Result of a completed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub entry: OverlayEntry,
    /// Set when the requested priority could not be applied.
    pub priority_failure: Option<String>,
    /// Set when the overlay was installed but could not be enabled.
    pub enable_failure: Option<String>,
}

impl InstallOutcome {
    /// Installed, prioritized, and enabled.
    #[must_use]
    pub fn fully_applied(&self) -> bool {
        self.priority_failure.is_none() && self.enable_failure.is_none()
    }
}

/// One item a batch could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub identity: String,
    pub reason: String,
}

/// Per-item results of a batch operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    #[must_use]
    pub fn failed_identities(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.identity.as_str()).collect()
    }

    fn record(&mut self, identity: &str, result: Result<OverlayEntry>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(err) => self.failed.push(BatchFailure {
                identity: identity.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

pub struct OverlayRegistry {
    broker: Arc<PrivilegedBroker>,
    store: Box<dyn RegistryStore>,
    table: RwLock<Table>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    relations: Mutex<()>,
    policy: EnableFailurePolicy,
}

impl std::fmt::Debug for OverlayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRegistry")
            .field("broker", &self.broker)
            .field("entries", &self.read().len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl OverlayRegistry {
    /// Load the table from `store`.
    pub fn open(
        broker: Arc<PrivilegedBroker>,
        store: impl RegistryStore + 'static,
        policy: EnableFailurePolicy,
    ) -> Result<Self> {
        let table = store.load()?;
        debug!(
            target: "tincture_registry::table",
            entries = table.len(),
            ?policy,
            "registry loaded"
        );
        Ok(Self {
            broker,
            store: Box::new(store),
            table: RwLock::new(table),
            locks: Mutex::new(HashMap::new()),
            relations: Mutex::new(()),
            policy,
        })
    }

    #[must_use]
    pub fn broker(&self) -> &Arc<PrivilegedBroker> {
        &self.broker
    }

    #[must_use]
    pub fn policy(&self) -> EnableFailurePolicy {
        self.policy
    }

    // --- reads ---

    #[must_use]
    pub fn get(&self, identity: &str) -> Option<OverlayEntry> {
        self.read().get(identity).cloned()
    }

    /// Every entry, ordered by identity.
    #[must_use]
    pub fn list(&self) -> Vec<OverlayEntry> {
        self.read().values().cloned().collect()
    }

    /// Enabled entries in application order: lowest priority first.
    #[must_use]
    pub fn enabled(&self) -> Vec<OverlayEntry> {
        let mut entries: Vec<_> = self.read().values().filter(|e| e.enabled).cloned().collect();
        entries.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // --- mutations ---

    /// Install `package` from `archive_path`, apply its priority, enable it,
    /// and record the result.
    ///
    /// If the install call fails nothing is recorded. A failed priority step
    /// records priority 0. A failed enable step, or an enabled overlay that
    /// conflicts with this one, follows the registry's
    /// [`EnableFailurePolicy`].
    pub fn install(&self, package: &OverridePackage, archive_path: &Path) -> Result<InstallOutcome> {
        let identity = require_identity(&package.identity)?;
        let _relations = self.relation_gate();
        self.with_identity(identity, || self.install_locked(identity, package, archive_path))
    }

    fn install_locked(
        &self,
        identity: &str,
        package: &OverridePackage,
        archive_path: &Path,
    ) -> Result<InstallOutcome> {
        if self.read().contains_key(identity) {
            return Err(RegistryError::AlreadyInstalled {
                identity: identity.to_string(),
            });
        }

        self.broker.install_package(archive_path)?;

        let mut priority = package.priority;
        let mut priority_failure = None;
        if priority != 0 {
            if let Err(err) = self
                .broker
                .set_overlay_state(identity, OverlayVerb::SetPriority(priority))
            {
                warn!(
                    target: "tincture_registry::table",
                    identity,
                    priority,
                    error = %err,
                    "priority not applied; recording host default"
                );
                priority = 0;
                priority_failure = Some(err.to_string());
            }
        }

        let enable_failure = match self.enable_new(identity) {
            Ok(()) => None,
            Err(err) => match self.policy {
                EnableFailurePolicy::KeepDisabled => {
                    warn!(
                        target: "tincture_registry::table",
                        identity,
                        error = %err,
                        "installed but not enabled"
                    );
                    Some(err.to_string())
                }
                EnableFailurePolicy::Rollback => {
                    return self.roll_back(package, priority, err);
                }
            },
        };

        let entry = self.record_installed(package, enable_failure.is_none(), priority)?;
        info!(
            target: "tincture_registry::table",
            identity,
            enabled = entry.enabled,
            priority = entry.priority,
            digest = package.short_digest(),
            "overlay installed"
        );
        Ok(InstallOutcome {
            entry,
            priority_failure,
            enable_failure,
        })
    }

    fn enable_new(&self, identity: &str) -> Result<()> {
        if let Some(conflict) = self.enabled_conflicting_with(identity) {
            return Err(RegistryError::Conflict {
                identity: identity.to_string(),
                conflict,
            });
        }
        self.broker.set_overlay_state(identity, OverlayVerb::Enable)?;
        Ok(())
    }

    fn roll_back(
        &self,
        package: &OverridePackage,
        priority: i32,
        enable: RegistryError,
    ) -> Result<InstallOutcome> {
        let identity = package.identity.as_str();
        match self.broker.uninstall_package(identity) {
            Ok(()) => {
                warn!(
                    target: "tincture_registry::table",
                    identity,
                    error = %enable,
                    "enable failed; install rolled back"
                );
                Err(enable)
            }
            Err(uninstall) => {
                self.record_installed(package, false, priority)?;
                warn!(
                    target: "tincture_registry::table",
                    identity,
                    enable = %enable,
                    uninstall = %uninstall,
                    "rollback failed; overlay recorded disabled"
                );
                Err(RegistryError::RollbackFailed {
                    identity: identity.to_string(),
                    enable: enable.to_string(),
                    uninstall: uninstall.to_string(),
                })
            }
        }
    }

    /// Caller holds the identity lock and the host has the package.
    fn record_installed(
        &self,
        package: &OverridePackage,
        enabled: bool,
        priority: i32,
    ) -> Result<OverlayEntry> {
        let entry = OverlayEntry::from_package(package, enabled, priority, Utc::now());
        self.commit(entry.clone())?;
        Ok(entry)
    }

    /// Reinstall an existing overlay from a newer package and record it.
    pub fn reinstall(&self, package: &OverridePackage, archive_path: &Path) -> Result<OverlayEntry> {
        let identity = require_identity(&package.identity)?;
        self.with_identity(identity, || {
            let current = self.existing(identity)?;
            check_newer(&current, package)?;
            self.broker.install_package(archive_path)?;
            self.record_updated(current, package)
        })
    }

    /// Caller holds the identity lock and the reinstall succeeded.
    fn record_updated(&self, mut entry: OverlayEntry, package: &OverridePackage) -> Result<OverlayEntry> {
        entry.apply_update(package, Utc::now());
        self.commit(entry.clone())?;
        info!(
            target: "tincture_registry::table",
            identity = %entry.identity,
            version = entry.version,
            "overlay updated"
        );
        Ok(entry)
    }

    pub fn set_priority(&self, identity: &str, priority: i32) -> Result<OverlayEntry> {
        require_identity(identity)?;
        check_priority(i64::from(priority))?;
        self.with_identity(identity, || {
            let mut entry = self.existing(identity)?;

            self.broker
                .set_overlay_state(identity, OverlayVerb::SetPriority(priority))?;

            if entry.priority != priority {
                entry.priority = priority;
                entry.updated_at = Utc::now();
            }
            // Unconditional: an earlier call may have reached the host but not the store.
            self.commit(entry.clone())?;
            debug!(target: "tincture_registry::table", identity, priority, "priority set");
            Ok(entry)
        })
    }

    /// Enable or disable.
    ///
    /// Enabling refuses while a dependency is disabled or a conflicting
    /// overlay is enabled. Disabling refuses while an enabled overlay
    /// depends on this one.
    pub fn set_enabled(&self, identity: &str, enabled: bool) -> Result<OverlayEntry> {
        require_identity(identity)?;
        let _relations = self.relation_gate();
        self.with_identity(identity, || {
            let mut entry = self.existing(identity)?;
            let verb = if enabled {
                self.check_can_enable(&entry)?;
                OverlayVerb::Enable
            } else {
                self.check_no_enabled_dependents(identity)?;
                OverlayVerb::Disable
            };

            self.broker.set_overlay_state(identity, verb)?;

            if entry.enabled != enabled {
                entry.enabled = enabled;
                entry.updated_at = Utc::now();
            }
            self.commit(entry.clone())?;
            debug!(target: "tincture_registry::table", identity, enabled, "overlay state set");
            Ok(entry)
        })
    }

    /// Uninstall and forget. Refuses while an enabled overlay depends on it.
    pub fn delete(&self, identity: &str) -> Result<OverlayEntry> {
        require_identity(identity)?;
        let _relations = self.relation_gate();
        self.with_identity(identity, || {
            let entry = self.existing(identity)?;
            self.check_no_enabled_dependents(identity)?;

            self.broker.uninstall_package(identity)?;

            self.write().remove(identity);
            self.store.remove(identity)?;
            info!(target: "tincture_registry::table", identity, "overlay removed");
            Ok(entry)
        })
    }

    /// Replace the relation metadata of an entry. No broker call.
    ///
    /// An enabled entry only accepts relations it already satisfies.
    pub fn set_relations(
        &self,
        identity: &str,
        depends_on: BTreeSet<String>,
        conflicts_with: BTreeSet<String>,
    ) -> Result<OverlayEntry> {
        require_identity(identity)?;
        for other in depends_on.iter().chain(&conflicts_with) {
            require_identity(other)?;
            if other == identity {
                return Err(
                    GuardError::argument("relations", "an overlay cannot relate to itself").into(),
                );
            }
        }
        if let Some(both) = depends_on.intersection(&conflicts_with).next() {
            return Err(GuardError::argument(
                "relations",
                format!("{both} is both a dependency and a conflict"),
            )
            .into());
        }

        let _relations = self.relation_gate();
        self.with_identity(identity, || {
            let mut entry = self.existing(identity)?;
            entry.depends_on = depends_on;
            entry.conflicts_with = conflicts_with;
            if entry.enabled {
                self.check_can_enable(&entry)?;
            }
            entry.updated_at = Utc::now();
            self.commit(entry.clone())?;
            Ok(entry)
        })
    }

    // --- batches ---

    pub fn batch_set_enabled<I, S>(&self, identities: I, enabled: bool) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        for identity in identities {
            let identity = identity.as_ref();
            report.record(identity, self.set_enabled(identity, enabled));
        }
        log_batch("set-enabled", &report);
        report
    }

    pub fn batch_set_priority(&self, items: &[(String, i32)]) -> BatchReport {
        let mut report = BatchReport::default();
        for (identity, priority) in items {
            report.record(identity, self.set_priority(identity, *priority));
        }
        log_batch("set-priority", &report);
        report
    }

    pub fn batch_delete<I, S>(&self, identities: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        for identity in identities {
            let identity = identity.as_ref();
            report.record(identity, self.delete(identity));
        }
        log_batch("delete", &report);
        report
    }

    // --- internals ---

    fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn relation_gate(&self) -> MutexGuard<'_, ()> {
        self.relations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` under the lock for `identity`, then drop the lock from the
    /// map if no other caller holds it.
    fn with_identity<T>(&self, identity: &str, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(identity.to_string()).or_default())
        };
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            op()
        };
        drop(lock);

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(identity)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            locks.remove(identity);
        }
        result
    }

    fn existing(&self, identity: &str) -> Result<OverlayEntry> {
        self.get(identity)
            .ok_or_else(|| RegistryError::not_found(identity))
    }

    fn enabled_conflicting_with(&self, identity: &str) -> Option<String> {
        self.read()
            .values()
            .find(|other| other.enabled && other.conflicts_with.contains(identity))
            .map(|other| other.identity.clone())
    }

    fn check_can_enable(&self, entry: &OverlayEntry) -> Result<()> {
        {
            let table = self.read();
            for dependency in &entry.depends_on {
                if !table.get(dependency).is_some_and(|d| d.enabled) {
                    return Err(RegistryError::DependencyNotEnabled {
                        identity: entry.identity.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            for conflict in &entry.conflicts_with {
                if table.get(conflict).is_some_and(|c| c.enabled) {
                    return Err(RegistryError::Conflict {
                        identity: entry.identity.clone(),
                        conflict: conflict.clone(),
                    });
                }
            }
        }
        match self.enabled_conflicting_with(&entry.identity) {
            Some(conflict) => Err(RegistryError::Conflict {
                identity: entry.identity.clone(),
                conflict,
            }),
            None => Ok(()),
        }
    }

    fn check_no_enabled_dependents(&self, identity: &str) -> Result<()> {
        let table = self.read();
        match table
            .values()
            .find(|other| other.enabled && other.depends_on.contains(identity))
        {
            Some(dependent) => Err(RegistryError::DependentEnabled {
                identity: identity.to_string(),
                dependent: dependent.identity.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Persist, then update the table. The table is updated even when the
    /// store write fails, so it keeps matching the host; the store error is
    /// still returned.
    fn commit(&self, entry: OverlayEntry) -> Result<()> {
        let persisted = self.store.put(&entry);
        let identity = entry.identity.clone();
        self.write().insert(identity.clone(), entry);
        if let Err(err) = &persisted {
            warn!(
                target: "tincture_registry::table",
                identity = %identity,
                error = %err,
                "entry not persisted"
            );
        }
        persisted.map_err(RegistryError::from)
    }

    #[cfg(test)]
    fn identity_lock_count(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn check_newer(current: &OverlayEntry, package: &OverridePackage) -> Result<()> {
    if package.version <= current.version {
        return Err(GuardError::argument(
            "update",
            format!(
                "version {} does not supersede installed version {}",
                package.version, current.version
            ),
        )
        .into());
    }
    Ok(())
}

fn log_batch(operation: &'static str, report: &BatchReport) {
    if report.is_complete() {
        info!(
            target: "tincture_registry::table",
            operation,
            succeeded = report.succeeded,
            "batch applied"
        );
    } else {
        warn!(
            target: "tincture_registry::table",
            operation,
            succeeded = report.succeeded,
            failed = ?report.failed_identities(),
            "batch partially applied"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tincture_broker::testing::{ScriptedTransport, ready_broker};
    use tincture_compiler::{PackageCompiler, ThemeSpec};
    use tracing_test::traced_test;

    use super::*;
    use crate::store::MemoryStore;

    fn registry_with(transport: ScriptedTransport, store: MemoryStore) -> OverlayRegistry {
        let broker = ready_broker(transport, vec!["/data/local/tmp".into()]);
        OverlayRegistry::open(Arc::new(broker), store, EnableFailurePolicy::default())
            .expect("open")
    }

    fn registry(transport: ScriptedTransport) -> OverlayRegistry {
        registry_with(transport, MemoryStore::new())
    }

    fn package(identity: &str) -> OverridePackage {
        let spec = ThemeSpec::from_hex("#FF6200EE", "Ocean", []).expect("spec");
        let created = Utc.timestamp_opt(0, 0).single().expect("epoch");
        PackageCompiler::default()
            .compile_with_identity(&spec, identity, 1, created)
            .expect("compile")
    }

    fn disabled(identity: &str) -> OverlayEntry {
        OverlayEntry::from_package(&package(identity), false, 0, Utc::now())
    }

    #[test]
    fn batch_report_counts() {
        let mut report = BatchReport::default();
        report.record("com.example.a", Err(RegistryError::not_found("com.example.a")));
        assert!(!report.is_complete());
        assert_eq!(report.attempted(), 1);
        assert_eq!(report.failed[0].reason, "overlay not found: com.example.a");
    }

    #[test]
    #[traced_test]
    fn partial_batch_is_logged_with_failed_identities() {
        let store = MemoryStore::with_entries([disabled("com.example.a"), disabled("com.example.b")]);
        let registry = registry_with(
            ScriptedTransport::succeeding().fail_when_contains("com.example.b", 1, "x"),
            store,
        );
        let report = registry.batch_set_enabled(["com.example.a", "com.example.b"], true);
        assert_eq!(report.succeeded, 1);
        assert!(logs_contain("batch partially applied"));
        assert!(logs_contain("com.example.b"));
    }

    #[test]
    #[traced_test]
    fn install_logs_the_digest_prefix() {
        let registry = registry(ScriptedTransport::succeeding());
        let package = package("com.example.a");
        registry
            .install(&package, Path::new("/data/local/tmp/a.pkg"))
            .expect("install");
        assert!(logs_contain("overlay installed"));
        assert!(logs_contain(package.short_digest()));
    }

    #[test]
    fn identity_locks_are_released_after_each_call() {
        let registry = registry(ScriptedTransport::succeeding().fail_when_contains("z.pkg", 1, "no"));
        for round in 0..100 {
            let identity = format!("com.example.overlay_{round}");
            registry
                .install(&package(&identity), Path::new("/data/local/tmp/o.pkg"))
                .expect("install");
            registry.set_priority(&identity, 3).expect("priority");
            registry.delete(&identity).expect("delete");
        }
        assert!(registry.install(&package("com.example.z"), Path::new("/data/local/tmp/z.pkg")).is_err());
        assert!(registry.delete("com.example.missing").is_err());

        assert!(registry.is_empty());
        assert_eq!(registry.identity_lock_count(), 0);
    }
}
