//! The plugin registry: loaded units and the lookup tables built from them.
//!
//! ```text
//!  sources ──scan()──▶ RegistryState (units, load order) ──build──▶ RegistrySnapshot
//!                           │                                          │
//!                      Mutex, one writer                    RwLock<Arc<_>> swap
//!                                                                      │
//!                                                     DispatchEngine ◀─┘ (many readers)
//! ```
//!
//! A scan reloads units whose stamp changed, drops units that vanished, and
//! then publishes a fresh [`RegistrySnapshot`] in one pointer swap. A
//! dispatch holds the `Arc` it started with, so it never sees a half-updated
//! table.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{LoadError, RegistryError, RegistryResult};
use crate::hook::{Hook, HookMatcher, HookTrigger};
use crate::plugin::{PluginSource, Stamp, UnitStamp};

// =============================================================================
// Snapshot
// =============================================================================

/// Immutable lookup tables published by a scan.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    /// Lowercase command name (aliases included) → hook.
    commands: BTreeMap<String, Arc<Hook>>,
    /// Uppercase event name → hooks in registration order.
    events: HashMap<String, Vec<Arc<Hook>>>,
    wildcard: Vec<Arc<Hook>>,
    regexes: Vec<Arc<Hook>>,
    units: Vec<String>,
}

impl RegistrySnapshot {
    fn build(generation: u64, units: &[LoadedUnit]) -> Self {
        let mut snapshot = Self {
            generation,
            ..Self::default()
        };
        for unit in units {
            snapshot.units.push(unit.name.clone());
            for hook in &unit.hooks {
                match hook.matcher() {
                    HookMatcher::Command(meta) => {
                        for name in &meta.names {
                            snapshot.commands.insert(name.clone(), Arc::clone(hook));
                        }
                    }
                    HookMatcher::Event(events) => {
                        for event in events {
                            if event == "*" {
                                snapshot.wildcard.push(Arc::clone(hook));
                            } else {
                                snapshot
                                    .events
                                    .entry(event.clone())
                                    .or_default()
                                    .push(Arc::clone(hook));
                            }
                        }
                    }
                    HookMatcher::Regex(_) => snapshot.regexes.push(Arc::clone(hook)),
                }
            }
        }
        snapshot
    }

    /// Incremented by every scan that changed something.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn command(&self, name: &str) -> Option<&Arc<Hook>> {
        self.commands.get(&name.to_lowercase())
    }

    /// Registered command names starting with `prefix`, in order.
    pub fn commands_with_prefix(&self, prefix: &str) -> Vec<(&str, &Arc<Hook>)> {
        let prefix = prefix.to_lowercase();
        self.commands
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .map(|(name, hook)| (name.as_str(), hook))
            .collect()
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Hooks for `command`, then wildcard hooks. A hook listed under both
    /// appears once.
    pub fn event_hooks(&self, command: &str) -> Vec<&Arc<Hook>> {
        let mut hooks: Vec<&Arc<Hook>> = Vec::new();
        let specific = self.events.get(command).into_iter().flatten();
        for hook in specific.chain(&self.wildcard) {
            if !hooks.iter().any(|h| Arc::ptr_eq(h, hook)) {
                hooks.push(hook);
            }
        }
        hooks
    }

    pub fn regex_hooks(&self) -> &[Arc<Hook>] {
        &self.regexes
    }

    /// Loaded unit names in load order.
    pub fn units(&self) -> &[String] {
        &self.units
    }
}

// =============================================================================
// Scan bookkeeping
// =============================================================================

struct LoadedUnit {
    name: String,
    source: usize,
    stamp: Stamp,
    hooks: Vec<Arc<Hook>>,
}

impl LoadedUnit {
    fn stop(&self) {
        for hook in &self.hooks {
            hook.stop();
        }
    }
}

#[derive(Default)]
struct RegistryState {
    /// In first-load order; a reload keeps the unit's position.
    units: Vec<LoadedUnit>,
    /// Stamps of units whose last load failed, so they are not retried
    /// until they change.
    failed: HashMap<String, Stamp>,
    generation: u64,
}

/// What a scan changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub loaded: Vec<String>,
    pub reloaded: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
    /// `unit/hook` of individually rejected hooks.
    pub rejected: Vec<String>,
}

impl ScanReport {
    pub fn changed(&self) -> bool {
        !(self.loaded.is_empty() && self.reloaded.is_empty() && self.removed.is_empty())
    }
}

// =============================================================================
// PluginRegistry
// =============================================================================

/// Owns every loaded hook and worker.
pub struct PluginRegistry {
    sources: Vec<Arc<dyn PluginSource>>,
    disabled: HashSet<String>,
    state: Mutex<RegistryState>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            disabled: HashSet::new(),
            state: Mutex::new(RegistryState::default()),
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::default())),
        }
    }

    pub fn with_source(mut self, source: impl PluginSource) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn with_shared_source(mut self, source: Arc<dyn PluginSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Units that are never loaded.
    pub fn with_disabled<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled.extend(units.into_iter().map(Into::into));
        self
    }

    /// The current tables.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Loads new and changed units, unloads vanished ones, and publishes a
    /// new snapshot if anything changed.
    ///
    /// Must run inside a tokio runtime: serialized hooks spawn their workers
    /// here. Returns an error only when a core unit fails.
    pub fn scan(&self) -> RegistryResult<ScanReport> {
        let mut state = self.state.lock();
        let mut report = ScanReport::default();
        let mut listed: HashSet<String> = HashSet::new();
        let mut unlisted_sources: HashSet<usize> = HashSet::new();
        let mut pending: Vec<(usize, UnitStamp)> = Vec::new();

        for (index, source) in self.sources.iter().enumerate() {
            let entries = match source.list() {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Listing plugin units failed");
                    unlisted_sources.insert(index);
                    continue;
                }
            };

            for entry in entries {
                if self.disabled.contains(&entry.unit) {
                    debug!(unit = %entry.unit, "Plugin unit disabled");
                    continue;
                }
                if !listed.insert(entry.unit.clone()) {
                    warn!(
                        unit = %entry.unit,
                        source = source.name(),
                        "Unit name already provided by another source, ignoring"
                    );
                    continue;
                }
                pending.push((index, entry));
            }
        }

        // Vanished units release their command names before anything loads,
        // so a command moving between units is not seen as a duplicate.
        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut state.units)
            .into_iter()
            .partition(|u| listed.contains(&u.name) || unlisted_sources.contains(&u.source));
        for unit in removed {
            unit.stop();
            info!(unit = %unit.name, "Plugin unit removed");
            report.removed.push(unit.name);
        }
        state.units = kept;
        state.failed.retain(|name, _| listed.contains(name));

        for (index, entry) in pending {
            let source = self.sources[index].as_ref();
            let position = state.units.iter().position(|u| u.name == entry.unit);
            if let Some(i) = position
                && state.units[i].stamp == entry.stamp
            {
                continue;
            }
            if state.failed.get(&entry.unit) == Some(&entry.stamp) {
                continue;
            }

            match Self::load_unit(&state, index, source, &entry, &mut report) {
                Ok(unit) => {
                    state.failed.remove(&entry.unit);
                    info!(
                        unit = %unit.name,
                        source = source.name(),
                        hooks = unit.hooks.len(),
                        "Plugin unit loaded"
                    );
                    match position {
                        Some(i) => {
                            state.units[i].stop();
                            state.units[i] = unit;
                            report.reloaded.push(entry.unit);
                        }
                        None => {
                            state.units.push(unit);
                            report.loaded.push(entry.unit);
                        }
                    }
                }
                Err(e) if entry.core => {
                    return Err(RegistryError::CoreUnit {
                        unit: entry.unit,
                        source: e,
                    });
                }
                Err(e) => {
                    error!(
                        unit = %entry.unit,
                        source = source.name(),
                        error = %e,
                        "Failed to load plugin unit"
                    );
                    state.failed.insert(entry.unit.clone(), entry.stamp);
                    report.failed.push(entry.unit);
                }
            }
        }

        if report.changed() {
            state.generation += 1;
            let snapshot = RegistrySnapshot::build(state.generation, &state.units);
            info!(
                generation = snapshot.generation,
                units = snapshot.units.len(),
                commands = snapshot.commands.len(),
                "Registry snapshot published"
            );
            *self.snapshot.write() = Arc::new(snapshot);
        }
        Ok(report)
    }

    /// Stops every worker. Used at shutdown.
    pub fn stop_all(&self) {
        for unit in &self.state.lock().units {
            unit.stop();
        }
    }

    fn load_unit(
        state: &RegistryState,
        index: usize,
        source: &dyn PluginSource,
        entry: &UnitStamp,
        report: &mut ScanReport,
    ) -> Result<LoadedUnit, LoadError> {
        let defs = source.load(&entry.unit)?;

        let claimed: HashMap<&str, &str> = state
            .units
            .iter()
            .filter(|u| u.name != entry.unit)
            .flat_map(|u| {
                u.hooks.iter().filter_map(|h| h.command_meta()).flat_map(move |meta| {
                    meta.names.iter().map(move |n| (n.as_str(), u.name.as_str()))
                })
            })
            .collect();

        let mut own: HashSet<String> = HashSet::new();
        let mut hooks: Vec<Arc<Hook>> = Vec::new();
        let fail = |hooks: &[Arc<Hook>], e: LoadError| {
            for hook in hooks {
                hook.stop();
            }
            Err(e)
        };

        for def in defs {
            let hook_name = def.name().to_owned();
            let names = match def.trigger() {
                HookTrigger::Command(meta) => meta.names.clone(),
                _ => Vec::new(),
            };

            let clash = names.iter().find_map(|n| {
                if let Some(owner) = claimed.get(n.as_str()) {
                    Some((n.clone(), (*owner).to_owned()))
                } else {
                    own.contains(n).then(|| (n.clone(), entry.unit.clone()))
                }
            });

            let compiled = match clash {
                Some((command, owner)) => Err(LoadError::DuplicateCommand { command, owner }),
                None => Hook::compile(&entry.unit, entry.core, def),
            };

            match compiled {
                Ok(hook) => {
                    own.extend(names);
                    hooks.push(Arc::new(hook));
                }
                Err(e) if entry.core => return fail(&hooks, e),
                Err(e) => {
                    warn!(unit = %entry.unit, hook = %hook_name, error = %e, "Hook rejected");
                    report.rejected.push(format!("{}/{}", entry.unit, hook_name));
                }
            }
        }

        Ok(LoadedUnit {
            name: entry.unit.clone(),
            source: index,
            stamp: entry.stamp,
            hooks,
        })
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("disabled", &self.disabled)
            .field("generation", &self.snapshot.read().generation)
            .finish()
    }
}
