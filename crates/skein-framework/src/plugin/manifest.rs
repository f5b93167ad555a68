//! Plugin units described by TOML manifests on disk.
//!
//! Each `*.toml` file in the plugin directory is one unit, named after the
//! file stem. A manifest binds hook triggers to handlers compiled into the
//! binary and registered in a [`HandlerCatalog`]:
//!
//! ```toml
//! # plugins/weather.toml
//! [[hook]]
//! kind = "command"
//! name = "weather"
//! aliases = ["w"]
//! doc = "<location> -- current conditions"
//! autohelp = true
//! handler = "weather"
//!
//! [[hook]]
//! kind = "regex"
//! pattern = "(?i)\\bforecast for (\\w+)"
//! handler = "forecast"
//! serialized = true
//! ```
//!
//! Editing a manifest changes its modification time, so the next scan
//! reloads the unit; deleting it unloads the unit.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::source::{PluginSource, Stamp, UnitStamp};
use crate::error::LoadError;
use crate::handler::{BoxedHookService, FromCtxFn, HandlerResponse, HandlerService};
use crate::hook::{HookBuilder, HookDef, command, event, regex};

// =============================================================================
// HandlerCatalog
// =============================================================================

/// Named handlers that manifests can refer to.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: HashMap<String, BoxedHookService>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, R, T>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: FromCtxFn<R, T>,
        R: HandlerResponse,
        T: 'static,
    {
        self.handlers.insert(
            name.into(),
            BoxedHookService::new(HandlerService::new(handler)),
        );
        self
    }

    pub fn with<F, R, T>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: FromCtxFn<R, T>,
        R: HandlerResponse,
        T: 'static,
    {
        self.register(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&BoxedHookService> {
        self.handlers.get(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerCatalog").field("handlers", &names).finish()
    }
}

// =============================================================================
// Manifest format
// =============================================================================

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "hook")]
    hooks: Vec<HookSpec>,
}

#[derive(Debug, Deserialize)]
struct HookSpec {
    #[serde(flatten)]
    trigger: TriggerSpec,
    handler: String,
    /// Overrides the hook name.
    label: Option<String>,
    #[serde(default)]
    serialized: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum TriggerSpec {
    Command {
        name: String,
        #[serde(default)]
        aliases: Vec<String>,
        doc: Option<String>,
        #[serde(default)]
        autohelp: bool,
        #[serde(default)]
        permissions: Vec<String>,
    },
    Event {
        events: Vec<String>,
    },
    Regex {
        pattern: String,
    },
}

impl HookSpec {
    fn into_def(self, unit: &str, catalog: &HandlerCatalog) -> Result<HookDef, LoadError> {
        let service = catalog
            .get(&self.handler)
            .cloned()
            .ok_or_else(|| LoadError::UnknownHandler {
                unit: unit.to_owned(),
                handler: self.handler.clone(),
            })?;

        let mut builder: HookBuilder = match self.trigger {
            TriggerSpec::Command {
                name,
                aliases,
                doc,
                autohelp,
                permissions,
            } => {
                let mut builder = aliases
                    .into_iter()
                    .fold(command(name), |builder, alias| builder.alias(alias))
                    .autohelp(autohelp)
                    .permissions(permissions);
                if let Some(doc) = doc {
                    builder = builder.doc(doc);
                }
                builder
            }
            TriggerSpec::Event { events } => event(events),
            TriggerSpec::Regex { pattern } => regex(pattern),
        };
        if let Some(label) = self.label {
            builder = builder.name(label);
        }
        if self.serialized {
            builder = builder.serialized();
        }
        Ok(builder.service(service))
    }
}

// =============================================================================
// ManifestSource
// =============================================================================

/// A directory of unit manifests.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    dir: PathBuf,
    catalog: Arc<HandlerCatalog>,
}

impl ManifestSource {
    pub fn new(dir: impl Into<PathBuf>, catalog: HandlerCatalog) -> Self {
        Self {
            dir: dir.into(),
            catalog: Arc::new(catalog),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, unit: &str) -> PathBuf {
        self.dir.join(format!("{unit}.toml"))
    }
}

impl PluginSource for ManifestSource {
    fn name(&self) -> &str {
        "manifest"
    }

    fn list(&self) -> Result<Vec<UnitStamp>, LoadError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "Plugin directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(LoadError::io(&self.dir, e)),
        };

        let mut units = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LoadError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Some(unit) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let meta = entry.metadata().map_err(|e| LoadError::io(&path, e))?;
            if !meta.is_file() {
                continue;
            }
            units.push(UnitStamp {
                unit: unit.to_owned(),
                stamp: Stamp {
                    modified: meta.modified().ok(),
                    len: meta.len(),
                },
                core: false,
            });
        }
        units.sort_by(|a, b| a.unit.cmp(&b.unit));
        Ok(units)
    }

    fn load(&self, unit: &str) -> Result<Vec<HookDef>, LoadError> {
        let path = self.path_of(unit);
        let text = fs::read_to_string(&path).map_err(|e| LoadError::io(&path, e))?;
        let manifest: Manifest =
            toml::from_str(&text).map_err(|e| LoadError::manifest(&path, e))?;
        manifest
            .hooks
            .into_iter()
            .map(|spec| spec.into_def(unit, &self.catalog))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{HookKind, HookTrigger};

    async fn weather() -> &'static str {
        "sunny"
    }

    async fn greet() {}

    fn catalog() -> HandlerCatalog {
        HandlerCatalog::new()
            .with("weather", weather)
            .with("greet", greet)
    }

    const WEATHER: &str = r#"
[[hook]]
kind = "command"
name = "Weather"
aliases = ["w"]
doc = "<location> -- current conditions"
autohelp = true
handler = "weather"

[[hook]]
kind = "event"
events = ["join"]
handler = "greet"
label = "welcome"

[[hook]]
kind = "regex"
pattern = "forecast (\\w+)"
handler = "weather"
serialized = true
"#;

    #[test]
    fn test_list_and_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("weather.toml"), WEATHER).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = ManifestSource::new(dir.path(), catalog());
        let units = source.list().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit, "weather");
        assert!(!units[0].core);

        let defs = source.load("weather").unwrap();
        assert_eq!(defs.len(), 3);
        let HookTrigger::Command(meta) = defs[0].trigger() else {
            panic!("expected command");
        };
        assert_eq!(meta.names, vec!["weather", "w"]);
        assert!(meta.autohelp);
        assert_eq!(defs[1].name(), "welcome");
        assert_eq!(defs[1].kind(), HookKind::Event);
        assert!(defs[2].is_serialized());
    }

    #[test]
    fn test_unknown_handler_rejects_unit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bad.toml"),
            "[[hook]]\nkind = \"event\"\nevents = [\"JOIN\"]\nhandler = \"missing\"\n",
        )
        .unwrap();

        let source = ManifestSource::new(dir.path(), catalog());
        assert!(matches!(
            source.load("bad"),
            Err(LoadError::UnknownHandler { handler, .. }) if handler == "missing"
        ));
    }

    #[test]
    fn test_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.toml"), "[[hook]\nkind = ").unwrap();
        let source = ManifestSource::new(dir.path(), catalog());
        assert!(matches!(source.load("broken"), Err(LoadError::Manifest { .. })));
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = ManifestSource::new(dir.path().join("absent"), catalog());
        assert!(source.list().unwrap().is_empty());
        assert!(matches!(source.load("x"), Err(LoadError::Io { .. })));
    }
}
