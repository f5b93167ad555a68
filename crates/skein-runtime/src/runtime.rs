//! Runtime orchestration: config, logging, plugins and one task per
//! connection.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use skein_runtime::SkeinRuntime;
//!
//! // Searches skein.toml in the current and user config directories
//! let runtime = SkeinRuntime::builder().plugin(ECHO).build()?;
//! runtime.run().await?;
//!
//! // Explicit file and profile
//! let runtime = SkeinRuntime::builder()
//!     .config_file("config/skein.toml")
//!     .profile("production")
//!     .build()?;
//! ```
//!
//! ```text
//!                       ┌─▶ scan loop (all sources)
//! SkeinRuntime::run ────┼─▶ Connection "libera" ─▶ DispatchEngine ─┐
//!    initial scan       └─▶ Connection "oftc"   ─▶ DispatchEngine ─┴─▶ PluginRegistry
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use skein_framework::{
    DispatchEngine, HandlerCatalog, ManifestSource, MemoryStore, PluginDescriptor, PluginRegistry,
    PluginSource, SharedSieve, SharedStore, StaticSource, Store, builtin_sieves,
};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::builtin::CORE;
use crate::config::{ConfigLoader, SkeinConfig, validate_config};
use crate::connection::Connection;
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// How long connections get to flush their QUIT on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The skein runtime.
///
/// Owns the plugin registry and spawns a [`Connection`] for every configured
/// network. Everything stops through one [`CancellationToken`].
pub struct SkeinRuntime {
    config: SkeinConfig,
    registry: Arc<PluginRegistry>,
    store: SharedStore,
    sieves: Vec<SharedSieve>,
    shutdown: CancellationToken,
}

impl SkeinRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration with only the
    /// core unit.
    pub fn from_config(config: SkeinConfig) -> RuntimeResult<Self> {
        RuntimeBuilder::new().config(config).build()
    }

    pub fn config(&self) -> &SkeinConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Cancelling this token stops the runtime as if a signal arrived.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("skein is running. Press Ctrl+C to stop.");
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes, the shutdown token is cancelled, or
    /// every connection has given up.
    ///
    /// Fails before connecting when a core unit does not load or a
    /// connection's sieve table is invalid.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let report = self.registry.scan()?;
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            rejected = report.rejected.len(),
            "Plugins loaded"
        );

        let engines = self.engines()?;
        let mut tasks = JoinSet::new();

        // Every source is polled, not only the manifest directory.
        tasks.spawn(scan_loop(
            Arc::clone(&self.registry),
            self.config.plugins.scan_interval(),
            self.shutdown.clone(),
        ));

        for (config, engine) in self.config.connections.iter().zip(engines) {
            let connection = Connection::new(config.clone(), engine);
            let token = self.shutdown.child_token();
            tasks.spawn(async move {
                let name = connection.name().to_owned();
                if let Err(e) = connection.run(token).await {
                    error!(connection = %name, error = %e, "Connection stopped");
                    return Some(e);
                }
                None
            });
        }

        let mut failures = Vec::new();
        let mut abandoned = false;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = self.shutdown.cancelled() => break,
                joined = tasks.join_next() => match joined {
                    Some(Ok(Some(e))) => failures.push(e),
                    Some(Ok(None)) => {}
                    Some(Err(e)) => error!(error = %e, "Runtime task panicked"),
                    None => {
                        abandoned = true;
                        break;
                    }
                },
            }
            // Only the scan loop is left.
            if tasks.len() == 1 {
                warn!("No connections left, stopping");
                abandoned = true;
                break;
            }
        }

        self.shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_err()
        {
            warn!("Connections did not stop in time, aborting");
            tasks.abort_all();
        }
        self.registry.stop_all();
        info!("Runtime stopped");

        // Every connection gave up on its own.
        match failures.into_iter().next() {
            Some(e) if abandoned => Err(e),
            _ => Ok(()),
        }
    }

    /// One engine per connection, each with its own sieve chain.
    fn engines(&self) -> RuntimeResult<Vec<Arc<DispatchEngine>>> {
        let settings: Arc<HashMap<String, Arc<Value>>> = Arc::new(
            self.config
                .plugins
                .settings
                .iter()
                .map(|(unit, value)| (unit.clone(), Arc::new(value.clone())))
                .collect(),
        );

        self.config
            .connections
            .iter()
            .map(|config| {
                let mut sieves =
                    builtin_sieves(&config.sieve).map_err(|source| RuntimeError::Sieve {
                        connection: config.name.clone(),
                        source,
                    })?;
                sieves.extend(self.sieves.iter().cloned());
                debug!(connection = %config.name, sieves = sieves.len(), "Engine ready");
                Ok(Arc::new(
                    DispatchEngine::new(Arc::clone(&self.registry))
                        .with_sieves(sieves)
                        .with_store(Arc::clone(&self.store))
                        .with_settings(Arc::clone(&settings)),
                ))
            })
            .collect()
    }
}

/// Rescans plugin sources until cancelled.
async fn scan_loop(
    registry: Arc<PluginRegistry>,
    every: Duration,
    shutdown: CancellationToken,
) -> Option<RuntimeError> {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return None,
            _ = interval.tick() => {}
        }
        match registry.scan() {
            Ok(report) if report.changed() => info!(
                loaded = ?report.loaded,
                reloaded = ?report.reloaded,
                removed = ?report.removed,
                failed = ?report.failed,
                "Plugins rescanned"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Plugin rescan failed"),
        }
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`SkeinRuntime`].
///
/// ```rust,ignore
/// let runtime = SkeinRuntime::builder()
///     .config_file("skein.toml")
///     .plugin(ECHO)
///     .catalog(HandlerCatalog::new().with("echo", echo))
///     .store(JsonFileStore::open("skein-data.json")?)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<SkeinConfig>,
    plugins: StaticSource,
    sources: Vec<Arc<dyn PluginSource>>,
    catalog: HandlerCatalog,
    store: Option<SharedStore>,
    sieves: Vec<SharedSieve>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir().with_user_config_dir(),
            config: None,
            plugins: StaticSource::new([CORE]),
            sources: Vec::new(),
            catalog: HandlerCatalog::new(),
            store: None,
            sieves: Vec::new(),
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration above files and environment.
    pub fn merge(mut self, config: SkeinConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses this configuration as is, skipping files and environment.
    pub fn config(mut self, config: SkeinConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a compiled-in plugin unit.
    pub fn plugin(mut self, plugin: PluginDescriptor) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Adds another plugin source.
    pub fn source(mut self, source: impl PluginSource) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Handlers that manifests in `plugins.dir` can bind to.
    pub fn catalog(mut self, catalog: HandlerCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replaces the in-memory store.
    pub fn store(mut self, store: impl Store) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Appends a sieve after the built-in ones.
    pub fn sieve(mut self, sieve: SharedSieve) -> Self {
        self.sieves.push(sieve);
        self
    }

    /// Loads and validates configuration, initializes logging and sets up
    /// the plugin registry. Nothing connects until [`SkeinRuntime::run`].
    pub fn build(self) -> RuntimeResult<SkeinRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        let mut registry = PluginRegistry::new()
            .with_source(self.plugins)
            .with_disabled(config.plugins.disabled.iter().cloned());
        for source in self.sources {
            registry = registry.with_shared_source(source);
        }
        if let Some(dir) = &config.plugins.dir {
            info!(dir = %dir.display(), "Watching plugin manifests");
            registry = registry.with_source(ManifestSource::new(dir.clone(), self.catalog));
        }

        info!(
            connections = config.connections.len(),
            log_level = %config.logging.level,
            "Runtime initialized"
        );

        Ok(SkeinRuntime {
            config,
            registry: Arc::new(registry),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            sieves: self.sieves,
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use std::sync::atomic::{AtomicU64, Ordering};

    use skein_framework::plugin::{Stamp, UnitStamp};
    use skein_framework::{HookDef, LoadError, command};

    use super::*;
    use crate::config::ConnectionConfig;

    fn config(port: u16) -> SkeinConfig {
        let mut conn = ConnectionConfig::new("local", "127.0.0.1", "skein");
        conn.port = port;
        conn.channels = vec!["#home".into()];
        SkeinConfig {
            connections: vec![conn],
            ..Default::default()
        }
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let result = SkeinRuntime::from_config(SkeinConfig::default());
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[tokio::test]
    async fn test_gives_up_with_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = config(listener.local_addr().unwrap().port());
        drop(listener);
        config.connections[0].reconnect.max_retries = Some(0);

        let runtime = SkeinRuntime::from_config(config).unwrap();
        let result = timeout(Duration::from_secs(5), runtime.run_until(std::future::pending()))
            .await
            .unwrap();
        assert!(matches!(result, Err(RuntimeError::ReconnectExhausted { attempts: 0, .. })));
    }

    /// One unit whose stamp moves when `version` does.
    struct Growing {
        version: Arc<AtomicU64>,
    }

    impl PluginSource for Growing {
        fn name(&self) -> &str {
            "growing"
        }

        fn list(&self) -> Result<Vec<UnitStamp>, LoadError> {
            Ok(vec![UnitStamp {
                unit: "growing".into(),
                stamp: Stamp {
                    modified: None,
                    len: self.version.load(Ordering::SeqCst),
                },
                core: false,
            }])
        }

        fn load(&self, _unit: &str) -> Result<Vec<HookDef>, LoadError> {
            async fn noop() {}
            Ok(match self.version.load(Ordering::SeqCst) {
                0 => Vec::new(),
                _ => vec![command("later").handler(noop)],
            })
        }
    }

    #[tokio::test]
    async fn test_added_sources_are_rescanned() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = config(listener.local_addr().unwrap().port());
        config.plugins.scan_interval_secs = 1;
        let version = Arc::new(AtomicU64::new(0));
        let runtime = SkeinRuntime::builder()
            .config(config)
            .source(Growing {
                version: Arc::clone(&version),
            })
            .build()
            .unwrap();
        let registry = Arc::clone(runtime.registry());
        let token = runtime.shutdown_token();

        let run = tokio::spawn(async move { runtime.run_until(std::future::pending()).await });
        let (_socket, _) = timeout(Duration::from_secs(5), listener.accept())
            .await
            .unwrap()
            .unwrap();
        assert!(registry.snapshot().command("later").is_none());

        version.store(1, Ordering::SeqCst);
        timeout(Duration::from_secs(5), async {
            while registry.snapshot().command("later").is_none() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap();

        token.cancel();
        timeout(Duration::from_secs(10), run).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_connects_joins_and_quits() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let runtime = SkeinRuntime::from_config(config(port)).unwrap();
        let token = runtime.shutdown_token();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            let mut seen = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                if line.starts_with("USER") {
                    write
                        .write_all(b":srv 001 skein :Welcome\r\n:srv 004 skein srv ircd-1 io bklmnopst\r\n")
                        .await
                        .unwrap();
                }
                let joined = line == "JOIN #home";
                seen.push(line);
                if joined {
                    token.cancel();
                }
            }
            seen
        });

        timeout(Duration::from_secs(10), runtime.run_until(std::future::pending()))
            .await
            .unwrap()
            .unwrap();

        let seen = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert_eq!(&seen[..2], ["NICK skein", "USER skein 3 * :skein"]);
        assert!(seen.contains(&"JOIN #home".to_owned()));
        assert!(seen.last().unwrap().starts_with("QUIT"));
    }
}
