//! Where plugin units come from.
//!
//! The registry polls every [`PluginSource`] on each scan: [`list`] reports
//! the units currently available with a change stamp, and [`load`] produces
//! the hook declarations of one unit. A unit is (re)loaded whenever its stamp
//! differs from the one seen on the previous scan, and unloaded when it is no
//! longer listed.
//!
//! [`list`]: PluginSource::list
//! [`load`]: PluginSource::load

use std::time::SystemTime;

use crate::error::LoadError;
use crate::hook::HookDef;
use crate::plugin::PluginDescriptor;

/// Change detector for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl Stamp {
    /// Stamp of a unit that never changes.
    pub const FIXED: Stamp = Stamp {
        modified: None,
        len: 0,
    };
}

/// One unit as listed by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStamp {
    pub unit: String,
    pub stamp: Stamp,
    pub core: bool,
}

/// A provider of plugin units.
pub trait PluginSource: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Units currently available.
    fn list(&self) -> Result<Vec<UnitStamp>, LoadError>;

    /// Hook declarations of `unit`.
    fn load(&self, unit: &str) -> Result<Vec<HookDef>, LoadError>;
}

/// Compiled-in units. Each loads once.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    plugins: Vec<PluginDescriptor>,
}

impl StaticSource {
    pub fn new<I>(plugins: I) -> Self
    where
        I: IntoIterator<Item = PluginDescriptor>,
    {
        Self {
            plugins: plugins.into_iter().collect(),
        }
    }

    pub fn with(mut self, plugin: PluginDescriptor) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn push(&mut self, plugin: PluginDescriptor) {
        self.plugins.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl PluginSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn list(&self) -> Result<Vec<UnitStamp>, LoadError> {
        Ok(self
            .plugins
            .iter()
            .map(|p| UnitStamp {
                unit: p.name.to_owned(),
                stamp: Stamp::FIXED,
                core: p.core,
            })
            .collect())
    }

    fn load(&self, unit: &str) -> Result<Vec<HookDef>, LoadError> {
        self.plugins
            .iter()
            .find(|p| p.name == unit)
            .map(PluginDescriptor::hooks)
            .ok_or_else(|| LoadError::UnknownUnit {
                unit: unit.to_owned(),
            })
    }
}
