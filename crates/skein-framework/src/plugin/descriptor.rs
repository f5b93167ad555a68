//! Static plugin descriptors.

use crate::hook::HookDef;

/// Static metadata of a compiled-in plugin.
#[derive(Debug, Clone, Copy)]
pub struct PluginMetadata {
    pub version: &'static str,
    pub desc: &'static str,
    /// Long description, taken from the doc comment when not given.
    pub full_desc: Option<&'static str>,
}

/// The static, `Copy` handle to a compiled-in plugin unit.
///
/// Create one with [`define_plugin!`](crate::define_plugin) and hand it to a
/// [`StaticSource`](super::StaticSource).
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    /// Unit name, used in logs, ACLs and the disabled list.
    pub name: &'static str,

    /// A core unit aborts startup when it fails to load.
    pub core: bool,

    /// Produces the unit's hook declarations.
    pub create: fn() -> Vec<HookDef>,

    pub metadata: PluginMetadata,
}

impl PluginDescriptor {
    pub fn hooks(&self) -> Vec<HookDef> {
        (self.create)()
    }
}
