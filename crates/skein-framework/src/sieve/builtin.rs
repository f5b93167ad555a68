//! Sieves every connection gets, configured from its `sieve` table.
//!
//! ```toml
//! [connections.sieve]
//! ignore = ["*!*@spam.example"]
//! disabled_commands = ["roulette"]
//! disabled_plugins = ["trivia"]
//!
//! [connections.sieve.acls."#quiet"]
//! deny = ["youtube"]
//!
//! [connections.sieve.permissions.admins]
//! perms = ["botcontrol"]
//! users = ["*!*@admin.example"]
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{MaskSet, SharedSieve, Sieve};
use crate::context::HookContext;
use crate::error::SieveError;
use crate::hook::{Hook, HookKind};

// =============================================================================
// Configuration
// =============================================================================

/// Per-connection sieve settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SieveConfig {
    /// Sender masks whose messages trigger nothing.
    pub ignore: Vec<String>,
    /// Command names (any alias) that never run.
    pub disabled_commands: Vec<String>,
    /// Units whose hooks never run on this connection.
    pub disabled_plugins: Vec<String>,
    /// Channel name → unit allow/deny lists.
    pub acls: HashMap<String, AclRule>,
    /// Group name → granted permissions and member masks.
    pub permissions: HashMap<String, PermissionGroup>,
}

/// Which units may run in one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclRule {
    /// When set, only these units run.
    pub allow: Option<Vec<String>>,
    /// These units never run.
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionGroup {
    pub perms: Vec<String>,
    pub users: Vec<String>,
}

/// Builds the built-in chain in its fixed order: ignore, disabled, ACL,
/// permissions. Empty sections contribute no sieve, except permissions:
/// with no groups configured, every permission-gated command is refused.
pub fn builtin_sieves(config: &SieveConfig) -> Result<Vec<SharedSieve>, SieveError> {
    let mut sieves: Vec<SharedSieve> = Vec::new();
    if !config.ignore.is_empty() {
        sieves.push(Arc::new(IgnoreSieve::new(&config.ignore)?));
    }
    if !config.disabled_commands.is_empty() || !config.disabled_plugins.is_empty() {
        sieves.push(Arc::new(DisabledSieve::new(
            &config.disabled_commands,
            &config.disabled_plugins,
        )));
    }
    if !config.acls.is_empty() {
        sieves.push(Arc::new(AclSieve::new(config.acls.clone())));
    }
    sieves.push(Arc::new(PermissionSieve::new(&config.permissions)?));
    Ok(sieves)
}

// =============================================================================
// Sieves
// =============================================================================

/// Drops everything sent by ignored masks.
#[derive(Debug)]
pub struct IgnoreSieve {
    masks: MaskSet,
}

impl IgnoreSieve {
    pub fn new<S: AsRef<str>>(masks: &[S]) -> Result<Self, SieveError> {
        Ok(Self {
            masks: MaskSet::new(masks)?,
        })
    }
}

impl Sieve for IgnoreSieve {
    fn name(&self) -> &str {
        "ignore"
    }

    fn sieve(&self, ctx: HookContext, _hook: &Hook) -> Result<Option<HookContext>, SieveError> {
        let message = ctx.message();
        if message.prefix.is_empty() || !self.masks.matches(&message.mask()) {
            Ok(Some(ctx))
        } else {
            Ok(None)
        }
    }
}

/// Drops disabled commands and hooks of disabled units.
///
/// Core units are never disabled this way.
#[derive(Debug)]
pub struct DisabledSieve {
    commands: HashSet<String>,
    units: HashSet<String>,
}

impl DisabledSieve {
    pub fn new<S: AsRef<str>>(commands: &[S], units: &[S]) -> Self {
        Self {
            commands: commands.iter().map(|c| c.as_ref().to_lowercase()).collect(),
            units: units.iter().map(|u| u.as_ref().to_owned()).collect(),
        }
    }
}

impl Sieve for DisabledSieve {
    fn name(&self) -> &str {
        "disabled"
    }

    fn sieve(&self, ctx: HookContext, hook: &Hook) -> Result<Option<HookContext>, SieveError> {
        if let Some(meta) = hook.command_meta()
            && meta.names.iter().any(|n| self.commands.contains(n))
        {
            return Ok(None);
        }
        if !hook.info().core && self.units.contains(&*hook.info().unit) {
            return Ok(None);
        }
        Ok(Some(ctx))
    }
}

/// Per-channel unit allow and deny lists.
#[derive(Debug)]
pub struct AclSieve {
    rules: HashMap<String, AclRule>,
}

impl AclSieve {
    pub fn new(rules: HashMap<String, AclRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(chan, rule)| (chan.to_lowercase(), rule))
            .collect();
        Self { rules }
    }
}

impl Sieve for AclSieve {
    fn name(&self) -> &str {
        "acl"
    }

    fn sieve(&self, ctx: HookContext, hook: &Hook) -> Result<Option<HookContext>, SieveError> {
        let info = hook.info();
        if info.core {
            return Ok(Some(ctx));
        }
        let Some(rule) = self.rules.get(&ctx.chan().to_lowercase()) else {
            return Ok(Some(ctx));
        };
        let unit = &*info.unit;
        if rule.deny.iter().any(|u| u == unit) {
            return Ok(None);
        }
        if let Some(allow) = &rule.allow
            && !allow.iter().any(|u| u == unit)
        {
            return Ok(None);
        }
        Ok(Some(ctx))
    }
}

/// Gates commands that declare permissions.
#[derive(Debug)]
pub struct PermissionSieve {
    /// Permission → masks holding it.
    grants: HashMap<String, MaskSet>,
}

impl PermissionSieve {
    pub fn new(groups: &HashMap<String, PermissionGroup>) -> Result<Self, SieveError> {
        let mut users_by_perm: HashMap<String, Vec<String>> = HashMap::new();
        for group in groups.values() {
            for perm in &group.perms {
                users_by_perm
                    .entry(perm.clone())
                    .or_default()
                    .extend(group.users.iter().cloned());
            }
        }
        let grants = users_by_perm
            .into_iter()
            .map(|(perm, users)| Ok((perm, MaskSet::new(users)?)))
            .collect::<Result<_, SieveError>>()?;
        Ok(Self { grants })
    }

    fn allows(&self, perm: &str, mask: &str) -> bool {
        self.grants.get(perm).is_some_and(|masks| masks.matches(mask))
    }
}

impl Sieve for PermissionSieve {
    fn name(&self) -> &str {
        "permissions"
    }

    fn sieve(&self, ctx: HookContext, hook: &Hook) -> Result<Option<HookContext>, SieveError> {
        if hook.kind() != HookKind::Command {
            return Ok(Some(ctx));
        }
        let Some(meta) = hook.command_meta() else {
            return Ok(Some(ctx));
        };
        if meta.permissions.is_empty() {
            return Ok(Some(ctx));
        }
        let mask = ctx.message().mask();
        if meta.permissions.iter().any(|p| self.allows(p, &mask)) {
            Ok(Some(ctx))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HookInput;
    use crate::context::tests::context;
    use crate::hook::{command, event};
    use crate::sieve::run_sieves;

    async fn noop() {}

    fn ctx(line: &str) -> HookContext {
        context(line, HookKind::Command, HookInput::Text(String::new())).0
    }

    fn passes(sieves: &[SharedSieve], line: &str, hook: &Hook) -> bool {
        run_sieves(sieves, ctx(line), hook).is_some()
    }

    #[tokio::test]
    async fn test_ignore() {
        let config = SieveConfig {
            ignore: vec!["*!*@spam.example".into()],
            ..Default::default()
        };
        let sieves = builtin_sieves(&config).unwrap();
        let hook = Hook::compile("u", false, command("x").handler(noop)).unwrap();

        assert!(!passes(&sieves, ":bob!b@spam.example PRIVMSG #c :.x", &hook));
        assert!(passes(&sieves, ":bob!b@ok.example PRIVMSG #c :.x", &hook));
    }

    #[tokio::test]
    async fn test_disabled_commands_and_units() {
        let config = SieveConfig {
            disabled_commands: vec!["Roulette".into()],
            disabled_plugins: vec!["games".into(), "core".into()],
            ..Default::default()
        };
        let sieves = builtin_sieves(&config).unwrap();
        let line = ":bob!b@h PRIVMSG #c :.x";

        let roulette = Hook::compile("misc", false, command("roulette").handler(noop)).unwrap();
        let trivia = Hook::compile("games", false, command("trivia").handler(noop)).unwrap();
        let core = Hook::compile("core", true, event(["004"]).handler(noop)).unwrap();
        let other = Hook::compile("misc", false, command("ping").handler(noop)).unwrap();

        assert!(!passes(&sieves, line, &roulette));
        assert!(!passes(&sieves, line, &trivia));
        assert!(passes(&sieves, line, &core));
        assert!(passes(&sieves, line, &other));
    }

    #[tokio::test]
    async fn test_acl() {
        let mut acls = HashMap::new();
        acls.insert(
            "#Quiet".to_owned(),
            AclRule {
                allow: Some(vec!["help".into()]),
                deny: vec![],
            },
        );
        acls.insert(
            "#busy".to_owned(),
            AclRule {
                allow: None,
                deny: vec!["youtube".into()],
            },
        );
        let sieves = builtin_sieves(&SieveConfig {
            acls,
            ..Default::default()
        })
        .unwrap();

        let help = Hook::compile("help", false, command("help").handler(noop)).unwrap();
        let youtube = Hook::compile("youtube", false, command("yt").handler(noop)).unwrap();

        assert!(passes(&sieves, ":a!b@c PRIVMSG #quiet :.help", &help));
        assert!(!passes(&sieves, ":a!b@c PRIVMSG #quiet :.yt", &youtube));
        assert!(!passes(&sieves, ":a!b@c PRIVMSG #busy :.yt", &youtube));
        assert!(passes(&sieves, ":a!b@c PRIVMSG #other :.yt", &youtube));
    }

    #[tokio::test]
    async fn test_permissions() {
        let mut permissions = HashMap::new();
        permissions.insert(
            "admins".to_owned(),
            PermissionGroup {
                perms: vec!["botcontrol".into()],
                users: vec!["*!*@admin.example".into()],
            },
        );
        let sieves = builtin_sieves(&SieveConfig {
            permissions,
            ..Default::default()
        })
        .unwrap();

        let join = Hook::compile(
            "admin",
            false,
            command("join").permissions(["botcontrol"]).handler(noop),
        )
        .unwrap();
        let open = Hook::compile("misc", false, command("ping").handler(noop)).unwrap();

        assert!(passes(&sieves, ":root!r@admin.example PRIVMSG #c :.join #x", &join));
        assert!(!passes(&sieves, ":eve!e@evil.example PRIVMSG #c :.join #x", &join));
        assert!(passes(&sieves, ":eve!e@evil.example PRIVMSG #c :.ping", &open));
    }

    #[tokio::test]
    async fn test_gated_command_refused_without_groups() {
        let sieves = builtin_sieves(&SieveConfig::default()).unwrap();
        assert_eq!(sieves.len(), 1);

        let raw = Hook::compile(
            "admin",
            false,
            command("raw").permissions(["botcontrol"]).handler(noop),
        )
        .unwrap();
        let open = Hook::compile("misc", false, command("ping").handler(noop)).unwrap();

        assert!(!passes(&sieves, ":eve!e@evil.example PRIVMSG #c :.raw QUIT", &raw));
        assert!(passes(&sieves, ":eve!e@evil.example PRIVMSG #c :.ping", &open));
    }
}
