use serde::de::DeserializeOwned;

use crate::context::HookContext;
use crate::error::ExtractResult;
use crate::extractor::FromContext;

/// Extractor that deserializes the unit's `plugins.settings.<unit>` table.
///
/// If the table is absent or does not fit `T`, `T::default()` is used.
///
/// ```rust,ignore
/// #[derive(serde::Deserialize, Default)]
/// struct WeatherSettings { api_key: String }
///
/// async fn weather(Input(loc): Input, cfg: PluginConfig<WeatherSettings>) -> String { ... }
/// ```
pub struct PluginConfig<T>(pub T);

impl<T> std::ops::Deref for PluginConfig<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned + Default> FromContext for PluginConfig<T> {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        let t = ctx
            .settings()
            .and_then(|json| serde_json::from_value(json.clone()).ok())
            .unwrap_or_default();
        Ok(PluginConfig(t))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::Deserialize;

    use super::*;
    use crate::context::HookInput;
    use crate::context::tests::context;
    use crate::hook::HookKind;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Settings {
        greeting: String,
        limit: u32,
    }

    #[test]
    fn test_settings_present_and_absent() {
        let (ctx, _rx) = context(":a!b@c JOIN #x", HookKind::Event, HookInput::Params(vec![]));
        assert_eq!(PluginConfig::<Settings>::from_context(&ctx).unwrap().0, Settings::default());

        let ctx = ctx.with_settings(Some(Arc::new(serde_json::json!({ "greeting": "hi" }))));
        let cfg = PluginConfig::<Settings>::from_context(&ctx).unwrap();
        assert_eq!(cfg.greeting, "hi");
        assert_eq!(cfg.limit, 0);
    }
}
