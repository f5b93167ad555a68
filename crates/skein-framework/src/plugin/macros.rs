// ─── Internal helper: PluginMetadata builder ──────────────────────────────────
//
// Used exclusively by `define_plugin!`.  Not part of the public API.

/// Internal helper macro: builds a [`PluginMetadata`] from optional overrides.
///
/// ```text
/// __plugin_metadata!(@parse [$doc?] key: val, …)
/// ```
///
/// [`PluginMetadata`]: crate::plugin::PluginMetadata
#[macro_export]
#[doc(hidden)]
macro_rules! __plugin_metadata {
    (@parse [$($doc:expr)?] $($meta:tt)*) => {
        $crate::__plugin_metadata!(@pm [$($doc)?] [] [] [] [$($meta)*])
    };

    // Remaining tokens ride in a trailing group so `$rest` always ends at `]`.
    (@pm $doc:tt $ver:tt $dsc:tt $fd:tt [ , $($rest:tt)* ]) => {
        $crate::__plugin_metadata!(@pm $doc $ver $dsc $fd [$($rest)*])
    };

    (@pm $doc:tt [$($old:expr)?] $dsc:tt $fd:tt [ version : $v:literal $($rest:tt)* ]) => {
        $crate::__plugin_metadata!(@pm $doc [$v] $dsc $fd [$($rest)*])
    };

    (@pm $doc:tt $ver:tt [$($old:expr)?] $fd:tt [ desc : $v:literal $($rest:tt)* ]) => {
        $crate::__plugin_metadata!(@pm $doc $ver [$v] $fd [$($rest)*])
    };

    (@pm $doc:tt $ver:tt $dsc:tt [$($old:expr)?] [ full_desc : $v:literal $($rest:tt)* ]) => {
        $crate::__plugin_metadata!(@pm $doc $ver $dsc [$v] [$($rest)*])
    };

    // End of tokens → emit
    (@pm [$($doc:expr)?] [$($ver:expr)?] [$($dsc:expr)?] [$($fd:expr)?] []) => {
        $crate::plugin::PluginMetadata {
            version:   $crate::__plugin_metadata!(@get_ver [$($ver)?]),
            desc:      $crate::__plugin_metadata!(@get_dsc [$($dsc)?]),
            full_desc: $crate::__plugin_metadata!(@get_fd [$($fd)?] [$($doc)?]),
        }
    };

    (@get_ver []) => { ::std::env!("CARGO_PKG_VERSION") };
    (@get_ver [$ver:expr]) => { $ver };

    (@get_dsc []) => { ::std::env!("CARGO_PKG_DESCRIPTION") };
    (@get_dsc [$dsc:expr]) => { $dsc };

    // explicit > doc > None
    (@get_fd [$fd:expr] [$($_doc:expr)?]) => { ::std::option::Option::Some($fd) };
    (@get_fd [] [$doc:expr]) => { ::std::option::Option::Some($doc) };
    (@get_fd [] []) => { ::std::option::Option::None };
}

// ─── define_plugin! ──────────────────────────────────────────────────────────

/// Creates a [`PluginDescriptor`] for a compiled-in plugin unit.
///
/// # Syntax
///
/// ```rust,ignore
/// use skein::prelude::*;
///
/// /// Says things back.
/// pub static ECHO: PluginDescriptor = define_plugin! {
///     name: "echo",
///     core: false,
///     hooks: [
///         command("echo").doc("<text> -- repeats <text>").autohelp(true).handler(echo),
///         event(["JOIN"]).handler(greet),
///     ],
///     metadata: {
///         version: "1.0.0",
///         desc:    "Echo commands",
///     },
/// };
/// ```
///
/// | Field | Required | Description |
/// |-------|----------|-------------|
/// | `name` | ✓ | Must be **first**. Unit name. |
/// | `core` | — | `true` makes a load failure fatal |
/// | `hooks` | — | `[expr, …]` — [`HookDef`] expressions |
/// | `metadata` | — | `{ version, desc, full_desc }`, last if present |
///
/// [`PluginDescriptor`]: crate::plugin::PluginDescriptor
/// [`HookDef`]: crate::hook::HookDef
#[macro_export]
macro_rules! define_plugin {
    // ── Entry: with doc comment ───────────────────────────────────────────────
    //
    // Accumulator slots:
    //   [$n]        unit name literal
    //   [$($c)?]    core flag
    //   [$($h),*]   hook expressions
    //   [$($doc)?]  doc literal
    ($(#[doc = $doc:literal])+ name: $name:literal, $($tail:tt)+) => {
        $crate::define_plugin!(
            @acc [$name] [] [] [::std::concat!($($doc, " "),*)]
            $($tail)+
        )
    };

    ($(#[doc = $doc:literal])+ name: $name:literal $(,)?) => {
        $crate::define_plugin!(@acc [$name] [] [] [::std::concat!($($doc, " "),*)])
    };

    // ── Entry: no doc ─────────────────────────────────────────────────────────
    (name: $name:literal, $($tail:tt)+) => {
        $crate::define_plugin!(@acc [$name] [] [] [] $($tail)+)
    };

    (name: $name:literal $(,)?) => {
        $crate::define_plugin!(@acc [$name] [] [] [])
    };

    // ── Accumulator: skip stray commas ────────────────────────────────────────
    (@acc $n:tt $c:tt $h:tt $doc:tt , $($rest:tt)*) => {
        $crate::define_plugin!(@acc $n $c $h $doc $($rest)*)
    };

    // ── Consume core: bool ────────────────────────────────────────────────────
    (@acc $n:tt [] $h:tt $doc:tt core: $core:literal $($rest:tt)*) => {
        $crate::define_plugin!(@acc $n [$core] $h $doc $($rest)*)
    };

    // ── Consume hooks: [expr, …] ──────────────────────────────────────────────
    (@acc $n:tt $c:tt [$($h:expr),*] $doc:tt hooks: [$($nh:expr),* $(,)?] $($rest:tt)*) => {
        $crate::define_plugin!(@acc $n $c [$($h,)* $($nh),*] $doc $($rest)*)
    };

    // ── Consume metadata: { … } ───────────────────────────────────────────────
    (@acc $n:tt $c:tt $h:tt [$($doc:expr)?] metadata: { $($meta:tt)* } $(,)?) => {
        $crate::define_plugin!(@terminal $n $c $h [$($doc)?] $($meta)*)
    };

    // ── No remaining fields → terminal ────────────────────────────────────────
    (@acc $n:tt $c:tt $h:tt [$($doc:expr)?]) => {
        $crate::define_plugin!(@terminal $n $c $h [$($doc)?])
    };

    (@core []) => { false };
    (@core [$core:literal]) => { $core };

    // ── @terminal — emit the PluginDescriptor ─────────────────────────────────
    (@terminal [$n:literal] $c:tt [$($h:expr),*] [$($doc:expr)?] $($meta:tt)*) => {{
        fn __skein_plugin_create() -> ::std::vec::Vec<$crate::hook::HookDef> {
            ::std::vec![$($h),*]
        }

        $crate::plugin::PluginDescriptor {
            name: $n,
            core: $crate::define_plugin!(@core $c),
            create: __skein_plugin_create,
            metadata: $crate::__plugin_metadata!(@parse [$($doc)?] $($meta)*),
        }
    }};
}
