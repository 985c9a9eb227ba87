// src/exec/env.rs

//! Effective environment for a unit's command.
//!
//! Override values are expanded against the *parent* environment only
//! (`$HOME/bin`, `${HOME}/bin`); variables that are not set are left in
//! the value verbatim. The expanded pairs are then laid over a full copy of
//! the parent environment, with unit keys winning.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use crate::unit::EnvOverrides;

/// Expand `$VAR` / `${VAR}` references in `value` using `lookup`.
pub fn expand_value<F>(value: &str, lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    shellexpand::env_with_context_no_errors(value, lookup).into_owned()
}

/// Expand every override against `parent`.
pub fn expand_overrides(
    overrides: &EnvOverrides,
    parent: &BTreeMap<OsString, OsString>,
) -> BTreeMap<String, String> {
    overrides
        .iter()
        .map(|(key, value)| {
            let expanded = expand_value(value, |name| {
                parent
                    .get(OsStr::new(name))
                    .and_then(|v| v.to_str())
                    .map(str::to_owned)
            });
            (key.clone(), expanded)
        })
        .collect()
}

/// The full environment a child should receive: `parent` with the expanded
/// overrides laid on top.
pub fn effective_environment<I>(
    parent: I,
    overrides: &EnvOverrides,
) -> (BTreeMap<OsString, OsString>, BTreeMap<String, String>)
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env: BTreeMap<OsString, OsString> = parent.into_iter().collect();
    let expanded = expand_overrides(overrides, &env);
    for (key, value) in &expanded {
        env.insert(OsString::from(key), OsString::from(value));
    }
    (env, expanded)
}
