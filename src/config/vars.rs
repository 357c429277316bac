//! Environment variable interpolation for configuration files.
//!
//! Supports `${VAR}` and `${VAR:-default}`, where the default applies when
//! the variable is unset or empty. `$$` produces a literal `$`; a bare `$`
//! with no braces is left untouched.

use regex::{Captures, Regex};
use snafu::prelude::*;
use std::env;
use std::sync::LazyLock;

use crate::error::{ConfigError, EnvInterpolationSnafu};

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{(?P<name>\w+)(?::-(?P<default>[^}]*))?\}")
        .expect("invalid interpolation regex")
});

/// Replace every variable reference in `text`, collecting all failures so
/// the operator sees the full list at once instead of one per restart.
pub(crate) fn interpolate(text: &str) -> Result<String, ConfigError> {
    let mut problems = Vec::new();
    let replaced = VAR_RE.replace_all(text, |caps: &Captures<'_>| {
        let Some(name) = caps.name("name") else {
            // The `$$` escape.
            return "$".to_string();
        };
        let name = name.as_str();
        let default = caps.name("default").map(|d| d.as_str().to_string());
        match env::var(name) {
            // A value with a line break could smuggle extra YAML keys in.
            Ok(value) if value.contains('\n') => {
                problems.push(format!("variable {name} contains a line break"));
                String::new()
            }
            Ok(value) if value.is_empty() => default.unwrap_or_default(),
            Ok(value) => value,
            Err(_) => match default {
                Some(default) => default,
                None => {
                    problems.push(format!("missing environment variable {name}"));
                    String::new()
                }
            },
        }
    });
    ensure!(
        problems.is_empty(),
        EnvInterpolationSnafu {
            message: problems.join(", "),
        }
    );
    Ok(replaced.into_owned())
}
