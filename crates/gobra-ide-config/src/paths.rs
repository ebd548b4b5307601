//! Platform-dependent tool paths and environment variable expansion.

use serde::{Deserialize, Serialize};

use crate::SettingsError;

/// A path that may differ per operating system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformPath {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linux: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

impl PlatformPath {
    /// The non-empty entry for the platform we are running on.
    pub fn for_current_platform(&self) -> Option<&str> {
        let entry = if cfg!(windows) {
            &self.windows
        } else if cfg!(target_os = "macos") {
            &self.mac
        } else {
            &self.linux
        };
        entry.as_deref().filter(|p| !p.is_empty())
    }
}

/// Expand environment variable references in `path` using the process
/// environment (`%NAME%` on Windows, `$NAME` elsewhere).
pub fn expand_env_vars(path: &str) -> Result<String, SettingsError> {
    expand_env_vars_with(path, cfg!(windows), |name| std::env::var(name).ok())
}

/// Expand environment variable references with an explicit lookup.
///
/// On Windows a reference is `%NAME%`. Elsewhere it is `$NAME`, running up
/// to the next `/` or the end of the path. Values must not themselves
/// contain the reference delimiter.
pub fn expand_env_vars_with<F>(path: &str, windows: bool, lookup: F) -> Result<String, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut path = path.to_string();
    if path.len() <= 2 {
        return Ok(path);
    }

    if windows {
        while let Some(start) = path.find('%') {
            let Some(len) = path[start + 1..].find('%') else {
                return Err(SettingsError::UnbalancedDelimiter {
                    delimiter: '%',
                    path,
                });
            };
            let end = start + 1 + len;
            let name = &path[start + 1..end];
            let value = lookup_var(&path, name, '%', &lookup)?;
            path = format!("{}{}{}", &path[..start], value, &path[end + 1..]);
        }
    } else {
        while let Some(start) = path.find('$') {
            let end = path[start + 1..]
                .find('/')
                .map_or(path.len(), |offset| start + 1 + offset);
            let name = &path[start + 1..end];
            let value = lookup_var(&path, name, '$', &lookup)?;
            path = format!("{}{}{}", &path[..start], value, &path[end..]);
        }
    }

    Ok(path)
}

fn lookup_var<F>(path: &str, name: &str, delimiter: char, lookup: &F) -> Result<String, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SettingsError::MissingEnvVar {
            name: name.to_string(),
            path: path.to_string(),
        })?;
    if value.contains(delimiter) {
        return Err(SettingsError::NestedEnvVar {
            name: name.to_string(),
            delimiter,
            value,
        });
    }
    Ok(value)
}
