//! Settings for the Gobra IDE bridge.
//!
//! The editor hands settings over as one JSON object with two sections:
//!
//! ```json
//! {
//!   "gobraSettings": { "autoVerify": true, "timeout": 1000 },
//!   "gobraDependencies": { "java": { "javaBinary": "" } }
//! }
//! ```
//!
//! Every option has a default, so a partial (or empty) object is always
//! accepted. `gobraSettings` is also forwarded verbatim to the verification
//! backend with each verification request, which is why it keeps the
//! camelCase wire names.

mod paths;

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub use paths::{PlatformPath, expand_env_vars, expand_env_vars_with};

/// Debounce window used when the editor does not configure one.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Placeholder in tool paths that stands for the tools base directory.
pub const GOBRA_TOOLS_PLACEHOLDER: &str = "$gobraTools$";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings are not valid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unbalanced `{delimiter}` in path {path}")]
    UnbalancedDelimiter { delimiter: char, path: String },

    #[error("environment variable {name} used in path {path} is not set")]
    MissingEnvVar { name: String, path: String },

    #[error("environment variable {name} must not contain `{delimiter}`: {value}")]
    NestedEnvVar {
        name: String,
        delimiter: char,
        value: String,
    },

    #[error("no {tool} path is configured for this platform")]
    NoPlatformPath { tool: &'static str },

    #[error("expected path {} does not exist", .0.display())]
    MissingPath(PathBuf),
}

// ============================================================================
// Root settings
// ============================================================================

/// All settings the bridge understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub gobra_settings: GobraSettings,
    pub gobra_dependencies: GobraDependencies,
}

impl Settings {
    /// Parse settings from the editor's JSON object.
    ///
    /// `null` (no initialization options at all) yields the defaults.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, SettingsError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Parse settings from a JSON document.
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn auto_verify(&self) -> bool {
        self.gobra_settings.auto_verify
    }

    pub fn verify_package(&self) -> bool {
        self.gobra_settings.verify_package
    }

    /// Quiescence window for edit-triggered verification.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.gobra_settings.timeout)
    }
}

// ============================================================================
// gobraSettings
// ============================================================================

/// The `gobraSettings` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GobraSettings {
    /// Verify on open, save and edit, and re-run requests that arrived while
    /// the same files were already being verified.
    pub auto_verify: bool,

    /// Verify every file of the enclosing package instead of just the file
    /// that triggered the request.
    pub verify_package: bool,

    /// Debounce window for edit-triggered verification, in milliseconds.
    #[serde(deserialize_with = "positive_timeout")]
    pub timeout: u64,

    /// Which distribution of the Gobra tools to use.
    pub build_version: BuildChannel,

    /// Run the backend in server mode (keeps caches between runs).
    pub server_mode: bool,

    pub debug: bool,
    pub erase_ghost: bool,
    pub goify: bool,
    pub unparse: bool,
    pub print_internal: bool,
    pub print_viper: bool,

    /// Stop after parsing.
    pub parse_only: bool,

    /// Log level of the backend itself.
    pub log_level: LogLevel,

    /// Verification backend used by the server.
    pub backend: VerificationBackend,

    /// Additional directories searched for imported packages.
    pub include_dirs: Vec<String>,

    /// Name of the module the verified packages belong to.
    pub module_name: String,
}

impl Default for GobraSettings {
    fn default() -> Self {
        Self {
            auto_verify: true,
            verify_package: true,
            timeout: DEFAULT_TIMEOUT_MS,
            build_version: BuildChannel::default(),
            server_mode: true,
            debug: false,
            erase_ghost: false,
            goify: false,
            unparse: false,
            print_internal: false,
            print_viper: false,
            parse_only: false,
            log_level: LogLevel::default(),
            backend: VerificationBackend::default(),
            include_dirs: Vec::new(),
            module_name: String::new(),
        }
    }
}

/// Accept any integer (or null) for `timeout`, falling back to the default
/// when it is not positive.
fn positive_timeout<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    match raw {
        Some(ms) if ms > 0 => Ok(ms as u64),
        Some(ms) => {
            warn!(
                "Ignoring non-positive verification timeout {}ms, using {}ms",
                ms, DEFAULT_TIMEOUT_MS
            );
            Ok(DEFAULT_TIMEOUT_MS)
        }
        None => Ok(DEFAULT_TIMEOUT_MS),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildChannel {
    #[default]
    Stable,
    Nightly,
    Local,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationBackend {
    #[default]
    #[serde(rename = "SILICON")]
    Silicon,
    #[serde(rename = "CARBON")]
    Carbon,
    #[serde(rename = "VSWITHSILICON")]
    ViperServerWithSilicon,
    #[serde(rename = "VSWITHCARBON")]
    ViperServerWithCarbon,
}

// ============================================================================
// gobraDependencies
// ============================================================================

/// The `gobraDependencies` section: where the external tools live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GobraDependencies {
    pub java: JavaSettings,
    pub gobra_tools_paths: ToolPaths,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JavaSettings {
    /// Java executable; empty means `java` from `PATH`.
    pub java_binary: String,
    pub java_arguments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolPaths {
    pub gobra_tools_base_path: PlatformPath,
    pub z3_executable: PlatformPath,
    pub boogie_executable: PlatformPath,
}

impl GobraDependencies {
    /// The java executable to run.
    pub fn java_binary(&self) -> PathBuf {
        let configured = self.java.java_binary.trim();
        if configured.is_empty() {
            PathBuf::from("java")
        } else {
            PathBuf::from(configured)
        }
    }

    /// Resolved path of the z3 executable.
    pub fn z3_executable(&self) -> Result<PathBuf, SettingsError> {
        self.resolve_tool("z3", &self.gobra_tools_paths.z3_executable)
    }

    /// Resolved path of the boogie executable.
    pub fn boogie_executable(&self) -> Result<PathBuf, SettingsError> {
        self.resolve_tool("boogie", &self.gobra_tools_paths.boogie_executable)
    }

    fn resolve_tool(
        &self,
        tool: &'static str,
        configured: &PlatformPath,
    ) -> Result<PathBuf, SettingsError> {
        let raw = configured
            .for_current_platform()
            .ok_or(SettingsError::NoPlatformPath { tool })?;

        let path = if raw.contains(GOBRA_TOOLS_PLACEHOLDER) {
            let base = self
                .gobra_tools_paths
                .gobra_tools_base_path
                .for_current_platform()
                .ok_or(SettingsError::NoPlatformPath { tool: "gobra tools" })?;
            let base = expand_env_vars(base)?;
            expand_env_vars(&raw.replace(GOBRA_TOOLS_PLACEHOLDER, &base))?
        } else {
            expand_env_vars(raw)?
        };

        let path = PathBuf::from(path);
        if path.exists() {
            Ok(path)
        } else {
            Err(SettingsError::MissingPath(path))
        }
    }
}
