use crate::errors::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// File names looked up by `BridgeConfig::discover`, in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["pyproxy.toml", ".pyproxy.toml"];

/// Environment variable holding extra module search path entries.
pub const DEFAULT_PATH_ENV: &str = "PYPROXY_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub instantiation: InstantiationConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub mode: StateMode,
}

/// How interpreter states are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMode {
    /// Every interface shares one global state.
    Shared,
    /// Each interface (or Mode A target type) gets its own state.
    PerInterface,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Add the directory of the running executable to the search path.
    #[serde(default = "default_true")]
    pub include_install_dir: bool,

    /// Overrides the detected installation directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,

    /// Path-list variable split on the platform separator. Empty disables it.
    #[serde(default = "default_env_var")]
    pub env_var: String,

    #[serde(default)]
    pub extra: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantiationConfig {
    /// Reject constructor calls whose argument count differs from the
    /// binding's declared constructor argument types.
    #[serde(default = "default_true")]
    pub check_arity: bool,
}

impl Default for StateMode {
    fn default() -> Self {
        StateMode::PerInterface
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            include_install_dir: true,
            install_dir: None,
            env_var: default_env_var(),
            extra: Vec::new(),
        }
    }
}

impl Default for InstantiationConfig {
    fn default() -> Self {
        Self { check_arity: true }
    }
}

fn default_true() -> bool { true }
fn default_env_var() -> String { DEFAULT_PATH_ENV.to_string() }

impl PathsConfig {
    /// No ambient entries: neither the installation directory nor the
    /// environment are consulted.
    pub fn isolated() -> Self {
        Self {
            include_install_dir: false,
            install_dir: None,
            env_var: String::new(),
            extra: Vec::new(),
        }
    }

    /// Entries to inject into a new interpreter state, deduplicated in
    /// first-seen order.
    pub fn resolve(&self) -> Vec<PathBuf> {
        let mut entries = Vec::new();

        if self.include_install_dir {
            if let Some(dir) = self.install_dir.clone().or_else(detect_install_dir) {
                entries.push(dir);
            }
        }

        if !self.env_var.is_empty() {
            if let Some(raw) = std::env::var_os(&self.env_var) {
                entries.extend(split_path_list(&raw));
            }
        }

        entries.extend(self.extra.iter().cloned());

        let mut unique: Vec<PathBuf> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !unique.contains(&entry) {
                unique.push(entry);
            }
        }
        unique
    }
}

/// Split a path-list value on the platform separator, dropping empty entries.
pub fn split_path_list(raw: &OsStr) -> Vec<PathBuf> {
    std::env::split_paths(raw)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

fn detect_install_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

impl BridgeConfig {
    /// Configuration that touches nothing outside the process.
    pub fn isolated() -> Self {
        Self {
            paths: PathsConfig::isolated(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::configuration(path.display().to_string(), format!("failed to read config: {}", e))
        })?;

        Self::parse(&content).map_err(|e| match e {
            BridgeError::Configuration { message, .. } => {
                BridgeError::configuration(path.display().to_string(), message)
            }
            other => other,
        })
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BridgeError::configuration("config", format!("failed to parse config: {}", e)))
    }

    /// Find and load configuration file from current directory or parents
    pub fn discover() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir),
            Err(_) => Self::default(),
        }
    }

    /// Same as `discover`, starting at `start`.
    pub fn discover_from(start: &Path) -> Self {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for name in CONFIG_FILE_NAMES {
                let config_path = dir.join(name);
                if !config_path.exists() {
                    continue;
                }
                match Self::load(&config_path) {
                    Ok(config) => {
                        tracing::debug!(path = %config_path.display(), "loaded bridge config");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), error = %e, "ignoring invalid bridge config");
                    }
                }
            }

            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BridgeError::configuration("config", format!("failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.state.mode, StateMode::PerInterface);
        assert!(config.paths.include_install_dir);
        assert_eq!(config.paths.env_var, "PYPROXY_PATH");
        assert!(config.instantiation.check_arity);
    }

    #[test]
    fn test_parse_partial() {
        let config = BridgeConfig::parse(
            r#"
            [state]
            mode = "shared"

            [paths]
            include_install_dir = false
            extra = ["/opt/modules"]
            "#,
        )
        .unwrap();

        assert_eq!(config.state.mode, StateMode::Shared);
        assert!(!config.paths.include_install_dir);
        assert_eq!(config.paths.env_var, "PYPROXY_PATH");
        assert_eq!(config.paths.extra, vec![PathBuf::from("/opt/modules")]);
        assert!(config.instantiation.check_arity);
    }

    #[test]
    fn test_parse_error_is_configuration_error() {
        let err = BridgeConfig::parse("[state]\nmode = \"sometimes\"").unwrap_err();
        assert!(matches!(err, BridgeError::Configuration { .. }));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = BridgeConfig::isolated();
        config.state.mode = StateMode::Shared;
        config.paths.extra.push(PathBuf::from("/srv/lib"));

        let parsed = BridgeConfig::parse(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_discover_walks_up() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            root.path().join("pyproxy.toml"),
            "[instantiation]\ncheck_arity = false\n",
        )
        .unwrap();

        let config = BridgeConfig::discover_from(&nested);
        assert!(!config.instantiation.check_arity);
    }

    #[test]
    fn test_discover_skips_invalid_files() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("pyproxy.toml"), "not = [valid").unwrap();
        fs::write(
            root.path().join(".pyproxy.toml"),
            "[state]\nmode = \"shared\"\n",
        )
        .unwrap();

        let config = BridgeConfig::discover_from(root.path());
        assert_eq!(config.state.mode, StateMode::Shared);
    }

    #[test]
    fn test_resolve_paths() {
        let var = "PYPROXY_CONFIG_TEST_RESOLVE";
        let joined = std::env::join_paths(["/env/one", "/env/two", "/opt/shared"]).unwrap();
        std::env::set_var(var, &joined);

        let paths = PathsConfig {
            include_install_dir: true,
            install_dir: Some(PathBuf::from("/install")),
            env_var: var.to_string(),
            extra: vec![PathBuf::from("/opt/shared"), PathBuf::from("/extra")],
        };

        assert_eq!(
            paths.resolve(),
            vec![
                PathBuf::from("/install"),
                PathBuf::from("/env/one"),
                PathBuf::from("/env/two"),
                PathBuf::from("/opt/shared"),
                PathBuf::from("/extra"),
            ]
        );
        std::env::remove_var(var);
    }

    #[test]
    fn test_isolated_has_no_entries() {
        assert!(PathsConfig::isolated().resolve().is_empty());
    }

    #[test]
    fn test_split_drops_empty_entries() {
        let joined = std::env::join_paths(["/a", "", "/b"]).unwrap();
        assert_eq!(
            split_path_list(&joined),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }
}
