//! Configuration management for livedoc.
//!
//! Parses `livedoc.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Path Expansion
//!
//! Path values support `~` and environment variable expansion:
//!
//! - `~/previews` - expands to the home directory
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `output.dir`
//! - `preview.template_dir`

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override output directory.
    pub output_dir: Option<PathBuf>,
    /// Override automatic browser opening.
    pub open_browser: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "livedoc.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server port ranges.
    pub server: ServerConfig,
    /// Output configuration (paths are relative strings from TOML).
    output: OutputConfigRaw,
    /// Preview page configuration (paths are relative strings from TOML).
    preview: PreviewConfigRaw,
    /// Save watcher configuration.
    pub watch: WatchConfig,

    /// Resolved output configuration (set after loading).
    #[serde(skip)]
    pub output_resolved: OutputConfig,
    /// Resolved preview configuration (set after loading).
    #[serde(skip)]
    pub preview_resolved: PreviewConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Inclusive range of TCP ports.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct PortRange {
    /// Lowest port to try.
    pub min: u16,
    /// Highest port to try.
    pub max: u16,
}

impl PortRange {
    /// Create a new port range.
    #[must_use]
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Check whether two ranges share at least one port.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Server configuration.
///
/// The HTTP and WebSocket ranges are expected not to overlap. This is not
/// enforced; see [`Config::port_ranges_overlap`].
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ports to probe for the HTTP static server.
    pub http_ports: PortRange,
    /// Ports to probe for the WebSocket reload server.
    pub ws_ports: PortRange,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_ports: PortRange::new(8800, 8849),
            ws_ports: PortRange::new(8850, 8899),
        }
    }
}

/// Raw output configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OutputConfigRaw {
    dir: Option<String>,
}

/// Resolved output configuration.
#[derive(Debug, Default)]
pub struct OutputConfig {
    /// Directory for exported pages. `None` means a temporary directory.
    pub dir: Option<PathBuf>,
}

/// Raw preview configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PreviewConfigRaw {
    open_browser: Option<bool>,
    browser: Option<String>,
    template_dir: Option<String>,
}

/// Resolved preview configuration.
#[derive(Debug)]
pub struct PreviewConfig {
    /// Open the preview page in a browser when preview is enabled.
    pub open_browser: bool,
    /// Browser application to use instead of the system default.
    pub browser: Option<String>,
    /// Directory whose files override the embedded page assets.
    pub template_dir: Option<PathBuf>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            open_browser: true,
            browser: None,
            template_dir: None,
        }
    }
}

/// Save watcher configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce window for filesystem events in milliseconds.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`output.dir`").
        field: String,
        /// Error message.
        message: String,
    },
}

/// Validate a port range field.
fn require_port_range(range: PortRange, field: &str) -> Result<(), ConfigError> {
    if range.min == 0 {
        return Err(ConfigError::Validation(format!(
            "{field}.min cannot be 0"
        )));
    }
    if range.min > range.max {
        return Err(ConfigError::Validation(format!(
            "{field}.min ({}) must not exceed {field}.max ({})",
            range.min, range.max
        )));
    }
    Ok(())
}

/// Expand `~` and environment variables in a path string.
fn expand_path(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: e.to_string(),
        })
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `livedoc.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(output_dir) = &settings.output_dir {
            self.output_resolved.dir = Some(output_dir.clone());
        }
        if let Some(open_browser) = settings.open_browser {
            self.preview_resolved.open_browser = open_browser;
        }
    }

    /// Check whether the HTTP and WebSocket port ranges share any port.
    #[must_use]
    pub fn port_ranges_overlap(&self) -> bool {
        self.server.http_ports.overlaps(&self.server.ws_ports)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_port_range(self.server.http_ports, "server.http_ports")?;
        require_port_range(self.server.ws_ports, "server.ws_ports")?;

        if self.watch.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "watch.debounce_ms must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Expand and resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let resolve = |value: Option<&str>, field: &str| -> Result<Option<PathBuf>, ConfigError> {
            value
                .map(|v| expand_path(v, field).map(|expanded| config_dir.join(expanded)))
                .transpose()
        };

        self.output_resolved = OutputConfig {
            dir: resolve(self.output.dir.as_deref(), "output.dir")?,
        };

        self.preview_resolved = PreviewConfig {
            open_browser: self.preview.open_browser.unwrap_or(true),
            browser: self.preview.browser.clone(),
            template_dir: resolve(self.preview.template_dir.as_deref(), "preview.template_dir")?,
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.http_ports, PortRange::new(8800, 8849));
        assert_eq!(config.server.ws_ports, PortRange::new(8850, 8899));
        assert_eq!(config.output_resolved.dir, None);
        assert!(config.preview_resolved.open_browser);
        assert_eq!(config.watch.debounce_ms, 100);
        assert!(!config.port_ranges_overlap());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.http_ports, PortRange::new(8800, 8849));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_server_config() {
        let toml = r"
[server]
http_ports = { min = 9000, max = 9010 }
ws_ports = { min = 9100, max = 9110 }
";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.http_ports, PortRange::new(9000, 9010));
        assert_eq!(config.server.ws_ports, PortRange::new(9100, 9110));
    }

    #[test]
    fn test_overlapping_ranges_detected() {
        let toml = r"
[server]
http_ports = { min = 9000, max = 9010 }
ws_ports = { min = 9010, max = 9020 }
";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.port_ranges_overlap());
        // Overlap is reported, not rejected
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let toml = r"
[server]
http_ports = { min = 9010, max = 9000 }
";
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.http_ports.min"));
    }

    #[test]
    fn test_zero_port_rejected() {
        let toml = r"
[server]
ws_ports = { min = 0, max = 10 }
";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let toml = r"
[watch]
debounce_ms = 0
";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[output]
dir = "out/preview"

[preview]
open_browser = false
browser = "firefox"
template_dir = "theme"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project")).unwrap();

        assert_eq!(
            config.output_resolved.dir,
            Some(PathBuf::from("/project/out/preview"))
        );
        assert!(!config.preview_resolved.open_browser);
        assert_eq!(config.preview_resolved.browser.as_deref(), Some("firefox"));
        assert_eq!(
            config.preview_resolved.template_dir,
            Some(PathBuf::from("/project/theme"))
        );
    }

    #[test]
    fn test_absolute_output_dir_kept() {
        let toml = r#"
[output]
dir = "/tmp/livedoc"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project")).unwrap();
        assert_eq!(config.output_resolved.dir, Some(PathBuf::from("/tmp/livedoc")));
    }

    #[test]
    fn test_unset_env_var_in_output_dir() {
        let toml = r#"
[output]
dir = "${LIVEDOC_TEST_SURELY_UNSET_VAR}/out"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.resolve_paths(Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { ref field, .. } if field == "output.dir"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            "[output]\ndir = \"previews\"\n\n[watch]\ndebounce_ms = 250\n",
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.output_resolved.dir, Some(dir.path().join("previews")));
        assert_eq!(config.watch.debounce_ms, 250);
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = Config::load(Some(Path::new("/nonexistent/livedoc.toml")), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_cli_settings_override() {
        let mut config = Config::default();
        let settings = CliSettings {
            output_dir: Some(PathBuf::from("/override")),
            open_browser: Some(false),
        };
        config.apply_cli_settings(&settings);

        assert_eq!(config.output_resolved.dir, Some(PathBuf::from("/override")));
        assert!(!config.preview_resolved.open_browser);
    }
}
