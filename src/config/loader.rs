//! Loading configuration files.
//!
//! # Load Order
//!
//! 1. `--config <path>` if given (must exist)
//! 2. otherwise `IMAGE_FACTORY_CONFIG` if set (must exist)
//! 3. otherwise `/etc/image-factory.toml`, then the user's
//!    `$XDG_CONFIG_HOME/image-factory.toml`, each skipped when absent
//!
//! Later files override earlier ones.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Config, ConfigError, Section, CONFIG_ENV, CONFIG_FILE_NAME, DEFAULT_SECTION};

/// Default config locations, lowest priority first.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![Path::new("/etc").join(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    paths
}

/// Parse TOML text. `origin` is only used in error messages.
pub fn parse_str(content: &str, origin: &Path) -> Result<Config, ConfigError> {
    let table: toml::Table = content
        .parse()
        .map_err(|err| ConfigError::parse_toml(origin, err))?;

    let mut config = Config::new();
    for (name, value) in table {
        let toml::Value::Table(options) = value else {
            return Err(ConfigError::NotASection {
                path: origin.to_path_buf(),
                key: name,
            });
        };
        add_section(&mut config, name, options, origin)?;
    }

    Ok(config)
}

/// Store one table as a section.
///
/// A header such as `[Ubuntu-20.04-server]` reaches us as nested tables
/// `Ubuntu-20` -> `04-server`; nested tables are joined back into a dotted
/// section name.
fn add_section(
    config: &mut Config,
    name: String,
    options: toml::Table,
    origin: &Path,
) -> Result<(), ConfigError> {
    let mut section = Section::new();
    let mut nested = Vec::new();
    for (key, value) in options {
        let text = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Table(table) => {
                nested.push((format!("{name}.{key}"), table));
                continue;
            }
            toml::Value::Array(_) => {
                return Err(ConfigError::UnsupportedValue {
                    path: origin.to_path_buf(),
                    section: name,
                    key,
                });
            }
        };
        section.set(key, text);
    }

    if !section.is_empty() || nested.is_empty() {
        if name == DEFAULT_SECTION {
            config.defaults_mut().update(&section);
        } else {
            config.section_mut(&name).update(&section);
        }
    }

    for (name, table) in nested {
        add_section(config, name, table, origin)?;
    }
    Ok(())
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```ignore
/// use image_factory::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_file("image-factory.toml")
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Explicit config file; disables every other source.
    file: Option<PathBuf>,

    /// Replacement for `default_search_paths()`.
    search_paths: Option<Vec<PathBuf>>,

    /// Ignore `IMAGE_FACTORY_CONFIG`.
    skip_env: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load exactly this file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Search these paths instead of the system and user locations.
    #[must_use]
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Don't consult `IMAGE_FACTORY_CONFIG` (for testing).
    #[must_use]
    pub fn skip_env_var(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Load and merge every applicable file.
    pub fn load(&self) -> Result<Config, ConfigError> {
        if let Some(path) = &self.file {
            return load_file(path);
        }

        if !self.skip_env {
            if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
                debug!("{CONFIG_ENV} points to {}", Path::new(&path).display());
                return load_file(Path::new(&path));
            }
        }

        let paths = self
            .search_paths
            .clone()
            .unwrap_or_else(default_search_paths);

        let mut config = Config::new();
        for path in paths {
            match fs::read_to_string(&path) {
                Ok(content) => {
                    debug!("Loading config from {}", path.display());
                    config.merge(parse_str(&content, &path)?);
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("No config at {}", path.display());
                }
                Err(err) => return Err(ConfigError::read_file(path, err)),
            }
        }

        Ok(config)
    }
}

fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::read_file(path, err))?;
    parse_str(&content, path)
}
