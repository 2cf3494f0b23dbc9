//! Build configuration: one `[DEFAULT]` section plus one section per image.
//!
//! # Resolution
//!
//! ```text
//! config files ──load──▶ Config ──Overrides::apply──▶ Config ──items()──▶ BuildSettings
//!                                 (CLI always wins)      (defaults + section,
//!                                                          %(name)s expanded)
//! ```
//!
//! Values are kept as strings until `BuildSettings` gives them types.

mod error;
mod interpolate;
mod loader;
mod overrides;
mod settings;

pub use error::ConfigError;
pub use interpolate::{interpolate, MAX_INTERPOLATION_DEPTH};
pub use loader::{default_search_paths, parse_str, ConfigLoader};
pub use overrides::Overrides;
pub use settings::{expand_home, BuildSettings, ImageFormat};

/// Name of the section every image section inherits from.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "IMAGE_FACTORY_CONFIG";

/// File name looked up in the default locations.
pub const CONFIG_FILE_NAME: &str = "image-factory.toml";

/// Cache directory used when nothing else sets one.
pub const DEFAULT_CACHE_DIR: &str = "~/.cache/image-factory";

/// Ordered string options. Setting an existing key keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    options: Vec<(String, String)>,
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.options.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.options.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.options.iter().position(|(k, _)| k == key)?;
        Some(self.options.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Copy every option of `other` into this section.
    pub fn update(&mut self, other: &Section) {
        for (key, value) in other.iter() {
            self.set(key, value);
        }
    }

    /// Options as owned pairs, in order.
    pub fn to_vec(&self) -> Vec<(String, String)> {
        self.options.clone()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Section {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut section = Section::new();
        for (key, value) in iter {
            section.set(key, value);
        }
        section
    }
}

/// All configuration known to a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    defaults: Section,
    sections: Vec<(String, Section)>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults(&self) -> &Section {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut Section {
        &mut self.defaults
    }

    /// Image section names, in file order. `DEFAULT` is not one of them.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        if name == DEFAULT_SECTION {
            return Some(&self.defaults);
        }
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, section)| section)
    }

    /// Section `name`, created empty if missing.
    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        if name == DEFAULT_SECTION {
            return &mut self.defaults;
        }
        let index = match self.sections.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.sections.push((name.to_string(), Section::new()));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index].1
    }

    /// Defaults merged with the section's own options, not yet interpolated.
    pub fn raw_items(&self, name: &str) -> Result<Section, ConfigError> {
        let own = self
            .section(name)
            .ok_or_else(|| ConfigError::NoSuchSection(name.to_string()))?;
        let mut merged = self.defaults.clone();
        merged.update(own);
        Ok(merged)
    }

    /// Merged options of a section with `%(name)s` references expanded.
    pub fn items(&self, name: &str) -> Result<Vec<(String, String)>, ConfigError> {
        let raw = self.raw_items(name)?;
        raw.iter()
            .map(|(key, value)| {
                let value = interpolate(name, key, value, &raw)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// One interpolated option, if the section (or `DEFAULT`) has it.
    pub fn get(&self, section: &str, key: &str) -> Result<Option<String>, ConfigError> {
        let raw = self.raw_items(section)?;
        raw.get(key)
            .map(|value| interpolate(section, key, value, &raw))
            .transpose()
    }

    /// Layer `other` on top of this config; its values win.
    pub fn merge(&mut self, other: Config) {
        self.defaults.update(&other.defaults);
        for (name, section) in other.sections {
            self.section_mut(&name).update(&section);
        }
    }
}
