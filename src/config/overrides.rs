//! Command-line overrides layered on top of loaded configuration.

use super::{Config, DEFAULT_CACHE_DIR};

/// Option values to force into a set of image sections.
///
/// Only options that were actually given are listed, so anything left out
/// keeps its file value or default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub images: Vec<String>,
    pub options: Vec<(String, String)>,
}

impl Overrides {
    pub fn new(images: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            images: images.into_iter().map(Into::into).collect(),
            options: Vec::new(),
        }
    }

    /// Add an override if `value` is set.
    pub fn set(&mut self, key: &str, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.options.push((key.to_string(), value.to_string()));
        }
    }

    /// Write the overrides into `config`.
    ///
    /// Each image section is created if missing. An image that ends up with
    /// no cache directory at all gets `DEFAULT_CACHE_DIR`.
    pub fn apply(&self, config: &mut Config) {
        for image in &self.images {
            let has_cache_dir = config.defaults().contains("cache_dir");
            let section = config.section_mut(image);
            for (key, value) in &self.options {
                section.set(key.as_str(), value.as_str());
            }
            if !has_cache_dir && !section.contains("cache_dir") {
                section.set("cache_dir", DEFAULT_CACHE_DIR);
            }
        }
    }
}
