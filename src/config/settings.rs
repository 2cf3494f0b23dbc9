//! Typed view of one image section.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use super::{Config, ConfigError, DEFAULT_CACHE_DIR};
use crate::bytesize::parse_bytes;

/// Disk image format produced by a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Raw,
    #[default]
    Qcow2,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Qcow2 => "qcow2",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "qcow2" => Ok(Self::Qcow2),
            other => Err(format!("unknown image format '{other}' (expected raw or qcow2)")),
        }
    }
}

/// Everything a build needs to know about one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSettings {
    pub image: String,
    pub cache_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub cores: u32,
    pub format: ImageFormat,
    pub keep_raw: bool,
    pub installer_logs: bool,
    pub log_file: bool,
    /// VM memory in bytes.
    pub ram: u64,
    pub vnc: Option<String>,
    pub dist: Option<String>,
    /// Installer kernel URL.
    pub linux: Option<String>,
    /// Installer initrd URL.
    pub initrd: Option<String>,
    pub preseed: Option<PathBuf>,
    /// Extra installer kernel command line.
    pub append: Option<String>,
    /// `<distro>_mirror` options keyed by distro.
    pub mirrors: BTreeMap<String, String>,
}

const DEFAULT_RAM: &str = "1G";

impl BuildSettings {
    /// Resolve `image`'s merged, interpolated options into settings.
    pub fn from_config(config: &Config, image: &str) -> Result<Self, ConfigError> {
        let items: BTreeMap<String, String> = config.items(image)?.into_iter().collect();
        let get = |key: &str| items.get(key).map(String::as_str);

        let invalid = |key: &str, value: &str, message: &str| {
            ConfigError::invalid_value(image, key, value, message)
        };
        let boolean = |key: &str, default: bool| -> Result<bool, ConfigError> {
            match get(key) {
                None => Ok(default),
                Some(value) => parse_bool(value)
                    .ok_or_else(|| invalid(key, value, "expected true or false")),
            }
        };

        let cores = match get("cores") {
            None => 1,
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("cores", value, "expected a positive integer"))?,
        };

        let format = match get("format") {
            None => ImageFormat::default(),
            Some(value) => value
                .parse::<ImageFormat>()
                .map_err(|message: String| invalid("format", value, &message))?,
        };

        let ram = parse_bytes(get("ram").unwrap_or(DEFAULT_RAM)).map_err(|source| {
            ConfigError::InvalidSize {
                section: image.to_string(),
                key: "ram".to_string(),
                source,
            }
        })?;

        let mirrors = items
            .iter()
            .filter_map(|(key, value)| {
                key.strip_suffix("_mirror")
                    .filter(|distro| !distro.is_empty())
                    .map(|distro| (distro.to_string(), value.clone()))
            })
            .collect();

        let owned = |key: &str| get(key).map(str::to_string);

        Ok(Self {
            image: image.to_string(),
            cache_dir: expand_home(get("cache_dir").unwrap_or(DEFAULT_CACHE_DIR)),
            data_dir: get("data_dir").map(expand_home),
            cores,
            format,
            keep_raw: boolean("keep-raw", false)?,
            installer_logs: boolean("installer-logs", true)?,
            log_file: boolean("log-file", true)?,
            ram,
            vnc: owned("vnc"),
            dist: owned("dist"),
            linux: owned("linux"),
            initrd: owned("initrd"),
            preseed: get("preseed").map(expand_home),
            append: owned("append"),
            mirrors,
        })
    }

    /// Print settings for the user.
    pub fn print(&self) {
        println!("[{}]", self.image);
        println!("  cache_dir:      {}", self.cache_dir.display());
        if let Some(dir) = &self.data_dir {
            println!("  data_dir:       {}", dir.display());
        }
        println!("  cores:          {}", self.cores);
        println!("  format:         {}", self.format);
        println!("  ram:            {} bytes", self.ram);
        println!("  keep-raw:       {}", self.keep_raw);
        println!("  installer-logs: {}", self.installer_logs);
        println!("  log-file:       {}", self.log_file);
        let optional = [
            ("vnc", &self.vnc),
            ("dist", &self.dist),
            ("linux", &self.linux),
            ("initrd", &self.initrd),
            ("append", &self.append),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                println!("  {:<15} {}", format!("{name}:"), value);
            }
        }
        if let Some(preseed) = &self.preseed {
            println!("  preseed:        {}", preseed.display());
        }
        for (distro, url) in &self.mirrors {
            println!("  {:<15} {}", format!("{distro} mirror:"), url);
        }
    }
}

/// Boolean spellings accepted in config files.
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home = dirs::home_dir;
    match path.strip_prefix('~') {
        Some("") => home().unwrap_or_else(|| PathBuf::from(path)),
        Some(rest) if rest.starts_with('/') => match home() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        _ => PathBuf::from(path),
    }
}
