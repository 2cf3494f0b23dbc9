//! Command-line interface of the `image-factory` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ImageFormat, Overrides};

#[derive(Debug, Parser)]
#[command(name = "image-factory")]
#[command(about = "Build unattended OS installation images")]
#[command(
    after_help = "Options given here override the config file ($IMAGE_FACTORY_CONFIG, /etc/image-factory.toml, ~/.config/image-factory.toml) for every IMAGE listed."
)]
pub struct Cli {
    /// Image sections to resolve (e.g. Debian-10-server)
    #[arg(required = true, value_name = "IMAGE")]
    pub images: Vec<String>,

    /// Config file to use instead of the default locations
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for downloaded installer files (default: ~/.cache/image-factory)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<String>,

    /// Directory holding preseed/kickstart templates
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<String>,

    /// Number of virtual CPUs for the installer VM
    #[arg(short = 'j', long)]
    pub cores: Option<u32>,

    /// Output image format
    #[arg(short, long, value_enum)]
    pub format: Option<ImageFormat>,

    /// Keep the intermediate raw image after conversion
    #[arg(long)]
    pub keep_raw: bool,

    /// Don't copy installer logs out of the image
    #[arg(long)]
    pub no_installer_logs: bool,

    /// Don't write a build log file
    #[arg(long)]
    pub no_log_file: bool,

    /// Memory for the installer VM (e.g. 1G, 512 MiB)
    #[arg(short, long, value_name = "SIZE")]
    pub ram: Option<String>,

    /// VNC display for the installer VM (e.g. localhost:13)
    #[arg(long, value_name = "DISPLAY")]
    pub vnc: Option<String>,

    /// Preseed/kickstart file for the installer
    #[arg(long, value_name = "FILE")]
    pub preseed: Option<String>,

    /// Extra installer kernel command line
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    pub append: Option<String>,

    /// Print resolved settings as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Overrides for every option that was given on the command line.
    pub fn overrides(&self) -> Overrides {
        let mut overrides = Overrides::new(self.images.iter().cloned());
        overrides.set("cache_dir", self.cache_dir.as_ref());
        overrides.set("data_dir", self.data_dir.as_ref());
        overrides.set("cores", self.cores);
        overrides.set("format", self.format);
        overrides.set("keep-raw", self.keep_raw.then_some(true));
        overrides.set("installer-logs", self.no_installer_logs.then_some(false));
        overrides.set("log-file", self.no_log_file.then_some(false));
        overrides.set("ram", self.ram.as_ref());
        overrides.set("vnc", self.vnc.as_ref());
        overrides.set("preseed", self.preseed.as_ref());
        overrides.set("append", self.append.as_ref());
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("image-factory").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_image_required() {
        assert!(Cli::try_parse_from(["image-factory"]).is_err());
    }

    #[test]
    fn test_no_options_no_overrides() {
        let cli = parse(&["Debian-10-server"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.images, vec!["Debian-10-server".to_string()]);
        assert!(overrides.options.is_empty());
    }

    #[test]
    fn test_options_become_overrides() {
        let cli = parse(&[
            "--format", "raw", "--cores", "2", "--keep-raw", "--no-log-file", "--ram", "2G",
            "Debian-10-server",
        ]);
        let options = cli.overrides().options;
        assert!(options.contains(&("format".into(), "raw".into())));
        assert!(options.contains(&("cores".into(), "2".into())));
        assert!(options.contains(&("keep-raw".into(), "true".into())));
        assert!(options.contains(&("log-file".into(), "false".into())));
        assert!(options.contains(&("ram".into(), "2G".into())));
        assert!(!options.iter().any(|(key, _)| key == "installer-logs"));
    }

    #[test]
    fn test_bad_format_rejected() {
        assert!(Cli::try_parse_from(["image-factory", "--format", "vmdk", "x"]).is_err());
    }

    #[test]
    fn test_append_may_start_with_dash() {
        let cli = parse(&["--append", "-- quiet", "Debian-10-server"]);
        assert_eq!(cli.append.as_deref(), Some("-- quiet"));
    }
}
