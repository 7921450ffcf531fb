use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

/// IDR Minier - an idle mining wallet for the terminal.
#[derive(Debug, Parser)]
#[command(name = "idr-minier", version, about)]
pub struct Cli {
    /// Directory holding the saved user, wallet and progress records.
    #[arg(long, env = "MINIER_DATA_DIR", default_value = ".minier")]
    pub data_dir: PathBuf,

    /// Log file (defaults to minier.log inside the data directory).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Login name that is granted the admin role.
    #[arg(long, default_value = "admin")]
    pub admin_name: String,

    /// File touched once the first frame has been on screen for a moment.
    #[arg(long)]
    pub ready_file: Option<PathBuf>,

    /// Event loop pump period in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub frame_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub admin_name: String,
    pub ready_file: Option<PathBuf>,
    pub frame_rate: Duration,
}

impl Cli {
    pub fn into_config(self) -> Result<Config> {
        if !(10..=1000).contains(&self.frame_ms) {
            bail!("--frame-ms must be between 10 and 1000, got {}", self.frame_ms);
        }
        let admin_name = self.admin_name.trim().to_string();
        if admin_name.is_empty() {
            bail!("--admin-name must not be blank");
        }
        let log_file = self
            .log_file
            .unwrap_or_else(|| self.data_dir.join("minier.log"));
        Ok(Config {
            data_dir: self.data_dir,
            log_file,
            admin_name,
            ready_file: self.ready_file,
            frame_rate: Duration::from_millis(self.frame_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["idr-minier"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)?.into_config()
    }

    #[test]
    fn defaults_resolve_inside_data_dir() {
        let config = parse(&["--data-dir", "/tmp/minier"]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/minier"));
        assert_eq!(config.log_file, PathBuf::from("/tmp/minier/minier.log"));
        assert_eq!(config.admin_name, "admin");
        assert_eq!(config.frame_rate, Duration::from_millis(100));
        assert!(config.ready_file.is_none());
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let config = parse(&[
            "--data-dir",
            "d",
            "--log-file",
            "run.log",
            "--admin-name",
            " root ",
            "--ready-file",
            "ready",
            "--frame-ms",
            "50",
        ])
        .unwrap();
        assert_eq!(config.log_file, PathBuf::from("run.log"));
        assert_eq!(config.admin_name, "root");
        assert_eq!(config.ready_file, Some(PathBuf::from("ready")));
        assert_eq!(config.frame_rate, Duration::from_millis(50));
    }

    #[test]
    fn rejects_out_of_range_frame_rate_and_blank_admin() {
        assert!(parse(&["--data-dir", "d", "--frame-ms", "5"]).is_err());
        assert!(parse(&["--data-dir", "d", "--frame-ms", "2000"]).is_err());
        assert!(parse(&["--data-dir", "d", "--admin-name", "  "]).is_err());
    }
}
