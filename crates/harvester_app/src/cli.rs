//! Command-line interface for the harvester binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Runs one harvest pass over the feeds listed in a config file.
///
/// ```sh
/// harvester --config harvest.ron --output ./harvest
/// HARVEST_TOKEN=... HARVEST_COOKIE=... harvester -c harvest.ron --log both
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// RON file with feeds and harvest settings
    #[arg(short, long)]
    pub config: PathBuf,

    /// Directory that receives articles, media and sync state
    #[arg(short, long, default_value = "./harvest")]
    pub output: PathBuf,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Session token; overrides the config file
    #[arg(long, env = "HARVEST_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Cookie header value; overrides the config file
    #[arg(long, env = "HARVEST_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let cli = Cli::parse_from(["harvester", "--config", "harvest.ron"]);
        assert_eq!(cli.config, PathBuf::from("harvest.ron"));
        assert_eq!(cli.output, PathBuf::from("./harvest"));
        assert_eq!(cli.log, LogTarget::Terminal);
        assert!(!cli.verbose);
    }

    #[test]
    fn short_flags_and_log_target() {
        let cli = Cli::parse_from([
            "harvester", "-c", "a.ron", "-o", "/tmp/out", "--log", "both", "-v",
        ]);
        assert_eq!(cli.output, PathBuf::from("/tmp/out"));
        assert_eq!(cli.log, LogTarget::Both);
        assert!(cli.verbose);
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["harvester"]).is_err());
    }
}
