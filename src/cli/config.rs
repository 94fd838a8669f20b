use std::path::PathBuf;

use anyhow::Result;
use tracing::level_filters::LevelFilter;

use crate::utils::dir::{create_application_default_path, ensure_dir};

use super::dates::DateStyle;

/// Flags shared by every command.
#[derive(Debug, Clone, clap::Args)]
pub struct GlobalArgs {
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    pub dir: Option<PathBuf>,
    #[arg(
        long = "log",
        global = true,
        help = "Level of logs written into the log files. Falls back to RUST_LOG"
    )]
    pub log: Option<LevelFilter>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console", global = true)]
    pub log_console: bool,
    #[arg(long, global = true, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    pub date_style: DateStyle,
    #[arg(long, global = true, help = "Print reports without colours")]
    pub plain: bool,
}

/// Settings resolved from [GlobalArgs] and the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_dir: PathBuf,
    pub log_level: Option<LevelFilter>,
    pub log_console: bool,
    pub date_style: DateStyle,
    pub color: bool,
}

impl AppConfig {
    pub fn resolve(args: GlobalArgs) -> Result<Self> {
        let app_dir = args
            .dir
            .map_or_else(create_application_default_path, ensure_dir)?;
        Ok(Self {
            app_dir,
            log_level: args.log,
            log_console: args.log_console,
            date_style: args.date_style,
            color: !args.plain,
        })
    }

    pub fn records_dir(&self) -> PathBuf {
        self.app_dir.join("records")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.app_dir.join("logs")
    }
}
