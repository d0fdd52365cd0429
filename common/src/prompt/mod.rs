pub mod argument;
pub mod command;

use std::{
    fmt::{self, Display},
    fs,
    path::Path,
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};

use fern::colors::ColoredLevelConfig;
use log::LevelFilter;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display as StrumDisplay, EnumString};
use thiserror::Error;

pub use fern::colors::Color;

// Build an async command callback from an async fn
#[macro_export]
macro_rules! async_handler {
    ($func: expr) => {
        move |a, b, c| Box::pin($func(a, b, c))
    };
}

static COLORS_ENABLED: AtomicBool = AtomicBool::new(true);

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize, StrumDisplay, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid module log configuration '{}', expected <module>=<level>", _0)]
    InvalidModuleConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

// Log level override for a single module, written as module=level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    pub module: String,
    pub level: LogLevel,
}

impl FromStr for ModuleConfig {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LoggerError::InvalidModuleConfig(s.to_owned());
        let (module, level) = s.split_once('=').ok_or_else(invalid)?;
        if module.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            module: module.to_owned(),
            level: LogLevel::from_str(level).map_err(|_| invalid())?,
        })
    }
}

impl Display for ModuleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.module, self.level)
    }
}

impl Serialize for ModuleConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ModuleConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ModuleConfig::from_str(&value).map_err(D::Error::custom)
    }
}

pub fn default_logs_datetime_format() -> String {
    String::from("[%Y-%m-%d] (%H:%M:%S%.3f)")
}

pub struct LoggerConfig<'a> {
    pub level: LogLevel,
    pub file_level: LogLevel,
    pub dir_path: &'a str,
    pub filename_log: &'a str,
    pub disable_file_logging: bool,
    pub disable_file_log_date_based: bool,
    pub disable_colors: bool,
    pub module_logs: &'a [ModuleConfig],
    pub datetime_format: &'a str,
}

// Color a fragment of a log line, unless colors were disabled
pub fn colorize<D: Display>(color: Color, value: D) -> String {
    if COLORS_ENABLED.load(Ordering::Relaxed) {
        format!("\x1B[{}m{}\x1B[0m", color.to_fg_str(), value)
    } else {
        value.to_string()
    }
}

// Install the global logger: colored console output and an optional log file
pub fn setup_logger(config: LoggerConfig<'_>) -> Result<(), LoggerError> {
    COLORS_ENABLED.store(!config.disable_colors, Ordering::Relaxed);

    let colors = ColoredLevelConfig::new()
        .debug(Color::Green)
        .info(Color::Cyan)
        .warn(Color::Yellow)
        .error(Color::Red)
        .trace(Color::Magenta);

    let disable_colors = config.disable_colors;
    let datetime_format = config.datetime_format.to_owned();
    let mut stdout = fern::Dispatch::new()
        .format(move |out, message, record| {
            let date = chrono::Local::now().format(&datetime_format);
            if disable_colors {
                out.finish(format_args!("{} {} > {}", date, record.level(), message))
            } else {
                out.finish(format_args!(
                    "\x1B[90m{}\x1B[0m {} > {}",
                    date,
                    colors.color(record.level()),
                    message
                ))
            }
        })
        .level(config.level.into())
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new().level(LevelFilter::Trace);
    for module in config.module_logs {
        stdout = stdout.level_for(module.module.clone(), module.level.into());
    }
    dispatch = dispatch.chain(stdout);

    if !config.disable_file_logging {
        let dir = Path::new(config.dir_path);
        fs::create_dir_all(dir)?;

        let datetime_format = config.datetime_format.to_owned();
        let mut file = fern::Dispatch::new()
            .format(move |out, message, record| {
                let date = chrono::Local::now().format(&datetime_format);
                out.finish(format_args!(
                    "{} [{}] [{}] {}",
                    date,
                    record.level(),
                    record.target(),
                    // strip color escapes from colorized fragments
                    strip_colors(&message.to_string())
                ))
            })
            .level(config.file_level.into());

        for module in config.module_logs {
            file = file.level_for(module.module.clone(), module.level.into());
        }

        file = if config.disable_file_log_date_based {
            file.chain(fern::log_file(dir.join(config.filename_log))?)
        } else {
            let prefix = format!("{}/", dir.display());
            file.chain(fern::DateBased::new(prefix, format!("%Y-%m-%d.{}", config.filename_log)))
        };
        dispatch = dispatch.chain(file);
    }

    dispatch.apply()?;
    log_panics::init();

    Ok(())
}

fn strip_colors(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\x1B' {
            // skip until the end of the escape sequence
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}
