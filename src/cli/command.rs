use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (ac3 ",
    env!("AC3_VERSION"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Encode PCM audio to AC-3 and inspect AC-3 bitstreams",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on first warning).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Encode a 16-bit PCM WAV file to AC-3.
    Encode(EncodeArgs),

    /// Print stream information
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct EncodeArgs {
    /// Input WAV file (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output AC-3 file (use "-" for stdout). Defaults to the input with an .ac3 extension.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Bit rate in bits per second.
    #[arg(long, value_name = "BPS")]
    pub bitrate: Option<u32>,

    /// YAML encoding profile. Command line options override its values.
    #[arg(long, value_name = "PROFILE")]
    pub config: Option<PathBuf>,

    /// Channel bandwidth code (0-60).
    #[arg(long, value_name = "CODE")]
    pub bandwidth: Option<u8>,

    /// Dialogue level in -dBFS (1-31).
    #[arg(long, value_name = "DB")]
    pub dialnorm: Option<u8>,

    /// Bitstream mode (0-7).
    #[arg(long, value_name = "MODE")]
    pub bsmod: Option<u8>,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input AC-3 bitstream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Print the summary as YAML.
    #[arg(long)]
    pub yaml: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

impl Cli {
    /// Level at which recoverable stream problems become errors.
    pub fn fail_level(&self) -> log::Level {
        if self.strict {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_flags_parse() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "ac3enc",
            "--strict",
            "encode",
            "in.wav",
            "-o",
            "out.ac3",
            "--bitrate",
            "384000",
            "--dialnorm",
            "27",
        ])?;

        assert_eq!(cli.fail_level(), log::Level::Warn);
        let Commands::Encode(args) = cli.command else {
            anyhow::bail!("expected the encode command");
        };
        assert_eq!(args.output, Some(PathBuf::from("out.ac3")));
        assert_eq!(args.bitrate, Some(384000));
        assert_eq!(args.dialnorm, Some(27));
        assert_eq!(args.bandwidth, None);
        Ok(())
    }

    #[test]
    fn global_flags_follow_the_subcommand() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["ac3enc", "info", "-", "--yaml", "--log-format", "json"])?;

        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(cli.command, Commands::Info(InfoArgs { yaml: true, .. })));
        Ok(())
    }
}
