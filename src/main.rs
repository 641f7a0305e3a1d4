use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::command::{Cli, Commands, LogFormat};
use cli::encode::cmd_encode;
use cli::info::cmd_info;

mod cli;
mod config;
mod input;
mod timestamp;
mod wav;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_builder = env_logger::Builder::from_default_env();
    env_builder.filter_level(cli.loglevel.to_level_filter());
    match cli.log_format {
        LogFormat::Plain => {
            env_builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            env_builder.format(|buf, record| {
                use std::io::Write;
                writeln!(
                    buf,
                    "{{\"ts\":\"{}\",\"lvl\":\"{}\",\"target\":\"{}\",\"msg\":{:?}}}",
                    buf.timestamp(),
                    record.level(),
                    record.target(),
                    record.args().to_string()
                )
            });
        }
    }

    let multi = MultiProgress::new();
    let pb = if cli.progress {
        let logger = env_builder.build();
        let level = logger.filter();
        LogWrapper::new(multi.clone(), logger).try_init()?;
        log::set_max_level(level);
        Some(&multi)
    } else {
        env_builder.try_init()?;
        None
    };

    match cli.command {
        Commands::Encode(ref args) => cmd_encode(args, &cli, pb)?,
        Commands::Info(ref args) => cmd_info(args, &cli, pb)?,
    }

    Ok(())
}
