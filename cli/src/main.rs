//! Opm is the command-line entrypoint: parse, initialize tracing the way
//! the teacher's controller does (pretty when attached to a terminal, JSON
//! otherwise), wire SIGINT/SIGTERM into a [`CancellationToken`], dispatch to
//! a subcommand, and map any returned error to the §6 exit code table.
use std::process;

use clap::Parser;
use is_terminal::IsTerminal;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*};

mod cli;
mod commands;
mod error;
mod output;

use cli::{Cli, Commands, ConfigCommands, ModCommands};

fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let collector = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(if std::io::stderr().is_terminal() {
            Some(tracing_subscriber::fmt::layer())
        } else {
            None
        })
        .with(if std::io::stderr().is_terminal() {
            None
        } else {
            Some(tracing_subscriber::fmt::layer().json())
        });
    let _ = tracing::subscriber::set_global_default(collector);
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    rt.spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!("failed to install SIGTERM handler: {e}");
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        signal_cancel.cancel();
    });

    let code = rt.block_on(dispatch(cli, &cancel));
    process::exit(code);
}

async fn dispatch(cli: Cli, cancel: &CancellationToken) -> i32 {
    let result = run(&cli, cancel).await;
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    }
}

async fn run(cli: &Cli, cancel: &CancellationToken) -> error::Result<i32> {
    match &cli.command {
        Commands::Mod(ModCommands::Init(args)) => {
            commands::mod_init(args)?;
            Ok(0)
        }
        Commands::Mod(ModCommands::Vet(args)) => {
            commands::mod_vet(cli, args)?;
            Ok(0)
        }
        Commands::Mod(ModCommands::Build(args)) => {
            commands::mod_build(cli, args)?;
            Ok(0)
        }
        Commands::Mod(ModCommands::Apply(args)) => {
            commands::mod_apply(cli, args, cancel).await?;
            Ok(0)
        }
        Commands::Mod(ModCommands::Diff(args)) => {
            commands::mod_diff(cli, args).await?;
            Ok(0)
        }
        Commands::Mod(ModCommands::Delete(args)) => {
            commands::mod_delete(cli, args).await?;
            Ok(0)
        }
        Commands::Mod(ModCommands::Status(args)) => commands::mod_status(cli, args, cancel).await,
        Commands::Mod(ModCommands::Events(args)) => {
            commands::mod_events(cli, args).await?;
            Ok(0)
        }
        Commands::Config(ConfigCommands::Init(args)) => {
            commands::config_init(args)?;
            Ok(0)
        }
        Commands::Config(ConfigCommands::Vet(args)) => {
            commands::config_vet(args)?;
            Ok(0)
        }
    }
}
