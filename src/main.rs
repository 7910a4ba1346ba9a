use clap::Parser;
use guide_engine::cli::commands::{cmd_run, cmd_validate};
use guide_engine::cli::config::{Cli, Commands, log_filter, resolve_settings};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = resolve_settings(&cli);

    match cli.command {
        Commands::Validate { config } => {
            if !cmd_validate(&config, cli.verbose)? {
                std::process::exit(1);
            }
        }
        Commands::Run {
            scenario,
            config,
            store,
            analytics,
            output,
        } => {
            let all_passed = cmd_run(
                &scenario,
                config.as_deref(),
                store.as_deref(),
                analytics.as_deref(),
                output.as_deref(),
                &settings,
                cli.verbose,
            )?;
            if !all_passed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
