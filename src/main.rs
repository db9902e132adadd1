use clap::Parser;
use tracing::{error, info};

use tickradar::app::App;
use tickradar::cli::{Cli, Commands, ConfigPathArg};
use tickradar::config::{Config, Environment};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_command(args, App::run).await,
        Commands::Radar(args) => run_command(args, App::run_radar).await,
        Commands::Executor(args) => run_command(args, App::run_executor).await,
        Commands::CheckConfig(args) => check_config(&args),
    }
}

async fn run_command<F, Fut>(args: ConfigPathArg, command: F)
where
    F: FnOnce(Config, Environment) -> Fut,
    Fut: std::future::Future<Output = tickradar::error::Result<()>>,
{
    let (config, env) = match load(&args) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    config.logging.init();
    info!(bot = %config.bot.name, "tickradar starting");

    if let Err(e) = command(config, env).await {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }

    info!("tickradar stopped");
}

fn check_config(args: &ConfigPathArg) {
    match load(args) {
        Ok((config, _)) => {
            println!("config ok: bot '{}' on {}", config.bot.name, config.executor.symbol);
        }
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    }
}

fn load(args: &ConfigPathArg) -> Result<(Config, Environment), tickradar::error::Error> {
    let config = Config::load(&args.config)?;
    let env = Environment::from_env()?;
    Ok((config, env))
}
