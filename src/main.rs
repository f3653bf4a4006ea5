use clap::Parser;
use tubescribe::cli::{Cli, Commands};
use tubescribe::config::Config;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tubescribe=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run {
        video: None,
        output: None,
    });

    // Writing a fresh config must not depend on loading an existing one.
    if let Commands::InitConfig { force } = command {
        return tubescribe::commands::init_config(cli.config.as_deref(), force).map(|_| ());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    config.agent.apply_env(|name| std::env::var(name).ok());

    match command {
        Commands::Run { video, output } => {
            if let Some(dir) = output {
                config.output.directory = dir;
            }
            tubescribe::commands::run_pipeline(&config, video.as_deref())
        }
        Commands::Recover { input, output } => {
            if let Some(dir) = output {
                config.output.directory = dir;
            }
            tubescribe::commands::run_recover(&config, &input).map(|_| ())
        }
        Commands::Status { output } => {
            let dir = output.unwrap_or_else(|| config.output.directory.clone());
            tubescribe::commands::show_status(&dir, &config.output.prefix)
        }
        Commands::InitConfig { .. } => unreachable!("init-config is handled before config load"),
    }
}
