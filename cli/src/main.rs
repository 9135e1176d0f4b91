//! codelens - semantic code search from the command line

use clap::Parser;
use codelens_cli::Cli;
use codelens_cli::load_config;
use codelens_cli::run;
use color_eyre::Result;
use tracing::Level;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let builder = FmtSubscriber::builder().with_writer(std::io::stderr);
    if std::env::var_os("RUST_LOG").is_some() {
        tracing::subscriber::set_global_default(
            builder.with_env_filter(EnvFilter::from_default_env()).finish(),
        )?;
    } else {
        let log_level = match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        tracing::subscriber::set_global_default(builder.with_max_level(log_level).finish())?;
    }

    let config = load_config(cli.config.as_ref(), |key| std::env::var(key).ok())?;
    info!(index = %config.index.name, "Loaded configuration");

    let output = run(&cli.command, &config).await?;
    println!("{output}");
    Ok(())
}
