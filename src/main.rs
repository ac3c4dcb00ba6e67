use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use rumbo::config::{ConfigError, Settings};
use rumbo::utils::format_duration;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rumbo")]
#[command(about = "Health-aware read/write query router for replicated database clusters")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Rumbo Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an example configuration file
    Config {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { output } => {
            generate_config(output)?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

fn generate_config(output: PathBuf) -> anyhow::Result<()> {
    println!("Generating configuration file: {:?}", output);

    Settings::create_example_config(&output)
        .with_context(|| format!("Failed to generate config at {:?}", output))?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment, then load it with");
    println!("  Settings::load_from_file({:?})", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> anyhow::Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Settings::load_from_file(&config_path) {
        Ok(settings) => {
            init_logging(&settings);
            info!("Configuration loaded from: {:?}", config_path);

            println!("✓ Configuration file is valid");
            println!("  Primary: {} ({})", settings.primary.url, settings.primary.locality);
            println!("  Selection policy: {}", settings.routing.policy);
            println!(
                "  Health probe interval: {} (timeout {}ms)",
                format_duration(Duration::from_millis(settings.health.interval_ms)),
                settings.health.probe_timeout_ms
            );
            println!("  Replicas: {} instances", settings.replicas.len());
            for (i, replica) in settings.replicas.iter().enumerate() {
                println!(
                    "    {}: {} locality={} priority={} enabled={}",
                    i + 1,
                    replica.url,
                    replica.locality,
                    replica.priority,
                    replica.enabled
                );
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(e.into());
        }
    }

    Ok(())
}

fn show_version() {
    println!("rumbo v{}", env!("CARGO_PKG_VERSION"));
    println!("Health-aware read/write query router for replicated database clusters");
    println!();
    println!("Features:");
    println!("  • Round-robin, least-connections, and latency-based replica selection");
    println!("  • Locality-affinity read routing");
    println!("  • Background health probing with live-traffic feedback");
    println!("  • Bounded read retries with primary failover");
    println!("  • Routing and latency statistics aggregation");
}

fn init_logging(settings: &Settings) {
    let log_level = match settings.logging.level.as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();
}
