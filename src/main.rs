pub mod types;
pub mod config;
pub mod data;
pub mod resolve;
pub mod classify;
pub mod report;
pub mod export;
pub mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify properties and write the cluster report and CSV
    Classify {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Classify properties and write GeoJSON layers for the web map
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the exported map with a point lookup API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn run_pipeline(app_config: &config::AppConfig) -> anyhow::Result<(resolve::Layers, classify::Classification)> {
    // 1. Load boundaries and properties
    let layers = data::load_layers(&app_config.input)?;
    let properties = data::load_properties(&app_config.input.properties_csv, &app_config.input.columns)?;

    // 2. Containment per level, then reclassification
    let located = resolve::resolve(properties, &layers);
    let classification = classify::classify(located, app_config.processing.min_properties);

    Ok((layers, classification))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Classify { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let (_, classification) = run_pipeline(&app_config)?;

            report::write_report(&app_config.output.report, &classification)?;
            report::write_classifications_csv(
                &app_config.output.classifications_csv,
                &classification,
                &app_config.input.columns,
            )?;

            report::print_summary(&classification.summary());
            println!("Report saved to {}", app_config.output.report.display());
            println!("Classification data saved to {}", app_config.output.classifications_csv.display());
        }
        Commands::Export { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let (layers, classification) = run_pipeline(&app_config)?;

            export::export_map_data(&app_config.output.map_dir, &layers, &classification)?;

            report::print_summary(&classification.summary());
            println!("Map data saved to {}", app_config.output.map_dir.display());
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let layers = data::load_layers(&app_config.input)?;

            server::start_server(app_config, layers).await?;
        }
    }

    Ok(())
}
