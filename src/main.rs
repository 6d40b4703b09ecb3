//! audiolith CLI: inspect persistent frame stores.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

use audiolith::frame::FrameStore;

#[derive(Parser)]
#[command(name = "audiolith", version, about = "Audio feature store inspector")]
struct Cli {
    /// Path to a frame store file.
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show schema name, analysis parameters, and row count.
    Info,

    /// List columns with their shapes and element types.
    Columns,

    /// Print the total frame row count.
    Rows,

    /// List stored patterns and their frame extents.
    Patterns,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let info = FrameStore::peek(&cli.store)?;

    match cli.command {
        Commands::Info => {
            println!("schema:      {}", info.schema_name);
            println!("sample rate: {} Hz", info.sample_rate);
            println!(
                "framing:     window {} / step {}",
                info.window_size, info.step_size
            );
            println!("rows:        {}", info.rows);
            println!("patterns:    {}", info.patterns.len());
        }

        Commands::Columns => {
            for column in &info.columns {
                let mut shape = vec![info.rows as usize];
                shape.extend_from_slice(&column.shape);
                let indexed = if column.indexed { "  [indexed]" } else { "" };
                println!("{:<24} {:?} {}{}", column.name, shape, column.dtype, indexed);
            }
        }

        Commands::Rows => {
            println!("{}", info.rows);
        }

        Commands::Patterns => {
            let mut patterns = info.patterns;
            patterns.sort();
            for (pattern, frames) in patterns {
                println!("{pattern:<32} {frames} frame(s)");
            }
        }
    }

    Ok(())
}
