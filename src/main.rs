//! CLI entry point for bakehouse

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bakehouse")]
#[command(version)]
#[command(about = "Incremental static site baker with a live preview server", long_about = None)]
struct Cli {
    /// Set the site root (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bake the site into the output directory
    #[command(alias = "b")]
    Bake {
        /// Rebuild every file, ignoring timestamps
        #[arg(short, long)]
        full: bool,

        /// Rebake when files change
        #[arg(short, long)]
        watch: bool,
    },

    /// Bake, then start the preview server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind to (defaults to the configured address)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Remove the bake output and the render cache
    Clean,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "bakehouse=debug,info"
    } else {
        "bakehouse=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let root_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Can't determine the current directory")?,
    };
    let site = bakehouse::Site::new(&root_dir)?;

    match cli.command {
        Commands::Bake { full, watch } => {
            let baked = site.bake(full)?;
            println!("Baked {} files into {:?}", baked.len(), site.bake_dir);

            if watch {
                bakehouse::commands::bake::watch(&site, full)?;
            }
        }

        Commands::Serve { port, address } => {
            let port = port.unwrap_or(site.config.server.port);
            let address = address.unwrap_or_else(|| site.config.server.address.clone());
            bakehouse::commands::serve::run(&site, &address, port).await?;
        }

        Commands::Clean => {
            site.clean()?;
            println!("Cleaned successfully!");
        }
    }

    Ok(())
}
