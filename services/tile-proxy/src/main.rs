//! Tile proxy server
//!
//! Local HTTP proxy that corrects boundary lines on raster map tiles.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use pmtiles_reader::ArchiveReader;
use tile_proxy::corrector::load_corrections;
use tile_proxy::{ProxyConfig, TileInterceptor};

#[derive(Parser, Debug)]
#[command(name = "tile-proxy")]
#[command(about = "Corrective proxy for raster map tiles")]
struct Cli {
    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG", global = true)]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long, env = "TILE_PROXY_WORKER_THREADS", global = true)]
    worker_threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the proxy until interrupted
    Serve {
        #[command(flatten)]
        proxy: ProxyConfig,

        /// Serve Prometheus metrics on this address
        #[arg(long, env = "TILE_PROXY_METRICS_ADDR")]
        metrics_addr: Option<SocketAddr>,
    },

    /// Print the header, metadata and contents of a correction archive
    Inspect {
        archive: PathBuf,

        /// List every addressed tile with its feature counts
        #[arg(long)]
        tiles: bool,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = cli.worker_threads {
        runtime_builder.worker_threads(threads);
    }
    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    match cli.command {
        Command::Serve {
            proxy,
            metrics_addr,
        } => serve(proxy, metrics_addr).await,
        Command::Inspect { archive, tiles } => inspect(archive, tiles),
    }
}

async fn serve(config: ProxyConfig, metrics_addr: Option<SocketAddr>) -> Result<()> {
    if let Some(addr) = metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(address = %addr, "Prometheus metrics exporter listening");
    }

    info!("Starting tile proxy");
    let interceptor = TileInterceptor::from_config(config)?;
    let port = interceptor
        .enable()
        .await
        .context("Failed to start tile proxy")?;

    if let Some(example) = interceptor
        .proxy_url("https://tile.openstreetmap.org/5/16/10.png")
        .await
    {
        info!(port, example = %example, "Ready");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    interceptor.disable().await;
    let stats = interceptor.state().corrector.cache().stats().await;
    info!(
        requests = interceptor.state().metrics.snapshot().requests,
        cache_hits = stats.hits,
        cache_misses = stats.misses,
        cache_hit_rate = stats.hit_rate(),
        "Tile proxy exited"
    );
    Ok(())
}

fn inspect(path: PathBuf, list_tiles: bool) -> Result<()> {
    let reader = ArchiveReader::open(&path)
        .with_context(|| format!("Failed to open archive: {}", path.display()))?;
    let header = reader.header();

    println!("Archive: {}", path.display());
    println!("  version:              {}", header.version);
    println!("  tile type:            {}", header.tile_type.name());
    println!("  tile compression:     {}", header.tile_compression.name());
    println!("  internal compression: {}", header.internal_compression.name());
    println!("  zoom:                 {}..={}", header.min_zoom, header.max_zoom);
    println!(
        "  bounds:               ({:.5}, {:.5}) - ({:.5}, {:.5})",
        header.min_position.0, header.min_position.1, header.max_position.0, header.max_position.1
    );
    println!(
        "  entries:              {} addressed, {} entries, {} contents",
        header.addressed_tiles, header.tile_entries, header.tile_contents
    );

    let metadata = reader.metadata().context("Failed to read metadata")?;
    println!(
        "Metadata:\n{}",
        serde_json::to_string_pretty(&metadata).context("Failed to format metadata")?
    );

    let coords = reader.tile_coords().context("Failed to walk directories")?;
    println!("Tiles: {}", coords.len());

    let mut totals: BTreeMap<&'static str, usize> = BTreeMap::new();
    for coord in coords {
        let set = load_corrections(&reader, coord)
            .with_context(|| format!("Failed to read tile {}", coord))?;
        let counts = set.feature_counts();
        if list_tiles {
            let line: Vec<String> = counts.iter().map(|(l, n)| format!("{}={}", l, n)).collect();
            println!("  {} {}", coord, line.join(" "));
        }
        for (layer, n) in counts {
            *totals.entry(layer).or_default() += n;
        }
    }

    println!("Features per layer:");
    for (layer, n) in totals {
        println!("  {:<12} {}", layer, n);
    }
    Ok(())
}
