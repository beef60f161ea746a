//! Shared Snapshot Cache Tool
//!
//! Inspect the layout a set of cache settings produces and create the shared
//! cache file on a node's data paths.
//!
//! ```text
//! snapcache --cache-size 10gb layout
//! snapcache --region-size 16mb regions --file-size 100mb --header 2000 --footer 16
//! snapcache --cache-size 1gb --data-path /var/lib/node/data init
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use snapcache::cache::{MetricsSnapshot, TINY_REGION_SIZE};
use snapcache::{
    ByteSize, NodeDataPaths, RegionType, SharedBytes, SharedCacheConfiguration, SharedCacheSettings,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Shared snapshot cache - layout inspection and cache file management
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML settings file; flags override its values
    #[arg(long, env = "SNAPCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Total cache size (e.g. 10gb, 0 disables the cache)
    #[arg(long, env = "SNAPCACHE_CACHE_SIZE", value_parser = parse_byte_size)]
    cache_size: Option<ByteSize>,

    /// Large region size (e.g. 16mb)
    #[arg(long, env = "SNAPCACHE_REGION_SIZE", value_parser = parse_byte_size)]
    region_size: Option<ByteSize>,

    /// Share of the cache devoted to small regions
    #[arg(long, env = "SNAPCACHE_SMALL_REGION_SHARE")]
    small_region_share: Option<f64>,

    /// Share of the cache devoted to tiny regions
    #[arg(long, env = "SNAPCACHE_TINY_REGION_SHARE")]
    tiny_region_share: Option<f64>,

    /// Candidate data paths, in order of preference
    #[arg(long = "data-path", env = "SNAPCACHE_DATA_PATHS", value_delimiter = ',')]
    data_paths: Vec<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the region pools and file size the settings produce
    Layout,
    /// Print how a source file of the given size is split into regions
    Regions {
        /// Size of the source file
        #[arg(long, value_parser = parse_byte_size)]
        file_size: ByteSize,
        /// Requested header cache length
        #[arg(long, default_value_t = 0)]
        header: u64,
        /// Requested footer cache length
        #[arg(long, default_value_t = 0)]
        footer: u64,
    },
    /// Create the shared cache file, verify one page of each type, then remove it
    Init,
}

fn parse_byte_size(s: &str) -> Result<ByteSize, String> {
    s.parse().map_err(|e: snapcache::Error| e.to_string())
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let settings = load_settings(&args)?;
    let configuration =
        SharedCacheConfiguration::new(&settings).context("invalid shared cache settings")?;

    match &args.command {
        Command::Layout => print_layout(&settings, &configuration),
        Command::Regions {
            file_size,
            header,
            footer,
        } => print_regions(&configuration, file_size.bytes(), *header, *footer),
        Command::Init => init_cache_file(&args, configuration),
    }
}

fn load_settings(args: &Args) -> anyhow::Result<SharedCacheSettings> {
    let mut settings = match &args.config {
        Some(path) => SharedCacheSettings::from_yaml_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => SharedCacheSettings::default(),
    };

    if let Some(cache_size) = args.cache_size {
        settings.cache_size = cache_size;
    }
    if let Some(region_size) = args.region_size {
        settings.region_size = region_size;
    }
    if let Some(share) = args.small_region_share {
        settings.small_region_share = share;
    }
    if let Some(share) = args.tiny_region_share {
        settings.tiny_region_share = share;
    }
    Ok(settings)
}

// =============================================================================
// Commands
// =============================================================================

#[derive(Serialize)]
struct LayoutReport<'a> {
    settings: &'a SharedCacheSettings,
    total_size: u64,
    pools: Vec<PoolReport>,
}

#[derive(Serialize)]
struct PoolReport {
    region_type: RegionType,
    region_size: u64,
    regions: usize,
    first_page: usize,
    first_offset: Option<u64>,
}

fn print_layout(
    settings: &SharedCacheSettings,
    configuration: &SharedCacheConfiguration,
) -> anyhow::Result<()> {
    let pools = RegionType::ALL
        .iter()
        .map(|&region_type| {
            let pages = configuration.page_range(region_type);
            PoolReport {
                region_type,
                region_size: region_type.max_size(configuration),
                regions: pages.len(),
                first_page: pages.start,
                first_offset: (!pages.is_empty()).then(|| configuration.physical_offset(pages.start)),
            }
        })
        .collect();

    let report = LayoutReport {
        settings,
        total_size: configuration.total_size(),
        pools,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_regions(
    configuration: &SharedCacheConfiguration,
    file_size: u64,
    header: u64,
    footer: u64,
) -> anyhow::Result<()> {
    let header = configuration.effective_header_cache_range(header);
    let footer = configuration.effective_footer_cache_range(footer);
    let regions = configuration.file_regions(file_size, header, footer);

    println!(
        "file size {} | header {} | footer {} | {} large region(s)",
        ByteSize(file_size),
        ByteSize(header),
        ByteSize(footer),
        regions.large_regions()
    );
    println!("{:>8}  {:<6}  {:>14}  {:>14}", "REGION", "TYPE", "START", "LENGTH");
    for (region, region_type, range) in regions.iter() {
        println!(
            "{:>8}  {:<6}  {:>14}  {:>14}",
            region,
            region_type,
            range.start(),
            range.length()
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct InitReport {
    path: Option<PathBuf>,
    total_size: u64,
    metrics: MetricsSnapshot,
}

fn init_cache_file(args: &Args, configuration: SharedCacheConfiguration) -> anyhow::Result<()> {
    if args.data_paths.is_empty() {
        bail!("at least one --data-path is required");
    }

    let data_paths = NodeDataPaths::new(args.data_paths.iter().cloned());
    let shared_bytes =
        SharedBytes::new(configuration, &data_paths).context("failed to create shared cache file")?;

    let marker = vec![0xa5u8; TINY_REGION_SIZE as usize];
    let mut readback = vec![0u8; marker.len()];
    for region_type in RegionType::ALL {
        let Some(page) = configuration.page_range(region_type).next() else {
            continue;
        };
        let io = shared_bytes.get_io(page)?;
        let position = io.size() - TINY_REGION_SIZE;
        io.write_all(&marker, position)?;
        io.read_exact(&mut readback, position)?;
        if readback != marker {
            bail!("read back mismatch on {} page {}", region_type, page);
        }
        io.write_all(&vec![0u8; marker.len()], position)?;
        info!(page, %region_type, "Verified shared page");
    }
    shared_bytes.sync()?;

    let report = InitReport {
        path: shared_bytes.path().map(|p| p.to_path_buf()),
        total_size: configuration.total_size(),
        metrics: shared_bytes.metrics_snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    shared_bytes.close();
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
