// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.                                                                          

use radiomesh::prelude::*;
use radiomesh::simulation::LocatorConfig;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[arg(short, long)]
        config: Option<String>,
        #[arg(short = 'n', long)]
        nodes: Option<u32>,
        #[arg(short, long)]
        ticks: Option<u64>,
        #[arg(long)]
        range: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        consul: Option<String>,
        #[arg(long)]
        mobility_concurrency: Option<usize>,
        #[arg(long)]
        link_concurrency: Option<usize>,
        #[arg(long)]
        deadline_ms: Option<u64>,
        #[arg(long)]
        mutual: bool,
    },

    Bench {
        #[arg(short = 'n', long, default_value_t = 1000)]
        nodes: u32,
        #[arg(long, default_value_t = 500.0)]
        range: f64,
        #[arg(long, default_value_t = 10_000.0)]
        volume: f64,
        #[arg(short, long, default_value_t = 10)]
        iterations: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let program_start = Instant::now();

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            config,
            nodes,
            ticks,
            range,
            seed,
            consul,
            mobility_concurrency,
            link_concurrency,
            deadline_ms,
            mutual,
        } => {
            let mut config = match config {
                Some(path) => SimConfig::load(&path)?,
                None => SimConfig::default(),
            };
            if let Some(nodes) = nodes {
                config.num_nodes = nodes;
            }
            if let Some(ticks) = ticks {
                config.ticks = ticks;
            }
            if let Some(range) = range {
                config.node.range = range;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(address) = consul {
                config.locator = LocatorConfig::Consul { address };
            }
            if let Some(k) = mobility_concurrency {
                config.mobility_concurrency = k;
            }
            if let Some(k) = link_concurrency {
                config.link_concurrency = k;
            }
            if deadline_ms.is_some() {
                config.tick_deadline_ms = deadline_ms;
            }
            if mutual {
                config.range_policy = RangePolicy::Mutual;
            }

            info!("radiomesh: Simulation Run");
            let mut sim = Simulation::from_config(config)?;
            sim.run().await?;
        }

        Commands::Bench { nodes, range, volume, iterations, seed } => {
            bench_discovery(nodes, range, volume, iterations, seed)?;
        }

        Commands::Config => {
            print!("{}", SimConfig::default().to_toml()?);
        }
    }

    let total_time = program_start.elapsed();
    info!("Total runtime: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

/// Times index build + range queries against the exhaustive scan on the same
/// population and checks both find the same edges.
fn bench_discovery(nodes: u32, range: f64, volume: f64, iterations: u32, seed: u64) -> Result<()> {
    if !(volume.is_finite() && volume >= 0.0) {
        bail!("volume must be finite and non-negative, got {}", volume);
    }
    let template = NodeTemplate { range, ..NodeTemplate::default() };
    let snapshot = NodeStateStore::populate(nodes, &template, volume, Some(seed)).snapshot();
    let discovery = NeighborDiscovery::new(RangePolicy::Source);
    let iterations = iterations.max(1);

    info!("Discovery benchmark: {} nodes, range {}, {}m cube, {} iterations", nodes, range, volume, iterations);

    let mut indexed = Vec::new();
    let mut indexed_time = Duration::ZERO;
    for _ in 0..iterations {
        let start = Instant::now();
        let index = NeighborDiscovery::build_index(&snapshot);
        indexed = discovery.discover(&snapshot, &index);
        indexed_time += start.elapsed();
    }

    let mut scanned = Vec::new();
    let mut scan_time = Duration::ZERO;
    for _ in 0..iterations {
        let start = Instant::now();
        scanned = discovery.scan_all_pairs(&snapshot);
        scan_time += start.elapsed();
    }

    if indexed != scanned {
        bail!("k-d tree found {} edges but the all-pairs scan found {}", indexed.len(), scanned.len());
    }

    let per_iter = |d: Duration| d.as_secs_f64() * 1000.0 / iterations as f64;
    println!("\nCandidate edges: {}", indexed.len());
    println!("k-d tree (build + query): {:>10.3} ms/iter", per_iter(indexed_time));
    println!("All-pairs scan:           {:>10.3} ms/iter", per_iter(scan_time));
    if indexed_time > Duration::ZERO {
        println!("Speedup: {:.1}x\n", scan_time.as_secs_f64() / indexed_time.as_secs_f64());
    }

    Ok(())
}
