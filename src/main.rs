use anyhow::Result;
use clap::{Parser, Subcommand};
use kgbridge::discovery::{CheckpointStore, DiscoverySettings};
use kgbridge::entity::parse_seeds;
use kgbridge::{discover, Config, DiscoveryRequest, HttpRelationshipSource};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kgbridge")]
#[command(about = "Discover how biomedical entities connect inside a relationship graph")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the subgraph connecting two or more seed entities
    Discover {
        /// Seed CURIEs, e.g. HGNC:2908 HGNC:2364
        #[arg(required = true, num_args = 2..)]
        seeds: Vec<String>,

        /// Hop bound (defaults to discovery.max_depth)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Only follow this predicate
        #[arg(long)]
        predicate: Option<String>,

        /// Neighbors kept per expanded node (defaults to discovery.fan_out_cap)
        #[arg(long)]
        fan_out_cap: Option<usize>,

        /// Write the JSON payload here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Neither read nor write checkpoints for this run
        #[arg(long)]
        no_checkpoint: bool,
    },
    /// Inspect or delete the checkpoint of a seed set
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
}

#[derive(Subcommand, Debug)]
enum CheckpointAction {
    /// Print a summary of the stored checkpoint
    Show {
        #[arg(required = true)]
        seeds: Vec<String>,
    },
    /// Delete the stored checkpoint
    Clear {
        #[arg(required = true)]
        seeds: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.kgbridge.log_level)
    ).init();

    match args.command {
        Command::Discover {
            seeds,
            max_depth,
            predicate,
            fan_out_cap,
            output,
            no_checkpoint,
        } => {
            let request = DiscoveryRequest {
                seed_entity_ids: seeds,
                max_depth,
                predicate,
                fan_out_cap,
            };
            run_discover(&config, request, output, no_checkpoint).await?;
        }
        Command::Checkpoint { action } => match action {
            CheckpointAction::Show { seeds } => show_checkpoint(&config, &seeds)?,
            CheckpointAction::Clear { seeds } => clear_checkpoint(&config, &seeds)?,
        },
    }

    Ok(())
}

async fn run_discover(
    config: &Config,
    request: DiscoveryRequest,
    output: Option<PathBuf>,
    no_checkpoint: bool,
) -> Result<()> {
    let source = HttpRelationshipSource::from_config(&config.source)?;
    log::info!("Relationship source: {}", source.base_url());

    let mut settings = DiscoverySettings::from_config(config);
    if no_checkpoint {
        settings.checkpoint = None;
    }

    let result = discover(&source, &request, &settings).await?;
    let json = serde_json::to_string_pretty(&result)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            log::info!("Wrote graph to {}", path.display());
        }
        None => println!("{}", json),
    }

    let stats = &result.stats;
    log::info!(
        "{} paths, {} nodes, {} edges ({} failed nodes, {} network calls, {} cache hits)",
        stats.path_count,
        stats.pruned_node_count,
        stats.pruned_edge_count,
        stats.failed_node_count,
        stats.network_calls,
        stats.cache_hits
    );
    if stats.path_count == 0 {
        log::info!("No connecting paths within {} hops", stats.max_depth);
    }

    Ok(())
}

/// Store at the configured location, even when checkpointing is disabled for runs.
fn checkpoint_store(config: &Config) -> CheckpointStore {
    CheckpointStore::new(
        &config.checkpoint.dir,
        config.checkpoint.interval,
        config.checkpoint.freshness(),
    )
}

fn validated_seeds(raw: &[String]) -> Result<Vec<String>> {
    Ok(parse_seeds(raw)?.into_iter().map(String::from).collect())
}

fn show_checkpoint(config: &Config, raw: &[String]) -> Result<()> {
    let seeds = validated_seeds(raw)?;
    let store = checkpoint_store(config);

    let Some(state) = store.load(&seeds)? else {
        println!("No checkpoint for {}", seeds.join(", "));
        return Ok(());
    };

    println!("\n=== Checkpoint: {} ===\n", store.path_for(&seeds).display());
    println!("Seeds:           {}", state.entities.join(", "));
    println!("Max depth:       {}", state.max_depth);
    println!("Fan-out cap:     {}", state.fan_out_cap);
    println!(
        "Predicate:       {}",
        if state.predicate.is_empty() { "*" } else { state.predicate.as_str() }
    );
    println!("Saved at:        {}", state.timestamp.to_rfc3339());
    println!("Nodes visited:   {}", state.visited.len());
    println!("Nodes processed: {}", state.processed_count);
    println!("Still queued:    {}", state.queue.len());
    println!("Failed nodes:    {}", state.failed_nodes.len());
    println!(
        "Cached queries:  {} ({} failures)",
        state.cache.len(),
        state.cache.iter().filter(|(_, tuples)| tuples.is_none()).count()
    );

    Ok(())
}

fn clear_checkpoint(config: &Config, raw: &[String]) -> Result<()> {
    let seeds = validated_seeds(raw)?;
    if checkpoint_store(config).clear(&seeds)? {
        println!("Checkpoint cleared for {}", seeds.join(", "));
    } else {
        println!("No checkpoint for {}", seeds.join(", "));
    }
    Ok(())
}
