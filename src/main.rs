// DiVE - Die Vergleichs-Explorer
// CLI entry point: run the web server or inspect a coin list offline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dive::graph::{build_die_graph, coin_edges, connected_components, EdgeMode};
use dive::ingest::load_coin_table;
use dive::server::{self, ServerConfig};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dive", version, about = "Interactive die-link visualization for coin hoards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server and UI
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind
        #[arg(long, default_value_t = 8050)]
        port: u16,
        /// Directory served under /assets (local coin images)
        #[arg(long, default_value = "assets")]
        assets_dir: PathBuf,
        /// Row count above which an upload needs confirmation
        #[arg(long, default_value_t = dive::DEFAULT_ROW_LIMIT)]
        row_limit: usize,
        /// Restrict /img_proxy to these hosts (repeatable; default: any)
        #[arg(long = "allow-image-host")]
        allowed_image_hosts: Vec<String>,
    },
    /// Summarize a CSV coin list on the command line
    Inspect {
        /// Path to the CSV file (Latin-1 encoded)
        csv: PathBuf,
        /// Column holding the front die
        #[arg(long, default_value = "front die")]
        front: String,
        /// Column holding the back die
        #[arg(long, default_value = "back die")]
        back: String,
        /// Column holding the front image
        #[arg(long, default_value = "front img")]
        front_img: String,
        /// Column holding the back image
        #[arg(long, default_value = "back img")]
        back_img: String,
        /// Edge condition for the coin graph
        #[arg(long, value_enum, default_value_t = EdgeMode::Front)]
        edge_mode: EdgeMode,
        /// Column holding the coin id (default: first column)
        #[arg(long)]
        id_column: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dive=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            assets_dir,
            row_limit,
            allowed_image_hosts,
        } => {
            let config = ServerConfig {
                host,
                port,
                assets_dir,
                row_limit,
                allowed_image_hosts: if allowed_image_hosts.is_empty() {
                    None
                } else {
                    Some(allowed_image_hosts)
                },
            };
            server::run(config).await?;
        }
        Commands::Inspect {
            csv,
            front,
            back,
            front_img,
            back_img,
            edge_mode,
            id_column,
        } => {
            inspect(
                &csv,
                &front,
                &back,
                &front_img,
                &back_img,
                edge_mode,
                id_column.as_deref(),
            )?;
        }
    }

    Ok(())
}

fn inspect(
    csv: &PathBuf,
    front: &str,
    back: &str,
    front_img: &str,
    back_img: &str,
    edge_mode: EdgeMode,
    id_column: Option<&str>,
) -> Result<()> {
    let bytes = std::fs::read(csv)?;
    let table = load_coin_table(&bytes, id_column)?;

    println!("📋 {} — {} coins", csv.display(), table.len());
    println!();
    println!("Columns:");
    for (raw, safe) in table.key_map.iter() {
        println!("  {:<24} -> {}", raw, safe);
    }

    let front_key = table.key_map.resolve(front);
    let back_key = table.key_map.resolve(back);
    let front_img_key = table.key_map.resolve(front_img);
    let back_img_key = table.key_map.resolve(back_img);

    let edges = coin_edges(&table.coins, &front_key, &back_key, edge_mode);
    let coin_components = connected_components(
        table.coins.iter().map(|c| c.id.as_str()),
        edges.iter().map(|e| (e.source.as_str(), e.target.as_str())),
    );

    let no_hidden_coins: HashSet<String> = HashSet::new();
    let no_hidden_dies: HashSet<String> = HashSet::new();
    let die_graph = build_die_graph(
        &table.coins,
        &front_key,
        &back_key,
        &no_hidden_coins,
        &no_hidden_dies,
        &front_img_key,
        &back_img_key,
    );
    let die_components = connected_components(
        die_graph.nodes.keys().map(|s| s.as_str()),
        die_graph
            .edges
            .keys()
            .map(|(a, b)| (a.as_str(), b.as_str())),
    );

    println!();
    println!("Coin graph ({} edges):", edge_mode.name());
    println!(
        "  {} coins, {} edges, {} components",
        table.len(),
        edges.len(),
        coin_components
    );
    println!();
    println!("Die graph:");
    println!(
        "  {} dies, {} pairings, {} components",
        die_graph.nodes.len(),
        die_graph.edges.len(),
        die_components
    );

    Ok(())
}
