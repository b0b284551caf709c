use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use teaspin_core::{
    Category, FileSnapshotStore, ItemId, ItemStore, JsonFileItemStore, ProvablyFairRng,
    RandSource, SizeAdvisory, SlotMachine, SlotSource, SpinEngine, IDEAL_REEL_SIZE,
};

mod display;
mod http_store;
mod shell;

use display::TerminalDisplay;
use http_store::HttpItemStore;

#[derive(Parser)]
#[command(name = "teaspin", about = "Spin the reel to pick today's drink")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Item table service URL; without it items live in a local file
    #[arg(long, env = "TEASPIN_SERVER")]
    server: Option<String>,
    /// Write key for the item table service
    #[arg(long, env = "TEASPIN_API_KEY", default_value = "dev-key")]
    api_key: String,
    /// Directory for the offline item file and the reel snapshot
    #[arg(long, env = "TEASPIN_DATA_DIR", default_value = ".teaspin")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Spin the reel
    Spin {
        /// Reproducible draw as SERVER_SEED:CLIENT_SEED:NONCE
        #[arg(long)]
        seed: Option<String>,
    },
    /// Manage the core library
    #[command(subcommand)]
    Library(LibraryCommand),
    /// Manage the items loaded onto the reel
    #[command(subcommand)]
    Active(ActiveCommand),
    /// Interactive session with the item manager
    Shell,
}

#[derive(Subcommand)]
enum LibraryCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        category: Option<String>,
    },
    Remove {
        id: String,
    },
}

#[derive(Subcommand)]
enum ActiveCommand {
    List,
    /// Load a library item onto the reel (repeat to weight it)
    Add {
        id: String,
    },
    /// Unload the reel entry at a position
    Remove {
        index: usize,
    },
}

fn engine(seed: Option<&str>) -> anyhow::Result<SpinEngine> {
    let source: Box<dyn SlotSource> = match seed {
        Some(spec) => {
            let rng = ProvablyFairRng::parse(spec)
                .ok_or_else(|| anyhow::anyhow!("seed must look like SERVER:CLIENT:NONCE"))?;
            eprintln!("server seed hash {}", rng.server_seed_hash_hex());
            Box::new(rng)
        }
        None => Box::new(RandSource::from_entropy()),
    };
    Ok(SpinEngine::new(source, Arc::new(TerminalDisplay::default())))
}

pub(crate) fn parse_category(label: &str) -> anyhow::Result<Category> {
    Category::parse(label).ok_or_else(|| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        anyhow::anyhow!("unknown category {label:?}; expected one of {}", known.join(", "))
    })
}

pub(crate) fn print_advisory(advisory: SizeAdvisory) {
    let hint = match advisory {
        SizeAdvisory::Ideal => return,
        SizeAdvisory::BelowIdeal => "few",
        SizeAdvisory::AboveIdeal => "many",
    };
    eprintln!(
        "hint: the reel reads best with {}-{} items; it has {hint} right now",
        IDEAL_REEL_SIZE.start(),
        IDEAL_REEL_SIZE.end()
    );
}

async fn run<S: ItemStore>(
    command: Commands,
    machine: SlotMachine<S, FileSnapshotStore>,
) -> anyhow::Result<()> {
    let report = machine.load().await?;
    if report.seeded {
        eprintln!("seeded the library with {} default drinks", report.library_len);
    }
    if report.placeholders > 0 {
        eprintln!(
            "warning: the item store refused {} default drinks; they are kept for this session only",
            report.placeholders
        );
    }

    match command {
        Commands::Spin { .. } => match machine.spin().await {
            Some(handle) => {
                let item = handle
                    .landed()
                    .await
                    .ok_or_else(|| anyhow::anyhow!("the reel stopped without a result"))?;
                println!("result: {}", item.name);
            }
            None => anyhow::bail!("the reel is empty; load some items first"),
        },
        Commands::Library(LibraryCommand::List) => {
            for item in machine.core_library().await {
                println!("{:>40}  {:<10} {}", item.id, item.shelf(), item.name);
            }
        }
        Commands::Library(LibraryCommand::Add { name, category }) => {
            let category = category.as_deref().map(parse_category).transpose()?;
            let item = machine.add_to_core_library(&name, category).await?;
            println!("added {} ({})", item.name, item.id);
        }
        Commands::Library(LibraryCommand::Remove { id }) => {
            let purged = machine.remove_from_core_library(&ItemId::new(id)).await?;
            println!("removed; {purged} reel entries went with it");
            print_advisory(machine.advisory().await);
        }
        Commands::Active(ActiveCommand::List) => {
            for (index, item) in machine.active_set().await.iter().enumerate() {
                println!("{index:>3}  {}", item.name);
            }
            print_advisory(machine.advisory().await);
        }
        Commands::Active(ActiveCommand::Add { id }) => {
            let id = ItemId::new(id);
            let item = machine
                .core_library()
                .await
                .into_iter()
                .find(|item| item.id == id)
                .ok_or(teaspin_core::ReelError::InvalidReference(id))?;
            machine.add_to_active_set(&item).await?;
            println!("loaded {}", item.name);
            print_advisory(machine.advisory().await);
        }
        Commands::Active(ActiveCommand::Remove { index }) => {
            let item = machine.remove_from_active_set(index).await?;
            println!("unloaded {}", item.name);
            print_advisory(machine.advisory().await);
        }
        Commands::Shell => shell::run(&machine).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let seed = match &cli.command {
        Commands::Spin { seed } => seed.clone(),
        _ => None,
    };
    let engine = engine(seed.as_deref())?;
    let snapshots = FileSnapshotStore::new(cli.data_dir.join("active.json"));

    match cli.server.as_deref() {
        Some(url) => {
            let store = HttpItemStore::new(url, cli.api_key.clone());
            run(cli.command, SlotMachine::new(store, snapshots, engine)).await
        }
        None => {
            let store = JsonFileItemStore::new(cli.data_dir.join("items.json"));
            run(cli.command, SlotMachine::new(store, snapshots, engine)).await
        }
    }
}
