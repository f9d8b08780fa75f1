use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use opi::{archive, restore, Commit, CodecId, Engine, EngineConfig, FsStorage};

#[derive(Parser)]
#[command(name = "opi", about = "content-addressed, deduplicating filesystem snapshots")]
struct Cli {
    /// Directory backing the single-directory-file storage backend.
    #[arg(long, global = true, default_value = "opi-store")]
    store: PathBuf,

    /// Codec applied to object bodies before storage.
    #[arg(long, global = true, default_value = "zstd")]
    codec: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot a directory and record it under a name.
    Archive { source: PathBuf, name: String },
    /// Rebuild a named snapshot into a destination directory.
    Restore { name: String, dest: PathBuf },
    /// List the snapshot names known to a store.
    List,
    /// Print the resolved commit for a snapshot name.
    Info { name: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let codec = match CodecId::from_name(&cli.codec) {
        Some(c) => c,
        None => {
            eprintln!("unknown codec: {}", cli.codec);
            return ExitCode::FAILURE;
        }
    };

    let storage = match FsStorage::open(&cli.store) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("failed to open store at {}: {e}", cli.store.display());
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Archive { source, name } => {
            let engine = Engine::new(storage.clone(), EngineConfig { codec, ..EngineConfig::default() });
            archive(&engine, &source, &name).map(|addr| println!("{addr}"))
        }
        Commands::Restore { name, dest } => {
            let engine = Engine::new(storage.clone(), EngineConfig { codec, ..EngineConfig::default() });
            restore(&engine, &name, &dest)
        }
        Commands::List => storage.list_keys().map(|names| {
            for n in names {
                println!("{n}");
            }
        }),
        Commands::Info { name } => {
            let engine = Engine::new(storage.clone(), EngineConfig { codec, ..EngineConfig::default() });
            engine.get_pointer(&name).and_then(|commit_addr| {
                let commit = Commit::from_bytes(&engine.fetch(&commit_addr)?)?;
                println!("date:    {}", commit.date);
                println!("tree:    {}", commit.tree);
                println!("host:    {}", commit.host);
                println!("replica: {}", commit.replica);
                println!("parents: {}", commit.parents.join(", "));
                Ok(())
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("opi: {e}");
            ExitCode::FAILURE
        }
    }
}
