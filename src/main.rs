//! Room Layout CLI
//!
//! Usage:
//!   room-layout [OPTIONS] [FILE]
//!
//! Options:
//!   -r, --room <X> <Y> <Z>  Room dimensions when the document has none
//!   -c, --config <FILE>     Engine configuration (TOML format)
//!   -i, --intent <TEXT>     User intent; objects it names are never deleted
//!   -o, --output <FILE>     Write the resolved scene here instead of stdout
//!   -l, --lint              Report overlaps and containment defects
//!   -v, --verbose           Log the resolution at debug level
//!   -h, --help              Print help

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use room_layout::document::room_from_dimensions;
use room_layout::scene::lint;
use room_layout::{resolve_with_config, EngineConfig, ResolveConfig, ResolveError};

#[derive(Parser)]
#[command(name = "room-layout")]
#[command(about = "Resolve a furnished-room scene graph into positions and rotations")]
struct Cli {
    /// Scene document (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Room dimensions in meters, used when the document has none
    #[arg(short, long, num_args = 3, value_names = ["X", "Y", "Z"])]
    room: Option<Vec<f64>>,

    /// Engine configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// User intent; overrides the document's
    #[arg(short, long)]
    intent: Option<String>,

    /// Output file for the resolved scene
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report layout defects of the resolved scene on stderr
    #[arg(short, long)]
    lint: bool,

    /// Debug logging, including a dump of every resolved object
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "room_layout=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let engine = match &cli.config {
        Some(path) => match EngineConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let mut config = ResolveConfig::new()
        .with_engine(engine)
        .with_debug(cli.verbose);
    if let Some(dims) = &cli.room {
        match room_from_dimensions([dims[0], dims[1], dims[2]]) {
            Ok(room) => config = config.with_room(room),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
    if let Some(intent) = &cli.intent {
        config = config.with_user_intent(intent.clone());
    }

    let (source, filename) = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (content, path.display().to_string()),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => (buffer, "<stdin>".to_string()),
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let resolution = match resolve_with_config(&source, config) {
        Ok(r) => r,
        Err(ResolveError::Document(e)) => {
            eprint!("{}", e.format(&source, &filename));
            eprintln!();
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if let ResolveError::Engine(engine) = &e {
                if let Some(suggestions) = engine.suggestions().filter(|s| !s.is_empty()) {
                    eprintln!("  did you mean: {}?", suggestions.join(", "));
                }
            }
            std::process::exit(1);
        }
    };

    for deletion in &resolution.scene.deletions {
        eprintln!("deleted {}: {}", deletion.removed.join(", "), deletion.reason);
    }

    if cli.lint {
        let warnings = lint::check(&resolution.scene.objects, &resolution.scene.room);
        for warning in &warnings {
            eprintln!("{}", warning);
        }
    }

    let json = match resolution.to_json() {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    match &cli.output {
        Some(path) => {
            if let Err(e) = fs::write(path, json) {
                eprintln!("Error writing '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        }
        None => println!("{}", json),
    }
}
