//! Prosopa CLI: maintenance commands for the entity graph.
//!
//! Usage:
//!   prosopa descendants <hierarchy> <id>... [--db path] [--config path]
//!   prosopa delete <entity> <id> [--dry-run]
//!   prosopa merge <relation> <primary> <secondary>
//!
//! Results are printed as JSON on stdout; logs and errors go to stderr.

use clap::{Parser, Subcommand};
use prosopa::{
    EngineConfig, EntityId, EntityType, HierarchyKind, IntegrityEngine, IntegrityError, IntegrityResult,
    SqliteStore,
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "prosopa",
    version,
    about = "Integrity maintenance for a prosopographic entity graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file (overrides the configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the descendant closure of hierarchy nodes
    Descendants {
        /// content, office or region
        hierarchy: HierarchyKind,
        #[arg(required = true)]
        ids: Vec<EntityId>,
    },
    /// Print the root-to-node path of hierarchy nodes
    Ancestors {
        /// content, office or region
        hierarchy: HierarchyKind,
        #[arg(required = true)]
        ids: Vec<EntityId>,
    },
    /// Delete an entity unless it is still referenced
    Delete {
        entity: EntityType,
        id: EntityId,
        /// Only evaluate the dependency checks
        #[arg(long)]
        dry_run: bool,
    },
    /// Merge one relation kind of a duplicate onto its canonical entity
    Merge {
        relation: String,
        primary: EntityId,
        secondary: EntityId,
    },
    /// Merge every relation kind declared for an entity type
    MergeEntity {
        entity: EntityType,
        primary: EntityId,
        secondary: EntityId,
    },
    /// Print the effective dependency rules and merge relations
    Rules,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PROSOPA_LOG").unwrap_or_else(|_| EnvFilter::new("prosopa=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig, String> {
    let config = match path {
        Some(path) => EngineConfig::load(&path),
        None => EngineConfig::load_default(),
    };
    config.map_err(|e| e.to_string())
}

fn open_engine(db: Option<PathBuf>, config: &EngineConfig) -> Result<IntegrityEngine, String> {
    let db_path = db.unwrap_or_else(|| config.db_path());
    let store = SqliteStore::open_with_timeout(&db_path, config.busy_timeout())
        .map_err(|e| format!("Failed to open database {}: {}", db_path.display(), e))?;
    let rules = config.rule_set().map_err(|e| e.to_string())?;
    let relations = config.relation_catalog().map_err(|e| e.to_string())?;
    Ok(IntegrityEngine::with_rules(store, rules, relations))
}

fn emit<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Exit code 2 marks a refusal by the dependency guard, 1 any other failure
fn report<T: Serialize>(result: IntegrityResult<T>) -> i32 {
    match result {
        Ok(value) => emit(&value),
        Err(e @ IntegrityError::Dependency { .. }) => {
            eprintln!("Refused: {}", e);
            2
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_delete(engine: &IntegrityEngine, entity: EntityType, id: EntityId, dry_run: bool) -> i32 {
    if dry_run {
        let result = engine
            .check(entity, id)
            .map(|()| json!({ "entity": entity, "id": id, "deletable": true }));
        return report(result);
    }
    report(engine.delete(entity, id))
}

fn cmd_rules(engine: &IntegrityEngine) -> i32 {
    emit(&json!({
        "dependencies": engine.rules(),
        "relations": engine.relations(),
    }))
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let engine = match load_config(cli.config).and_then(|config| open_engine(cli.db, &config)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Descendants { hierarchy, ids } => report(engine.descendants(hierarchy, &ids)),
        Commands::Ancestors { hierarchy, ids } => report(engine.ancestor_paths(hierarchy, &ids)),
        Commands::Delete { entity, id, dry_run } => cmd_delete(&engine, entity, id, dry_run),
        Commands::Merge {
            relation,
            primary,
            secondary,
        } => report(engine.merge(&relation, primary, secondary)),
        Commands::MergeEntity {
            entity,
            primary,
            secondary,
        } => report(engine.merge_entity(entity, primary, secondary)),
        Commands::Rules => cmd_rules(&engine),
    };
    std::process::exit(code);
}
