//! Ontograph CLI — validate, canonicalize, and curate candidate triples.
//!
//! Usage:
//!   ontograph schema check <ontology.yaml>
//!   ontograph run --schema <ontology.yaml> --candidates <stream.jsonl> [--docs docs.json] [--db path]
//!   ontograph stats [--db path]
//!   ontograph export [--db path] [--out graph.json]

use clap::{Parser, Subcommand};
use ontograph::{
    CancellationToken, CanonConfig, CuratorApi, CuratorEngine, OpenStore, SqliteStore,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "ontograph",
    version,
    about = "Ontology-governed knowledge graph curation engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and check ontology files
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Validate a candidate stream and commit what passes
    Run {
        /// Path to the ontology YAML file
        #[arg(long)]
        schema: PathBuf,
        /// Path to the candidate stream (one JSON record per line)
        #[arg(long)]
        candidates: PathBuf,
        /// JSON map of document id to text length, for grounding checks
        #[arg(long)]
        docs: Option<PathBuf>,
        /// Canonicalization config YAML (threshold, alias groups)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Accept every queued repair instead of leaving them pending
        #[arg(long)]
        accept_repairs: bool,
        /// Path to SQLite database file (defaults to the user data dir)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show entity, triple, and audit counts for a saved graph
    Stats {
        /// Path to SQLite database file (defaults to the user data dir)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Export a saved graph as a JSON snapshot
    Export {
        /// Path to SQLite database file (defaults to the user data dir)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Parse an ontology file and report what it defines
    Check {
        /// Path to the ontology YAML file
        path: PathBuf,
    },
}

/// Get the default database path (~/.local/share/ontograph/ontograph.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let dir = data_dir.join("ontograph");
    std::fs::create_dir_all(&dir).ok();
    dir.join("ontograph.db")
}

fn read_to_string(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {}", path.display(), e))
}

fn cmd_schema_check(path: &Path) -> i32 {
    let source = match read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match ontograph::schema::load(&source) {
        Ok(snapshot) => {
            println!(
                "{}: version {}, {} classes, {} predicates, {} synonyms",
                path.display(),
                snapshot.version(),
                snapshot.class_count(),
                snapshot.predicate_count(),
                snapshot.synonym_count()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}: {}", path.display(), e);
            1
        }
    }
}

fn load_canon_config(path: Option<&Path>) -> Result<CanonConfig, String> {
    match path {
        Some(p) => {
            let source = read_to_string(p)?;
            serde_yaml::from_str(&source).map_err(|e| format!("invalid config '{}': {}", p.display(), e))
        }
        None => Ok(CanonConfig::default()),
    }
}

fn cmd_run(
    schema: &Path,
    candidates: &Path,
    docs: Option<&Path>,
    config: Option<&Path>,
    accept_repairs: bool,
    db: Option<PathBuf>,
) -> i32 {
    let source = match read_to_string(schema) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let snapshot = match ontograph::schema::load(&source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}: {}", schema.display(), e);
            return 1;
        }
    };
    let canon = match load_canon_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let engine = Arc::new(CuratorEngine::new(snapshot, canon));

    if let Some(docs_path) = docs {
        let raw = match read_to_string(docs_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };
        let lengths: HashMap<String, usize> = match serde_json::from_str(&raw) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Error: invalid docs file '{}': {}", docs_path.display(), e);
                return 1;
            }
        };
        for (doc_id, length) in lengths {
            engine.register_document(doc_id, length);
        }
    }

    let raw = match read_to_string(candidates) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let mut records = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ontograph::CandidateRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                eprintln!(
                    "Error: {}:{}: invalid candidate record: {}",
                    candidates.display(),
                    lineno + 1,
                    e
                );
                return 1;
            }
        }
    }

    // Same default as stats/export, so a plain `run` is visible to them.
    let db_path = db.unwrap_or_else(default_db_path);
    let api = match SqliteStore::open(&db_path) {
        Ok(store) => CuratorApi::with_backend(engine, Arc::new(store)),
        Err(e) => {
            eprintln!("Error: failed to open database: {}", e);
            return 1;
        }
    };

    let token = CancellationToken::new();
    let outcome = api.submit_records(records, &token);
    println!(
        "Processed {} candidates: {} committed, {} queued for repair, {} discarded",
        outcome.total(),
        outcome.committed.len(),
        outcome.queued.len(),
        outcome.discarded.len()
    );
    for (id, reason) in &outcome.discarded {
        println!("  discarded {}: {}", id, reason);
    }

    if accept_repairs {
        for pending in api.pending_repairs() {
            match api.accept_repair(pending.candidate.id) {
                Ok(triple) => println!("  repaired {} -> {}", pending.candidate.id, triple),
                Err(e) => eprintln!("  repair failed for {}: {}", pending.candidate.id, e),
            }
        }
    } else {
        for pending in api.pending_repairs() {
            println!("  pending repair {}: {} findings", pending.candidate.id, pending.findings.len());
        }
    }

    println!(
        "Graph now holds {} entities and {} triples",
        api.entity_count(),
        api.triple_count()
    );

    if let Err(e) = api.save() {
        eprintln!("Error: failed to save graph: {}", e);
        return 1;
    }
    0
}

fn open_saved(db: Option<PathBuf>) -> Result<CuratorApi, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    let store =
        SqliteStore::open(&db_path).map_err(|e| format!("failed to open database: {}", e))?;
    // Reads against a saved graph need no ontology; an empty schema suffices.
    let snapshot = ontograph::schema::load("version: saved\n")
        .map_err(|e| format!("internal schema error: {}", e))?;
    let engine = Arc::new(CuratorEngine::new(snapshot, CanonConfig::default()));
    let api = CuratorApi::with_backend(engine, Arc::new(store));
    api.load().map_err(|e| format!("failed to load graph: {}", e))?;
    Ok(api)
}

fn cmd_stats(db: Option<PathBuf>) -> i32 {
    let api = match open_saved(db) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    println!("Entities: {}", api.entity_count());
    println!("Triples:  {}", api.triple_count());
    println!("Audit:    {} records", api.audit_records().len());
    0
}

fn cmd_export(db: Option<PathBuf>, out: Option<PathBuf>) -> i32 {
    let api = match open_saved(db) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let snapshot = api.graph_snapshot();
    let json = match serde_json::to_string_pretty(&snapshot) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: serialization failed: {}", e);
            return 1;
        }
    };
    match out {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, json) {
                eprintln!("Error: cannot write '{}': {}", path.display(), e);
                return 1;
            }
            println!("Exported {} entities and {} triples to {}",
                snapshot.entities.len(), snapshot.triples.len(), path.display());
            0
        }
        None => {
            println!("{}", json);
            0
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Schema { action } => match action {
            SchemaAction::Check { path } => cmd_schema_check(&path),
        },
        Commands::Run {
            schema,
            candidates,
            docs,
            config,
            accept_repairs,
            db,
        } => cmd_run(
            &schema,
            &candidates,
            docs.as_deref(),
            config.as_deref(),
            accept_repairs,
            db,
        ),
        Commands::Stats { db } => cmd_stats(db),
        Commands::Export { db, out } => cmd_export(db, out),
    };
    std::process::exit(code);
}
