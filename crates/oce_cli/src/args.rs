// Deterministic, offline CLI argument parsing & validation for the `oce`
// command: `oce run` triggers one pass of the clustering pipeline; `oce
// query` is an offline harness over the read-only reporting surface,
// letting operators exercise it against a directory of persisted Run
// artifacts without standing up the HTTP/gRPC layer a real deployment
// would front it with.

use clap::{Parser, Subcommand};
use std::{env, fs, path::PathBuf};

#[derive(Debug, Parser)]
#[command(name = "oce", about = "Voter opinion-clustering engine: batch trigger and read-only query")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Trigger one pass of the clustering pipeline.
    Run(RunArgs),
    /// Read-only queries over a directory of persisted Runs.
    Query(QueryArgs),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// JSON array of votes: [{"voter": {"kind": "registered", "id": "..."},
    /// "item": "...", "opinion": "support"|"oppose"|"neutral", "cast_at": "<rfc3339>"}, ...]
    #[arg(long)]
    pub votes_file: PathBuf,

    /// JSON object mapping session_id -> registered_id, pre-resolved claim
    /// events.
    #[arg(long)]
    pub claims_file: Option<PathBuf>,

    /// JSON `RunParameters` override; individual flags below still win.
    #[arg(long)]
    pub params_file: Option<PathBuf>,

    /// Directory Run artifacts are persisted under (one `<run_id>.json`
    /// file per Run) and the single-leader lease file lives in.
    #[arg(long, default_value = "./runs")]
    pub out: PathBuf,

    #[arg(long)]
    pub window_days: Option<u32>,
    #[arg(long)]
    pub min_voters: Option<u32>,
    #[arg(long)]
    pub min_votes_per_voter: Option<u32>,

    /// If false, dispatch to a worker instead of running inline. This
    /// offline CLI has no worker queue to dispatch to, so `--sync=false`
    /// only validates inputs and exits 0 without running the pipeline —
    /// a deployment that wires in a real queue intercepts this flag
    /// upstream of this process.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub sync: bool,

    /// Wall-clock instant the run is triggered "at", RFC3339. Defaults to
    /// the process's real clock; overridable for reproducible fixtures.
    #[arg(long)]
    pub now: Option<String>,

    #[arg(long)]
    pub quiet: bool,
}

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// Directory of persisted Run artifacts (the same `--out` a prior
    /// `oce run` was pointed at).
    #[arg(long, default_value = "./runs")]
    pub runs_dir: PathBuf,

    #[command(subcommand)]
    pub which: QueryCommand,
}

#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// Latest completed Run's summary, projections, and group clusters.
    Latest,
    /// A voter's group-cluster assignment in the latest completed Run.
    Bubble {
        #[arg(long, value_parser = ["registered", "session"])]
        voter_kind: String,
        #[arg(long)]
        voter_id: String,
    },
    /// `ClusterVotingPattern` rows for a cluster, ordered by descending
    /// consensus.
    Patterns {
        /// Fully-qualified cluster id, e.g. `RUN:.../G0`.
        #[arg(long)]
        cluster_id: String,
    },
    /// The last N `(run, run.next)` lineage steps.
    Lineage {
        #[arg(long, default_value_t = 5)]
        n: usize,
    },
}

#[derive(Debug)]
pub enum CliError {
    NotFound(String),
    InvalidNow(String),
    InvalidId(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CliError::*;
        match self {
            NotFound(p) => write!(f, "file not found: {p}"),
            InvalidNow(s) => write!(f, "invalid --now timestamp: {s}"),
            InvalidId(s) => write!(f, "invalid id: {s}"),
        }
    }
}
impl std::error::Error for CliError {}

/// Entry point used by main.rs: parse argv, validate paths exist, and
/// normalize them to absolute paths before handing off to the pipeline.
pub fn parse_and_validate() -> Result<Args, CliError> {
    let mut args = Args::parse();

    match &mut args.command {
        Command::Run(run_args) => {
            ensure_local_exists(&run_args.votes_file, "--votes-file")?;
            if let Some(p) = &run_args.claims_file {
                ensure_local_exists(p, "--claims-file")?;
            }
            if let Some(p) = &run_args.params_file {
                ensure_local_exists(p, "--params-file")?;
            }
            run_args.votes_file = normalize_path(&run_args.votes_file);
            run_args.claims_file = run_args.claims_file.as_ref().map(normalize_path);
            run_args.params_file = run_args.params_file.as_ref().map(normalize_path);
            run_args.out = normalize_path(&run_args.out);
        }
        Command::Query(query_args) => {
            query_args.runs_dir = normalize_path(&query_args.runs_dir);
        }
    }

    Ok(args)
}

fn ensure_local_exists(p: &PathBuf, label: &'static str) -> Result<(), CliError> {
    let meta = fs::metadata(p).map_err(|_| CliError::NotFound(format!("{label} {}", p.display())))?;
    if !meta.is_file() {
        return Err(CliError::NotFound(format!("{label} {}", p.display())));
    }
    Ok(())
}

fn normalize_path(p: &PathBuf) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.clone()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}
