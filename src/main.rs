use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use related_vectorizer::{CacheRegistry, JsonLinesSource, RelatedRecords, SimilarityConfig};

type Related = RelatedRecords<String, JsonLinesSource>;

/// Print the records most similar to a record of a JSON-lines file.
///
/// Without QUERY_ID, ids are read from stdin one per line until an empty
/// line, `exit` or `quit`.
#[derive(Debug, Parser)]
#[command(name = "related-vectorizer", version)]
struct Args {
    /// JSON-lines file, one record object per line
    #[arg(long)]
    source: PathBuf,

    /// Field holding the record id
    #[arg(long, default_value = "id")]
    id_field: String,

    /// Comma separated fields to compare, overrides RELATED_FIELDS
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// Maximum number of records to load, 0 loads everything.
    /// Overrides RELATED_LIMIT
    #[arg(long)]
    limit: Option<usize>,

    /// Number of related records to print
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Rebuild the vector space before answering
    #[arg(long)]
    refresh: bool,

    /// Record id to find related records for
    query_id: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "related-vectorizer failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> related_vectorizer::Result<()> {
    let mut config = SimilarityConfig::from_env()?;
    if let Some(fields) = args.fields {
        config = config.with_fields(fields);
    }
    if let Some(limit) = args.limit {
        config = config.with_record_limit((limit > 0).then_some(limit));
    }

    let source = JsonLinesSource::new(&args.source).with_id_field(args.id_field);
    let registry = CacheRegistry::with_memory(&config.default_cache);
    let related: Related = RelatedRecords::new(&config, source, &registry)?;

    let start = Instant::now();
    let space = related.space()?;
    info!(
        records = space.len(),
        vocabulary = space.dim(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "vector space ready"
    );

    let stdout = io::stdout();
    match args.query_id {
        Some(id) => print_related(&related, &mut stdout.lock(), &id, args.top, args.refresh),
        None => run_interactive(&related, io::stdin().lock(), stdout.lock(), args.top, args.refresh),
    }
}

fn print_related<W: Write>(
    related: &Related,
    out: &mut W,
    id: &str,
    top: usize,
    refresh: bool,
) -> related_vectorizer::Result<()> {
    let ids = related.similar(&id.to_string(), top, refresh)?;
    if ids.is_empty() {
        info!(id, "no related records");
    }
    for key in ids {
        if let Err(err) = writeln!(out, "{key}") {
            error!(error = %err, "failed to write related id");
            break;
        }
    }
    Ok(())
}

/// Answer ids read line by line from `input` until an empty line, `exit`,
/// `quit`, end of input or a read error
fn run_interactive<R: BufRead, W: Write>(
    related: &Related,
    input: R,
    mut out: W,
    top: usize,
    refresh: bool,
) -> related_vectorizer::Result<()> {
    let mut lines = input.lines();
    // only the first query honours --refresh
    let mut refresh = refresh;
    loop {
        if let Err(err) = write!(out, "Record> ").and_then(|()| out.flush()) {
            error!(error = %err, "failed to write prompt");
        }
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                error!(error = %err, "failed to read record id from stdin");
                break;
            }
            None => break,
        };
        let id = line.trim();
        if id.is_empty() || id.eq_ignore_ascii_case("exit") || id.eq_ignore_ascii_case("quit") {
            break;
        }
        let start = Instant::now();
        print_related(related, &mut out, id, top, refresh)?;
        refresh = false;
        info!(id, elapsed_ms = start.elapsed().as_secs_f64() * 1000.0, "query answered");
    }
    info!("bye");
    Ok(())
}
