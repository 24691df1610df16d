use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use exemplar_lexical::{tokenizer_by_id, Bm25Index, Tokenizer};
use exemplar_repository::{
    DocumentRepository, IngestOptions, IngestReport, RefactoringCorpus, RefactoringRecord,
};
use exemplar_search::{RerankerAdapter, RetrievalConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "exemplar")]
#[command(about = "Build and query refactoring-example retrieval artifacts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest mined refactorings and write the lexical index and repository
    Build(BuildArgs),

    /// Search the lexical index and resolve hits to records
    Lookup(LookupArgs),

    /// Validate a retrieval config and construct its rerank backend
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TokenizerKind {
    Whitespace,
    Code,
}

impl TokenizerKind {
    const fn id(self) -> &'static str {
        match self {
            Self::Whitespace => "whitespace",
            Self::Code => "code",
        }
    }

    fn build(self) -> Result<Arc<dyn Tokenizer>> {
        tokenizer_by_id(self.id()).ok_or_else(|| anyhow!("tokenizer '{}' is not built in", self.id()))
    }
}

#[derive(Args)]
struct BuildArgs {
    /// Refactoring miner output (`{"commits": [...]}`)
    #[arg(long)]
    corpus: PathBuf,

    /// Where to write the lexical index
    #[arg(long)]
    index: PathBuf,

    /// Where to write the document repository
    #[arg(long)]
    repository: PathBuf,

    #[arg(long, value_enum, default_value = "whitespace")]
    tokenizer: TokenizerKind,

    /// Stop after this many accepted refactorings
    #[arg(long)]
    limit: Option<usize>,

    /// Also accept refactorings not flagged as pure
    #[arg(long)]
    include_impure: bool,

    /// Index the comment-free source alone, without the context description
    #[arg(long)]
    without_context: bool,
}

#[derive(Args)]
struct LookupArgs {
    #[arg(long)]
    index: PathBuf,

    #[arg(long)]
    repository: PathBuf,

    /// Require the index to have been built with this tokenizer
    #[arg(long, value_enum)]
    tokenizer: Option<TokenizerKind>,

    #[arg(long, short = 'q')]
    query: String,

    #[arg(long, short = 'n', default_value_t = 5)]
    top_n: usize,
}

#[derive(Args)]
struct CheckConfigArgs {
    /// JSON or TOML retrieval config
    config: PathBuf,
}

#[derive(Serialize)]
struct BuildOutput {
    report: IngestReport,
    documents: usize,
    repository_entries: usize,
    repository_duplicates: usize,
    tokenizer: &'static str,
    index: PathBuf,
    repository: PathBuf,
}

#[derive(Serialize)]
struct LookupHit {
    rank: usize,
    score: f32,
    document: String,
    record: Option<RefactoringRecord>,
}

#[derive(Serialize)]
struct LookupOutput {
    query: String,
    hits: Vec<LookupHit>,
    unresolved: usize,
}

#[derive(Serialize)]
struct CheckConfigOutput {
    config: RetrievalConfig,
    rerank_backend: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Build(args) => run_build(args).await?,
        Commands::Lookup(args) => run_lookup(args).await?,
        Commands::CheckConfig(args) => run_check_config(&args)?,
    }

    Ok(())
}

async fn run_build(args: BuildArgs) -> Result<()> {
    let corpus = RefactoringCorpus::load(&args.corpus)
        .await
        .with_context(|| format!("Failed to read corpus {}", args.corpus.display()))?;
    log::info!(
        "Corpus: {} commits, {} refactorings",
        corpus.commit_count(),
        corpus.refactoring_count()
    );

    let options = IngestOptions {
        with_context: !args.without_context,
        pure_only: !args.include_impure,
        limit: args.limit,
    };
    let ingestion = corpus.entries(&options);
    if ingestion.entries.is_empty() {
        log::warn!("No refactorings accepted; writing empty artifacts");
    }

    let documents = ingestion.documents();
    let report = ingestion.report.clone();
    let index = Bm25Index::build(documents.iter().cloned(), args.tokenizer.build()?);
    let repository = ingestion.into_repository();

    index
        .save(&args.index)
        .await
        .with_context(|| format!("Failed to write index {}", args.index.display()))?;
    repository
        .save(&args.repository)
        .await
        .with_context(|| format!("Failed to write repository {}", args.repository.display()))?;

    print_json(&BuildOutput {
        report,
        documents: documents.len(),
        repository_entries: repository.len(),
        repository_duplicates: repository.duplicates(),
        tokenizer: args.tokenizer.id(),
        index: args.index,
        repository: args.repository,
    })
}

async fn run_lookup(args: LookupArgs) -> Result<()> {
    if args.top_n == 0 {
        return Err(anyhow!("--top-n must be positive"));
    }
    let index = match args.tokenizer {
        Some(kind) => Bm25Index::load_with_tokenizer(&args.index, kind.build()?).await,
        None => Bm25Index::load(&args.index).await,
    }
    .with_context(|| format!("Failed to load index {}", args.index.display()))?;
    let repository: DocumentRepository = DocumentRepository::load(&args.repository)
        .await
        .with_context(|| format!("Failed to load repository {}", args.repository.display()))?;

    let hits: Vec<LookupHit> = index
        .search_scored(&args.query, args.top_n)?
        .into_iter()
        .enumerate()
        .map(|(rank, hit)| LookupHit {
            rank,
            score: hit.score,
            record: repository.find(&hit.document).cloned(),
            document: hit.document,
        })
        .collect();
    let unresolved = hits.iter().filter(|hit| hit.record.is_none()).count();
    if unresolved > 0 {
        log::warn!("{unresolved} hits have no repository record");
    }

    print_json(&LookupOutput {
        query: args.query,
        hits,
        unresolved,
    })
}

fn run_check_config(args: &CheckConfigArgs) -> Result<()> {
    let config = RetrievalConfig::from_file(&args.config)
        .with_context(|| format!("Invalid retrieval config {}", args.config.display()))?;
    let reranker = RerankerAdapter::from_config(&config.rerank)
        .with_context(|| format!("Invalid rerank settings in {}", args.config.display()))?;
    let rerank_backend = reranker.backend_name().to_string();
    print_json(&CheckConfigOutput {
        config,
        rerank_backend,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
