//! Command-line front-end over `codelens-core`.

pub mod error;

use clap::Parser;
use clap::Subcommand;
use codelens_core::Document;
use codelens_core::MetadataFilter;
use codelens_core::RetrievalConfig;
use codelens_core::RetrievalRequest;
use codelens_core::Retriever;
use codelens_core::SemanticSearchTools;
use codelens_core::config::PINECONE_API_KEY;
use codelens_core::embeddings::RelaceEmbedder;
use codelens_core::knowledge::to_records;
use codelens_core::vector_index::PineconeIndex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub use error::CliError;
pub use error::Result;

/// Semantic code search over an embedded, namespaced index
#[derive(Parser, Debug)]
#[command(name = "codelens")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML config file (defaults to ~/.codelens/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Retrieve the documents most relevant to a query
    Search(SearchArgs),
    /// List repository namespaces in the index
    Repos,
    /// Show statistics for one repository namespace
    Stats {
        repo: String,
    },
    /// Create the configured index if it does not exist
    EnsureIndex,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Free-text query
    #[arg(required = true, trailing_var_arg = true)]
    pub query: Vec<String>,

    /// Repository namespace to search
    #[arg(long)]
    pub repo: Option<String>,

    /// Number of candidates to fetch from the index
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Only match chunks in this language
    #[arg(long)]
    pub file_type: Option<String>,

    /// Rerank candidates (the configured default when neither flag is given)
    #[arg(long, overrides_with = "no_rerank")]
    pub rerank: bool,

    /// Return vector-ordered results without reranking
    #[arg(long, overrides_with = "rerank")]
    pub no_rerank: bool,

    /// Number of documents kept after reranking
    #[arg(long)]
    pub top_k_after_rerank: Option<usize>,

    /// Print retrieval records as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn request(&self, config: &RetrievalConfig) -> RetrievalRequest {
        let rerank = if self.rerank {
            true
        } else if self.no_rerank {
            false
        } else {
            config.defaults.rerank
        };

        let mut request = RetrievalRequest::new(self.query.join(" "))
            .with_num_documents(self.top_k.unwrap_or(config.defaults.num_documents))
            .with_rerank(rerank);
        request.top_k_after_rerank = self
            .top_k_after_rerank
            .or(config.defaults.top_k_after_rerank);
        if let Some(repo) = &self.repo {
            request = request.with_namespace(repo.clone());
        }
        if let Some(language) = &self.file_type {
            request = request.with_filter(MetadataFilter::new().field_eq("language", language.as_str()));
        }
        request
    }
}

/// Resolve the config file (explicit path, else the default location when it
/// exists, else built-in defaults) and overlay the environment.
pub fn load_config<F>(path: Option<&PathBuf>, lookup: F) -> Result<RetrievalConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match path {
        Some(path) if !path.exists() => {
            return Err(CliError::ConfigNotFound(path.display().to_string()));
        }
        Some(path) => RetrievalConfig::load_from_file(path)?,
        None => match RetrievalConfig::default_path().filter(|p| p.exists()) {
            Some(default) => {
                debug!(path = %default.display(), "Loading default config");
                RetrievalConfig::load_from_file(&default)?
            }
            None => RetrievalConfig::default(),
        },
    };
    Ok(base.with_overrides(lookup))
}

/// Run one command and return what should be printed.
pub async fn run(command: &Command, config: &RetrievalConfig) -> Result<String> {
    match command {
        Command::Search(args) => {
            require(config.missing_credentials())?;
            let retriever = Retriever::from_config(config)?;
            let documents = retriever.retrieve(&args.request(config)).await?;
            if args.json {
                Ok(serde_json::to_string_pretty(&to_records(&documents))?)
            } else {
                Ok(render_documents(&documents))
            }
        }
        Command::Repos => Ok(toolkit(config)?.list_repositories().await),
        Command::Stats { repo } => Ok(toolkit(config)?.get_repository_stats(repo).await),
        Command::EnsureIndex => {
            require(index_credentials(config))?;
            let index = PineconeIndex::new(&config.index)?;
            let description = index.ensure_index().await?;
            Ok(format!(
                "index {} ready at {}",
                description.name, description.host
            ))
        }
    }
}

fn toolkit(config: &RetrievalConfig) -> Result<SemanticSearchTools> {
    require(index_credentials(config))?;
    Ok(SemanticSearchTools::new(
        Arc::new(RelaceEmbedder::new(&config.embedding)?),
        Arc::new(PineconeIndex::new(&config.index)?),
    ))
}

fn index_credentials(config: &RetrievalConfig) -> Vec<&'static str> {
    config
        .missing_credentials()
        .into_iter()
        .filter(|name| *name == PINECONE_API_KEY)
        .collect()
}

fn require(missing: Vec<&'static str>) -> Result<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CliError::MissingCredentials(missing))
    }
}

pub fn render_documents(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "No matching documents.".to_string();
    }
    let mut out = String::new();
    for (rank, doc) in documents.iter().enumerate() {
        let score = match (doc.rerank_score, doc.ann_score) {
            (Some(score), _) => format!("rerank {score:.3}"),
            (None, Some(score)) => format!("ann {score:.3}"),
            (None, None) => "unscored".to_string(),
        };
        out.push_str(&format!("{}. {} ({score})\n", rank + 1, doc.name));
        for line in doc.content.lines().take(3) {
            out.push_str(&format!("    {line}\n"));
        }
    }
    out
}
