use clap::Parser;
use geochunk_index::{IndexerRegistry, MatchPriority, registry::DEFAULT_INDEXERS};
use serde::Serialize;

/// A CLI tool to compile search terms into search engine queries.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Search term, e.g. "13.3,52.4,13.5,52.6" or a tag
    #[arg(required_unless_present = "mapping")]
    term: Option<String>,

    /// Print the merged index mapping instead of compiling a query
    #[arg(short, long)]
    mapping: bool,

    /// Comma-separated list of indexers to install
    #[arg(short, long, value_delimiter = ',')]
    indexers: Option<Vec<String>>,

    /// Also print how each indexer rates the term
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Rating<'a> {
    indexer: &'a str,
    priority: MatchPriority,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let registry = match &args.indexers {
        Some(names) => IndexerRegistry::from_names(names.iter().map(|n| n.trim()))?,
        None => IndexerRegistry::from_names(DEFAULT_INDEXERS)?,
    };

    if args.mapping {
        println!("{}", serde_json::to_string_pretty(&registry.mapping())?);
        return Ok(());
    }

    let term = args.term.unwrap_or_default();
    if args.verbose {
        let ratings: Vec<Rating> = registry
            .priorities(&term)
            .into_iter()
            .map(|(indexer, priority)| Rating { indexer, priority })
            .collect();
        eprintln!("{}", serde_json::to_string_pretty(&ratings)?);
    }

    let query = registry.compile(&term)?;
    println!("{}", serde_json::to_string_pretty(&query)?);
    Ok(())
}
