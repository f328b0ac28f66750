use bookshelf::Bookshelf;
use bookshelf::books::sample_books;
use bookshelf::config::ShelfConfig;
use bookshelf::errors::DbError;
use bookshelf::import::{ImportOptions, import_file};
use bookshelf::runner::{CannedQuery, QueryParams};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bookshelf", about = "Canned queries over a books collection")]
struct Cli {
    /// Config file (defaults to $BOOKSHELF_CONFIG, then ./bookshelf.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// NDJSON or JSON-array file of books to load; the sample catalogue when omitted
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    /// Skip malformed lines in --data instead of failing
    #[arg(long, global = true)]
    skip_errors: bool,
    /// log4rs YAML file; replaces the logging set up from the config file
    #[arg(long, global = true)]
    log_config: Option<PathBuf>,
    /// Route per-query trace lines to trace.log in the log directory
    #[arg(long, global = true)]
    trace: bool,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List every book
    ListAll,
    /// Books by an exact author name
    FindByAuthor { author: String },
    /// Books currently in stock
    FindInStock,
    /// Number of books
    CountAll,
    /// Books published within [min, max], oldest first
    FindByYearRange { min: i64, max: i64 },
    /// Case-insensitive title substring match
    FindByTitle { pattern: String },
    /// Set the price of the first book by an author
    UpdatePrice { author: String, new_price: f64 },
    /// Average price, count and pages per genre
    AvgPriceByGenre,
    /// Authors with more than one book
    MultiBookAuthors,
    /// Build the title/author/genre text index and search it
    Search { terms: String },
    /// Run a query by label with a JSON parameter bundle
    Run {
        label: String,
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

fn to_query(cmd: Cmd) -> Result<CannedQuery, DbError> {
    Ok(match cmd {
        Cmd::ListAll => CannedQuery::ListAll,
        Cmd::FindByAuthor { author } => CannedQuery::FindByAuthor { author },
        Cmd::FindInStock => CannedQuery::FindInStock,
        Cmd::CountAll => CannedQuery::CountAll,
        Cmd::FindByYearRange { min, max } => CannedQuery::FindByYearRange { min, max },
        Cmd::FindByTitle { pattern } => CannedQuery::FindByTitleSubstring { pattern },
        Cmd::UpdatePrice { author, new_price } => CannedQuery::UpdatePrice { author, new_price },
        Cmd::AvgPriceByGenre => CannedQuery::AvgPriceByGenre,
        Cmd::MultiBookAuthors => CannedQuery::MultiBookAuthors,
        Cmd::Search { terms } => CannedQuery::TextSearch { search_terms: terms },
        Cmd::Run { label, params } => {
            let params: QueryParams = serde_json::from_str(&params)?;
            CannedQuery::from_label(&label, &params)?
        }
    })
}

fn run(cli: Cli) -> Result<(), DbError> {
    let cfg = ShelfConfig::load(cli.config.as_deref())?;
    match &cli.log_config {
        Some(path) => bookshelf::logger::init_path(path)?,
        None => bookshelf::logger::configure_logging(&cfg.log, cli.trace)?,
    }
    let shelf = Bookshelf::new(cfg)?;
    match &cli.data {
        Some(path) => {
            let opts = ImportOptions { skip_errors: cli.skip_errors, progress_every: Some(10_000) };
            let report = import_file(&*shelf.collection()?, path, &opts)?;
            log::info!("loaded {} books from {}", report.inserted, path.display());
        }
        None => {
            shelf.seed(sample_books())?;
        }
    }
    let runner = shelf.runner()?;
    let query = to_query(cli.command)?;
    if matches!(query, CannedQuery::TextSearch { .. }) {
        runner.create_search_index()?;
    }
    let outcome = runner.run(&query)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
