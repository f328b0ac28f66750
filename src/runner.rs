//! Canned queries over the `books` collection.
//!
//! Each query validates its parameters, issues one request against a [`DocumentStore`],
//! and decodes the result into typed records. Store errors are returned unchanged.

use crate::books::{AUTHOR, Book, GENRE, IN_STOCK, PAGES, PRICE, PUBLISHED_YEAR, TITLE};
use crate::errors::DbError;
use crate::query::{
    Accumulator, CmpOp, Cursor, Filter, FindOptions, MAX_LIMIT, SortSpec, Stage, TextIndexSpec,
    UpdateDoc, UpdateReport,
};
use crate::store::DocumentStore;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

/// One row of "average price by genre".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreStats {
    pub genre: String,
    /// `None` when no book in the genre has a numeric price.
    pub average_price: Option<f64>,
    pub book_count: u64,
    pub total_pages: i64,
}

/// One row of "multi-book authors".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorStats {
    pub author: String,
    pub book_count: u64,
    pub titles: Vec<String>,
    pub avg_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBook {
    #[serde(flatten)]
    pub book: Book,
    pub score: f64,
}

/// Lazily decoded books, fetched from the store as the iterator advances.
pub struct BookCursor {
    inner: Cursor,
}

impl Iterator for BookCursor {
    type Item = Result<Book, DbError>;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|d| Book::try_from(&d))
    }
}

/// Named queries, one variant per operation.
#[derive(Debug, Clone, PartialEq)]
pub enum CannedQuery {
    ListAll,
    FindByAuthor { author: String },
    FindInStock,
    CountAll,
    FindByYearRange { min: i64, max: i64 },
    FindByTitleSubstring { pattern: String },
    UpdatePrice { author: String, new_price: f64 },
    AvgPriceByGenre,
    MultiBookAuthors,
    CreateSearchIndex,
    TextSearch { search_terms: String },
}

/// Parameter bundle for [`CannedQuery::from_label`]; each query reads the fields it needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryParams {
    pub author: Option<String>,
    pub new_price: Option<f64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub pattern: Option<String>,
    pub search_terms: Option<String>,
}

const LABELS: &[&str] = &[
    "list all",
    "find by author",
    "find in stock",
    "count all",
    "find by year range",
    "find by title substring",
    "update price",
    "average price by genre",
    "multi-book authors",
    "create search index",
    "text search",
];

fn normalize_label(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c.to_ascii_lowercase() })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn required<T>(value: Option<T>, label: &str, name: &str) -> Result<T, DbError> {
    value.ok_or_else(|| DbError::InvalidParams(format!("`{label}` needs parameter `{name}`")))
}

impl CannedQuery {
    /// Intent label, e.g. `"find by author"`.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ListAll => LABELS[0],
            Self::FindByAuthor { .. } => LABELS[1],
            Self::FindInStock => LABELS[2],
            Self::CountAll => LABELS[3],
            Self::FindByYearRange { .. } => LABELS[4],
            Self::FindByTitleSubstring { .. } => LABELS[5],
            Self::UpdatePrice { .. } => LABELS[6],
            Self::AvgPriceByGenre => LABELS[7],
            Self::MultiBookAuthors => LABELS[8],
            Self::CreateSearchIndex => LABELS[9],
            Self::TextSearch { .. } => LABELS[10],
        }
    }

    #[must_use]
    pub fn labels() -> &'static [&'static str] {
        LABELS
    }

    /// Builds a query from its label. Case, `_` and `-` in the label are ignored.
    ///
    /// # Errors
    /// Returns `InvalidParams` for an unknown label or a missing parameter.
    pub fn from_label(label: &str, params: &QueryParams) -> Result<Self, DbError> {
        let key = normalize_label(label);
        let Some(known) = LABELS.iter().find(|l| normalize_label(l) == key) else {
            return Err(DbError::InvalidParams(format!("unknown query `{label}`")));
        };
        let p = params.clone();
        Ok(match *known {
            "list all" => Self::ListAll,
            "find by author" => Self::FindByAuthor { author: required(p.author, known, "author")? },
            "find in stock" => Self::FindInStock,
            "count all" => Self::CountAll,
            "find by year range" => Self::FindByYearRange {
                min: required(p.min, known, "min")?,
                max: required(p.max, known, "max")?,
            },
            "find by title substring" => {
                Self::FindByTitleSubstring { pattern: required(p.pattern, known, "pattern")? }
            }
            "update price" => Self::UpdatePrice {
                author: required(p.author, known, "author")?,
                new_price: required(p.new_price, known, "new_price")?,
            },
            "average price by genre" => Self::AvgPriceByGenre,
            "multi-book authors" => Self::MultiBookAuthors,
            "create search index" => Self::CreateSearchIndex,
            _ => Self::TextSearch { search_terms: required(p.search_terms, known, "search_terms")? },
        })
    }
}

/// Result of [`QueryRunner::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum QueryOutcome {
    Books(Vec<Book>),
    Count(u64),
    Updated(UpdateReport),
    Genres(Vec<GenreStats>),
    Authors(Vec<AuthorStats>),
    IndexCreated(String),
    Scored(Vec<ScoredBook>),
}

fn non_blank<'a>(name: &str, value: &'a str) -> Result<&'a str, DbError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(DbError::InvalidParams(format!("`{name}` must not be blank")));
    }
    Ok(v)
}

fn decode_err(what: &str, row: &BsonDocument) -> DbError {
    DbError::Decode(format!("unexpected {what} row: {row}"))
}

fn get_count(row: &BsonDocument, key: &str) -> Option<u64> {
    match row.get(key)? {
        Bson::Int32(i) => u64::try_from(*i).ok(),
        Bson::Int64(i) => u64::try_from(*i).ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn get_total(row: &BsonDocument, key: &str) -> Option<i64> {
    match row.get(key)? {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) => Some(*f as i64),
        _ => None,
    }
}

fn get_avg(row: &BsonDocument, key: &str) -> Option<Option<f64>> {
    match row.get(key)? {
        Bson::Double(f) => Some(Some(*f)),
        Bson::Null => Some(None),
        _ => None,
    }
}

fn get_string(row: &BsonDocument, key: &str) -> Option<String> {
    match row.get(key)? {
        Bson::String(s) => Some(s.clone()),
        _ => None,
    }
}

pub struct QueryRunner<S: DocumentStore> {
    store: S,
    max_results: usize,
}

impl<S: DocumentStore> QueryRunner<S> {
    pub fn new(store: S) -> Self {
        Self { store, max_results: MAX_LIMIT }
    }

    /// Caps every sequence result at `max_results` (never above `MAX_LIMIT`).
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, MAX_LIMIT);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn find_books(&self, filter: &Filter, sort: Option<Vec<SortSpec>>) -> Result<Vec<Book>, DbError> {
        let opts = FindOptions { sort, limit: Some(self.max_results), ..FindOptions::default() };
        self.store.find(filter, &opts)?.map(|d| Book::try_from(&d)).collect()
    }

    /// Every book, decoded as the cursor advances.
    ///
    /// # Errors
    /// Propagates store errors.
    pub fn list_all(&self) -> Result<BookCursor, DbError> {
        let opts = FindOptions { limit: Some(self.max_results), ..FindOptions::default() };
        Ok(BookCursor { inner: self.store.find(&Filter::True, &opts)? })
    }

    /// Books whose author equals `author` exactly.
    ///
    /// # Errors
    /// `InvalidParams` for a blank author; store errors otherwise.
    pub fn find_by_author(&self, author: &str) -> Result<Vec<Book>, DbError> {
        non_blank("author", author)?;
        self.find_books(&Filter::eq(AUTHOR, author), None)
    }

    /// # Errors
    /// Propagates store errors.
    pub fn find_in_stock(&self) -> Result<Vec<Book>, DbError> {
        self.find_books(&Filter::eq(IN_STOCK, true), None)
    }

    /// # Errors
    /// Propagates store errors.
    pub fn count_all(&self) -> Result<u64, DbError> {
        self.store.count(&Filter::True)
    }

    /// Books with `min <= published_year <= max`, oldest first.
    ///
    /// # Errors
    /// `InvalidParams` when `min > max`; store errors otherwise.
    pub fn find_by_year_range(&self, min: i64, max: i64) -> Result<Vec<Book>, DbError> {
        if min > max {
            return Err(DbError::InvalidParams(format!("year range is empty: {min} > {max}")));
        }
        self.find_books(
            &Filter::between(PUBLISHED_YEAR, min, max),
            Some(vec![SortSpec::asc(PUBLISHED_YEAR)]),
        )
    }

    /// Case-insensitive substring match on the title. The pattern is literal text.
    ///
    /// # Errors
    /// `InvalidParams` for a blank pattern; store errors otherwise.
    pub fn find_by_title_substring(&self, pattern: &str) -> Result<Vec<Book>, DbError> {
        non_blank("pattern", pattern)?;
        let filter = Filter::Regex {
            path: TITLE.to_string(),
            pattern: regex::escape(pattern),
            case_insensitive: true,
        };
        self.find_books(&filter, None)
    }

    /// Sets `price` on the first book by `author`.
    ///
    /// No match is not an error: the report then has `matched == 0`.
    ///
    /// # Errors
    /// `InvalidParams` for a blank author or a negative or non-finite price.
    pub fn update_price(&self, author: &str, new_price: f64) -> Result<UpdateReport, DbError> {
        non_blank("author", author)?;
        if !new_price.is_finite() || new_price < 0.0 {
            return Err(DbError::InvalidParams(format!("invalid price {new_price}")));
        }
        let report = self.store.update_one(&Filter::eq(AUTHOR, author), &UpdateDoc::set(PRICE, new_price))?;
        log::info!(
            target: "bookshelf::audit",
            "update price author={author} price={new_price} matched={} modified={}",
            report.matched,
            report.modified
        );
        Ok(report)
    }

    /// Average price, count and total pages per genre, most expensive genre first.
    ///
    /// # Errors
    /// Propagates store errors; `Decode` if a group row is malformed.
    pub fn avg_price_by_genre(&self) -> Result<Vec<GenreStats>, DbError> {
        let pipeline = [
            Stage::Group {
                key: GENRE.to_string(),
                accumulators: vec![
                    ("averagePrice".into(), Accumulator::Avg(PRICE.into())),
                    ("bookCount".into(), Accumulator::Count),
                    ("totalPages".into(), Accumulator::Sum(PAGES.into())),
                ],
            },
            Stage::Sort(vec![SortSpec::desc("averagePrice")]),
            Stage::Limit(self.max_results),
        ];
        self.store
            .aggregate(&pipeline)?
            .iter()
            .map(|row| -> Result<GenreStats, DbError> {
                Ok(GenreStats {
                    genre: get_string(row, "_id").ok_or_else(|| decode_err("genre", row))?,
                    average_price: get_avg(row, "averagePrice").ok_or_else(|| decode_err("genre", row))?,
                    book_count: get_count(row, "bookCount").ok_or_else(|| decode_err("genre", row))?,
                    total_pages: get_total(row, "totalPages").ok_or_else(|| decode_err("genre", row))?,
                })
            })
            .collect()
    }

    /// Authors with more than one book, most prolific first.
    ///
    /// # Errors
    /// Propagates store errors; `Decode` if a group row is malformed.
    pub fn multi_book_authors(&self) -> Result<Vec<AuthorStats>, DbError> {
        let pipeline = [
            Stage::Group {
                key: AUTHOR.to_string(),
                accumulators: vec![
                    ("bookCount".into(), Accumulator::Count),
                    ("books".into(), Accumulator::Push(TITLE.into())),
                    ("avgPrice".into(), Accumulator::Avg(PRICE.into())),
                ],
            },
            Stage::Match(Filter::Cmp { path: "bookCount".into(), op: CmpOp::Gt, value: Bson::Int32(1) }),
            Stage::Sort(vec![SortSpec::desc("bookCount")]),
            Stage::Limit(self.max_results),
        ];
        self.store
            .aggregate(&pipeline)?
            .iter()
            .map(|row| -> Result<AuthorStats, DbError> {
                let titles = match row.get("books") {
                    Some(Bson::Array(items)) => items
                        .iter()
                        .map(|b| if let Bson::String(s) = b { Ok(s.clone()) } else { Err(decode_err("author", row)) })
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => return Err(decode_err("author", row)),
                };
                Ok(AuthorStats {
                    author: get_string(row, "_id").ok_or_else(|| decode_err("author", row))?,
                    book_count: get_count(row, "bookCount").ok_or_else(|| decode_err("author", row))?,
                    titles,
                    avg_price: get_avg(row, "avgPrice").ok_or_else(|| decode_err("author", row))?,
                })
            })
            .collect()
    }

    /// Declares title, author and genre as text-searchable. Returns the index name.
    ///
    /// # Errors
    /// Propagates store errors, including an index conflict.
    pub fn create_search_index(&self) -> Result<String, DbError> {
        self.store.create_text_index(&TextIndexSpec::over(&[TITLE, AUTHOR, GENRE]))
    }

    /// Books matching any of `search_terms`, highest relevance first.
    ///
    /// # Errors
    /// `InvalidParams` for blank terms; `IndexMissing` before `create_search_index`.
    pub fn text_search(&self, search_terms: &str) -> Result<Vec<ScoredBook>, DbError> {
        let terms = non_blank("search_terms", search_terms)?;
        self.store
            .text_search(terms, Some(self.max_results))?
            .into_iter()
            .map(|(d, score)| -> Result<ScoredBook, DbError> {
                Ok(ScoredBook { book: Book::try_from(&d)?, score })
            })
            .collect()
    }

    /// Dispatches a named query.
    ///
    /// # Errors
    /// Whatever the dispatched operation returns.
    pub fn run(&self, query: &CannedQuery) -> Result<QueryOutcome, DbError> {
        log::debug!("running `{}` on {}", query.label(), self.store.collection_name());
        Ok(match query {
            CannedQuery::ListAll => QueryOutcome::Books(self.list_all()?.collect::<Result<_, _>>()?),
            CannedQuery::FindByAuthor { author } => QueryOutcome::Books(self.find_by_author(author)?),
            CannedQuery::FindInStock => QueryOutcome::Books(self.find_in_stock()?),
            CannedQuery::CountAll => QueryOutcome::Count(self.count_all()?),
            CannedQuery::FindByYearRange { min, max } => {
                QueryOutcome::Books(self.find_by_year_range(*min, *max)?)
            }
            CannedQuery::FindByTitleSubstring { pattern } => {
                QueryOutcome::Books(self.find_by_title_substring(pattern)?)
            }
            CannedQuery::UpdatePrice { author, new_price } => {
                QueryOutcome::Updated(self.update_price(author, *new_price)?)
            }
            CannedQuery::AvgPriceByGenre => QueryOutcome::Genres(self.avg_price_by_genre()?),
            CannedQuery::MultiBookAuthors => QueryOutcome::Authors(self.multi_book_authors()?),
            CannedQuery::CreateSearchIndex => QueryOutcome::IndexCreated(self.create_search_index()?),
            CannedQuery::TextSearch { search_terms } => QueryOutcome::Scored(self.text_search(search_terms)?),
        })
    }
}
