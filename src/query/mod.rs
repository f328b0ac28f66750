// Submodules for separation of concerns
pub mod aggregate;
mod cursor;
mod eval;
mod exec;
mod parse;
pub mod text;
mod types;

// Public API re-exports
pub use aggregate::{Accumulator, Stage, aggregate, parse_pipeline_json, run_pipeline};
pub use cursor::Cursor;
pub use eval::{CompiledFilter, compare_bson, eval_filter};
pub use exec::{apply_update, count_docs, find_docs, text_search, update_many, update_one};
pub use parse::{FilterSerde, UpdateDocSerde, parse_filter_json, parse_update_json};
pub use text::{TextIndexSpec, tokenize};
pub use types::{CmpOp, Filter, FindOptions, MAX_LIMIT, Order, SortSpec, UpdateDoc, UpdateReport};
