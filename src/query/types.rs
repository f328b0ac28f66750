use bson::Bson;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;
pub const MAX_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), order: Order::Asc }
    }

    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), order: Order::Desc }
    }
}

/// Options for `find_docs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Vec<String>>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl FindOptions {
    #[must_use]
    pub fn sorted(sort: Vec<SortSpec>) -> Self {
        Self { sort: Some(sort), ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    Regex { path: String, pattern: String, case_insensitive: bool },
}

impl Filter {
    pub fn eq(path: &str, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.to_string(), op: CmpOp::Eq, value: value.into() }
    }

    /// Inclusive range `min <= path <= max`.
    pub fn between(path: &str, min: impl Into<Bson>, max: impl Into<Bson>) -> Self {
        Self::And(vec![
            Self::Cmp { path: path.to_string(), op: CmpOp::Gte, value: min.into() },
            Self::Cmp { path: path.to_string(), op: CmpOp::Lte, value: max.into() },
        ])
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, f64)>,
    pub unset: Vec<String>,
}

impl UpdateDoc {
    pub fn set(field: &str, value: impl Into<Bson>) -> Self {
        Self { set: vec![(field.to_string(), value.into())], ..Self::default() }
    }
}

/// Acknowledgement returned by update operations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}
