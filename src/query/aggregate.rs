//! Aggregation pipeline: `$group` with accumulators, `$match`, `$sort`, `$limit`.

use crate::collection::Collection;
use crate::errors::DbError;
use crate::utils::querylog;
use bson::{Bson, Document as BsonDocument};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use super::eval::{CompiledFilter, as_f64, compare_docs, get_path};
use super::parse::FilterSerde;
use super::types::{Filter, MAX_LIMIT, Order, SortSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accumulator {
    /// Sum of a numeric field; non-numeric and missing values are ignored.
    Sum(String),
    /// Number of documents in the group.
    Count,
    /// Mean of a numeric field; null when the group has no numeric values.
    Avg(String),
    /// Values of a field in group order; missing values are skipped.
    Push(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Groups by the value at `key` (null when missing); the key lands in `_id`.
    Group { key: String, accumulators: Vec<(String, Accumulator)> },
    Match(Filter),
    Sort(Vec<SortSpec>),
    Limit(usize),
}

enum AccState {
    Sum { int: i64, float: f64, all_int: bool },
    Count(i64),
    Avg { total: f64, n: u64 },
    Push(Vec<Bson>),
}

impl AccState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => Self::Sum { int: 0, float: 0.0, all_int: true },
            Accumulator::Count => Self::Count(0),
            Accumulator::Avg(_) => Self::Avg { total: 0.0, n: 0 },
            Accumulator::Push(_) => Self::Push(Vec::new()),
        }
    }

    fn feed(&mut self, acc: &Accumulator, doc: &BsonDocument) {
        match (self, acc) {
            (Self::Sum { int, float, all_int }, Accumulator::Sum(path)) => {
                match get_path(doc, path) {
                    Some(Bson::Int32(i)) => *int = int.saturating_add(i64::from(*i)),
                    Some(Bson::Int64(i)) => *int = int.saturating_add(*i),
                    Some(Bson::Double(f)) => {
                        *float += f;
                        *all_int = false;
                    }
                    _ => {}
                }
            }
            (Self::Count(n), Accumulator::Count) => *n += 1,
            (Self::Avg { total, n }, Accumulator::Avg(path)) => {
                if let Some(v) = get_path(doc, path).and_then(as_f64) {
                    *total += v;
                    *n += 1;
                }
            }
            (Self::Push(items), Accumulator::Push(path)) => {
                if let Some(v) = get_path(doc, path) {
                    items.push(v.clone());
                }
            }
            _ => {}
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Bson {
        match self {
            Self::Sum { int, float, all_int } => {
                if all_int {
                    integral(int)
                } else {
                    Bson::Double(int as f64 + float)
                }
            }
            Self::Count(n) => integral(n),
            Self::Avg { total, n } => {
                if n == 0 {
                    Bson::Null
                } else {
                    Bson::Double(total / n as f64)
                }
            }
            Self::Push(items) => Bson::Array(items),
        }
    }
}

/// Int32 when it fits, Int64 otherwise.
fn integral(n: i64) -> Bson {
    i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32)
}

fn group(docs: Vec<BsonDocument>, key: &str, accs: &[(String, Accumulator)]) -> Vec<BsonDocument> {
    // First-seen order; group counts are small so a linear key scan is fine.
    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for d in &docs {
        let k = get_path(d, key).cloned().unwrap_or(Bson::Null);
        let pos = match groups.iter().position(|(g, _)| *g == k) {
            Some(p) => p,
            None => {
                groups.push((k, accs.iter().map(|(_, a)| AccState::new(a)).collect()));
                groups.len() - 1
            }
        };
        for (state, (_, acc)) in groups[pos].1.iter_mut().zip(accs) {
            state.feed(acc, d);
        }
    }
    groups
        .into_iter()
        .map(|(k, states)| {
            let mut out = BsonDocument::new();
            out.insert("_id", k);
            for (state, (name, _)) in states.into_iter().zip(accs) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect()
}

/// Runs `pipeline` over already-fetched documents.
#[must_use]
pub fn run_pipeline(mut docs: Vec<BsonDocument>, pipeline: &[Stage]) -> Vec<BsonDocument> {
    for stage in pipeline {
        docs = match stage {
            Stage::Group { key, accumulators } => group(docs, key, accumulators),
            Stage::Match(f) => {
                let matcher = CompiledFilter::new(f.clone());
                docs.into_iter().filter(|d| matcher.matches(d)).collect()
            }
            Stage::Sort(spec) => {
                docs.sort_by(|a, b| compare_docs(a, b, spec));
                docs
            }
            Stage::Limit(n) => {
                docs.truncate(*n);
                docs
            }
        };
    }
    docs
}

/// Runs `pipeline` over every document in the collection, in insertion order.
pub fn aggregate(col: &Arc<Collection>, pipeline: &[Stage]) -> Vec<BsonDocument> {
    let started = Instant::now();
    let docs: Vec<BsonDocument> = col.get_all_documents().into_iter().map(|d| d.data).collect();
    let out = run_pipeline(docs, pipeline);
    querylog::record("aggregate", &col.name_str(), started, out.len());
    out
}

fn field_ref(v: &Value) -> Result<String, DbError> {
    v.as_str()
        .and_then(|s| s.strip_prefix('$'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DbError::QueryError(format!("expected a \"$field\" reference, got {v}")))
}

fn parse_accumulator(v: &Value) -> Result<Accumulator, DbError> {
    let obj = v
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| DbError::QueryError(format!("accumulator must be a one-key object: {v}")))?;
    let (op, arg) = obj.iter().next().ok_or_else(|| DbError::QueryError("empty accumulator".into()))?;
    match op.as_str() {
        "$sum" if arg.as_i64() == Some(1) => Ok(Accumulator::Count),
        "$sum" => Ok(Accumulator::Sum(field_ref(arg)?)),
        "$avg" => Ok(Accumulator::Avg(field_ref(arg)?)),
        "$push" => Ok(Accumulator::Push(field_ref(arg)?)),
        other => Err(DbError::QueryError(format!("unsupported accumulator {other}"))),
    }
}

fn parse_stage(v: &Value) -> Result<Stage, DbError> {
    let obj = v
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| DbError::QueryError(format!("stage must be a one-key object: {v}")))?;
    let (name, body) = obj.iter().next().ok_or_else(|| DbError::QueryError("empty stage".into()))?;
    match name.as_str() {
        "$group" => {
            let spec = body
                .as_object()
                .ok_or_else(|| DbError::QueryError("$group expects an object".into()))?;
            let key = field_ref(
                spec.get("_id").ok_or_else(|| DbError::QueryError("$group needs _id".into()))?,
            )?;
            let accumulators = spec
                .iter()
                .filter(|(k, _)| k.as_str() != "_id")
                .map(|(k, a)| Ok((k.clone(), parse_accumulator(a)?)))
                .collect::<Result<Vec<_>, DbError>>()?;
            Ok(Stage::Group { key, accumulators })
        }
        "$match" => {
            let fs: FilterSerde = serde_json::from_value(body.clone())?;
            Ok(Stage::Match(Filter::try_from(fs)?))
        }
        "$sort" => {
            let spec = body
                .as_object()
                .ok_or_else(|| DbError::QueryError("$sort expects an object".into()))?;
            let sort = spec
                .iter()
                .map(|(field, dir)| match dir.as_i64() {
                    Some(1) => Ok(SortSpec { field: field.clone(), order: Order::Asc }),
                    Some(-1) => Ok(SortSpec { field: field.clone(), order: Order::Desc }),
                    _ => Err(DbError::QueryError(format!("sort direction for {field} must be 1 or -1"))),
                })
                .collect::<Result<Vec<_>, DbError>>()?;
            Ok(Stage::Sort(sort))
        }
        "$limit" => {
            let n = body
                .as_u64()
                .ok_or_else(|| DbError::QueryError("$limit expects a non-negative integer".into()))?;
            Ok(Stage::Limit(usize::try_from(n).unwrap_or(MAX_LIMIT).min(MAX_LIMIT)))
        }
        other => Err(DbError::QueryError(format!("unsupported stage {other}"))),
    }
}

/// Parses a JSON array of stages. `$match` bodies use the same filter form as
/// `parse_filter_json`.
///
/// # Errors
/// Returns an error on malformed JSON or an unsupported stage or accumulator.
pub fn parse_pipeline_json(json: &str) -> Result<Vec<Stage>, DbError> {
    let v: Value = serde_json::from_str(json)?;
    let stages =
        v.as_array().ok_or_else(|| DbError::QueryError("pipeline must be a JSON array".into()))?;
    stages.iter().map(parse_stage).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn docs() -> Vec<BsonDocument> {
        vec![
            doc! {"genre": "Fiction", "price": 10.0, "pages": 100},
            doc! {"genre": "Science", "price": 30.0, "pages": 300},
            doc! {"genre": "Fiction", "price": 20.0, "pages": 200},
            doc! {"genre": "Poetry", "pages": 50},
        ]
    }

    #[test]
    fn group_keeps_first_seen_order_and_accumulates() {
        let out = run_pipeline(
            docs(),
            &[Stage::Group {
                key: "genre".into(),
                accumulators: vec![
                    ("avg".into(), Accumulator::Avg("price".into())),
                    ("n".into(), Accumulator::Count),
                    ("pages".into(), Accumulator::Sum("pages".into())),
                ],
            }],
        );
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].get("_id"), Some(&Bson::String("Fiction".into())));
        assert_eq!(out[0].get("avg"), Some(&Bson::Double(15.0)));
        assert_eq!(out[0].get("n"), Some(&Bson::Int32(2)));
        assert_eq!(out[0].get("pages"), Some(&Bson::Int32(300)));
        assert_eq!(out[2].get("avg"), Some(&Bson::Null));
    }

    #[test]
    fn mixed_sum_becomes_double() {
        let out = run_pipeline(
            vec![doc! {"g": 1, "v": 1}, doc! {"g": 1, "v": 0.5}],
            &[Stage::Group { key: "g".into(), accumulators: vec![("s".into(), Accumulator::Sum("v".into()))] }],
        );
        assert_eq!(out[0].get("s"), Some(&Bson::Double(1.5)));
    }

    #[test]
    fn parses_group_match_sort_limit() {
        let p = parse_pipeline_json(
            r#"[
                {"$group": {"_id": "$author", "bookCount": {"$sum": 1}, "books": {"$push": "$title"}}},
                {"$match": {"field": "bookCount", "$gt": 1}},
                {"$sort": {"bookCount": -1}},
                {"$limit": 5}
            ]"#,
        )
        .unwrap();
        assert_eq!(p.len(), 4);
        assert!(matches!(&p[0], Stage::Group { key, accumulators } if key == "author" && accumulators.len() == 2));
        assert_eq!(p[2], Stage::Sort(vec![SortSpec::desc("bookCount")]));
        assert_eq!(p[3], Stage::Limit(5));
    }

    #[test]
    fn rejects_unknown_stage_and_bad_reference() {
        assert!(parse_pipeline_json(r#"[{"$unwind": "$tags"}]"#).is_err());
        assert!(parse_pipeline_json(r#"[{"$group": {"_id": "genre"}}]"#).is_err());
        assert!(parse_pipeline_json(r#"{"$limit": 1}"#).is_err());
    }
}
