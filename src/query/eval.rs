use bson::{Bson, Document as BsonDocument};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_IN_SET, MAX_PATH_DEPTH, MAX_SORT_FIELDS, Order, SortSpec};

/// Regexes of one filter, compiled once. Invalid patterns are kept as `None` and match nothing.
type Compiled = Vec<(String, bool, Option<Regex>)>;

fn collect_regexes(filter: &Filter, out: &mut Compiled) {
    match filter {
        Filter::And(fs) | Filter::Or(fs) => fs.iter().for_each(|f| collect_regexes(f, out)),
        Filter::Not(f) => collect_regexes(f, out),
        Filter::Regex { pattern, case_insensitive, .. } => {
            if !out.iter().any(|(p, ci, _)| p == pattern && ci == case_insensitive) {
                let re = RegexBuilder::new(pattern).case_insensitive(*case_insensitive).build();
                if let Err(e) = &re {
                    log::warn!("invalid regex {pattern:?}: {e}");
                }
                out.push((pattern.clone(), *case_insensitive, re.ok()));
            }
        }
        _ => {}
    }
}

/// A filter whose regexes are compiled up front, for evaluation against many documents.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    filter: Filter,
    regexes: Compiled,
}

impl CompiledFilter {
    #[must_use]
    pub fn new(filter: Filter) -> Self {
        let mut regexes = Vec::new();
        collect_regexes(&filter, &mut regexes);
        Self { filter, regexes }
    }

    #[must_use]
    pub fn matches(&self, doc: &BsonDocument) -> bool {
        eval(doc, &self.filter, &self.regexes)
    }

    /// Distinct regex patterns compiled for this filter.
    #[must_use]
    pub fn regex_count(&self) -> usize {
        self.regexes.len()
    }
}

/// One-off evaluation. Prefer [`CompiledFilter`] when the same filter runs over many documents.
pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    let mut regexes = Vec::new();
    collect_regexes(filter, &mut regexes);
    eval(doc, filter, &regexes)
}

fn eval(doc: &BsonDocument, filter: &Filter, regexes: &Compiled) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval(doc, f, regexes)),
        Filter::Or(fs) => fs.iter().any(|f| eval(doc, f, regexes)),
        Filter::Not(f) => !eval(doc, f, regexes),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op, value } => match get_path(doc, path) {
            Some(v) => {
                let c = compare_bson(v, value);
                match op {
                    CmpOp::Eq => c == Ordering::Equal && same_kind(v, value),
                    CmpOp::Gt => c == Ordering::Greater && same_kind(v, value),
                    CmpOp::Gte => c != Ordering::Less && same_kind(v, value),
                    CmpOp::Lt => c == Ordering::Less && same_kind(v, value),
                    CmpOp::Lte => c != Ordering::Greater && same_kind(v, value),
                }
            }
            None => false,
        },
        Filter::Regex { path, pattern, case_insensitive } => {
            let Some(Bson::String(s)) = get_path(doc, path) else {
                return false;
            };
            regexes
                .iter()
                .find(|(p, ci, _)| p == pattern && ci == case_insensitive)
                .and_then(|(_, _, re)| re.as_ref())
                .is_some_and(|re| re.is_match(s))
        }
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let va = get_path(a, &s.field);
        let vb = get_path(b, &s.field);
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter()
        .take(MAX_IN_SET)
        .any(|x| same_kind(v, x) && compare_bson(v, x) == Ordering::Equal)
}

/// Numbers compare across int32/int64/double; other types only with themselves.
fn same_kind(a: &Bson, b: &Bson) -> bool {
    (as_f64(a).is_some() && as_f64(b).is_some()) || type_rank(a) == type_rank(b)
}

/// Resolves a dotted path (`info.visits`) against nested documents.
pub fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut cur = doc.get(first)?;
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

/// Numeric view of a bson value; `None` for non-numbers.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Integers compare exactly as `i64`; a double on either side compares as `f64`.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::Null, Bson::Null) => Ordering::Equal,
        (Bson::Array(x), Bson::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let c = compare_bson(l, r);
                if c != Ordering::Equal {
                    return c;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 1,
        Bson::String(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Boolean(_) => 5,
        Bson::DateTime(_) => 6,
        _ => 7,
    }
}

#[must_use]
pub fn project_fields(doc: &BsonDocument, fields: &[String]) -> BsonDocument {
    let mut out = BsonDocument::new();
    for f in fields {
        if let Some(v) = doc.get(f) {
            out.insert(f.clone(), v.clone());
        }
    }
    out
}
