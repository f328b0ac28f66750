use crate::errors::DbError;
use bson::Bson;
use serde::{Deserialize, Serialize};

use super::types::{CmpOp, Filter, MAX_IN_SET, UpdateDoc};

// Serde-facing structures for safe JSON parsing of filters/updates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSerde {
    And {
        #[serde(rename = "$and")]
        and: Vec<FilterSerde>,
    },
    Or {
        #[serde(rename = "$or")]
        or: Vec<FilterSerde>,
    },
    Not {
        #[serde(rename = "$not")]
        not: Box<FilterSerde>,
    },
    Exists {
        field: String,
        #[serde(rename = "$exists")]
        exists: bool,
    },
    In {
        field: String,
        #[serde(rename = "$in")]
        in_vals: Vec<Bson>,
    },
    Nin {
        field: String,
        #[serde(rename = "$nin")]
        nin_vals: Vec<Bson>,
    },
    Regex {
        field: String,
        #[serde(rename = "$regex")]
        pattern: String,
        #[serde(default)]
        case_insensitive: bool,
    },
    Cmp {
        field: String,
        #[serde(default, rename = "$eq")]
        eq: Option<Bson>,
        #[serde(default, rename = "$gt")]
        gt: Option<Bson>,
        #[serde(default, rename = "$gte")]
        gte: Option<Bson>,
        #[serde(default, rename = "$lt")]
        lt: Option<Bson>,
        #[serde(default, rename = "$lte")]
        lte: Option<Bson>,
    },
    True(bool),
}

impl TryFrom<FilterSerde> for Filter {
    type Error = DbError;
    fn try_from(fs: FilterSerde) -> Result<Self, Self::Error> {
        use FilterSerde as FS;
        Ok(match fs {
            FS::And { and } => {
                Self::And(and.into_iter().map(Self::try_from).collect::<Result<_, _>>()?)
            }
            FS::Or { or } => {
                Self::Or(or.into_iter().map(Self::try_from).collect::<Result<_, _>>()?)
            }
            FS::Not { not } => Self::Not(Box::new(Self::try_from(*not)?)),
            FS::Exists { field, exists } => Self::Exists { path: field, exists },
            FS::In { field, in_vals } => {
                Self::In { path: field, values: in_vals.into_iter().take(MAX_IN_SET).collect() }
            }
            FS::Nin { field, nin_vals } => {
                Self::Nin { path: field, values: nin_vals.into_iter().take(MAX_IN_SET).collect() }
            }
            FS::Regex { field, pattern, case_insensitive } => {
                Self::Regex { path: field, pattern, case_insensitive }
            }
            FS::Cmp { field, eq, gt, gte, lt, lte } => {
                // Several bounds on one field combine into a conjunction ({$gte, $lte} ranges).
                let mut parts = Vec::new();
                for (op, v) in [
                    (CmpOp::Eq, eq),
                    (CmpOp::Gt, gt),
                    (CmpOp::Gte, gte),
                    (CmpOp::Lt, lt),
                    (CmpOp::Lte, lte),
                ] {
                    if let Some(value) = v {
                        parts.push(Self::Cmp { path: field.clone(), op, value });
                    }
                }
                match parts.len() {
                    0 => return Err(DbError::QueryError("No comparison operator provided".into())),
                    1 => parts.remove(0),
                    _ => Self::And(parts),
                }
            }
            FS::True(b) => {
                if b {
                    Self::True
                } else {
                    Self::Not(Box::new(Self::True))
                }
            }
        })
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateDocSerde {
    #[serde(default, rename = "$set")]
    pub set: Option<bson::Document>,
    #[serde(default, rename = "$inc")]
    pub inc: Option<bson::Document>,
    #[serde(default, rename = "$unset")]
    pub unset: Option<Vec<String>>,
}

impl TryFrom<UpdateDocSerde> for UpdateDoc {
    type Error = DbError;
    fn try_from(us: UpdateDocSerde) -> Result<Self, Self::Error> {
        let mut out = Self::default();
        if let Some(setd) = us.set {
            for (k, v) in setd.into_iter().take(128) {
                out.set.push((k, v));
            }
        }
        if let Some(incd) = us.inc {
            for (k, v) in incd.into_iter().take(128) {
                #[allow(clippy::cast_precision_loss)]
                let f = match v {
                    Bson::Int32(i) => f64::from(i),
                    Bson::Int64(i) => i as f64,
                    Bson::Double(d) => d,
                    _ => {
                        return Err(DbError::QueryError("$inc requires numeric".into()));
                    }
                };
                out.inc.push((k, f));
            }
        }
        if let Some(unset) = us.unset {
            out.unset = unset.into_iter().take(128).collect();
        }
        if out.set.is_empty() && out.inc.is_empty() && out.unset.is_empty() {
            return Err(DbError::QueryError("update document has no operators".into()));
        }
        Ok(out)
    }
}

/// # Errors
/// Returns an error if the JSON string cannot be parsed into a filter structure.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    if json.trim() == "{}" {
        return Ok(Filter::True);
    }
    let fs: FilterSerde = serde_json::from_str(json)?;
    Filter::try_from(fs)
}

/// # Errors
/// Returns an error if the JSON string cannot be parsed into an update structure.
pub fn parse_update_json(json: &str) -> Result<UpdateDoc, DbError> {
    let us: UpdateDocSerde = serde_json::from_str(json)?;
    UpdateDoc::try_from(us)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_become_conjunction() {
        let f = parse_filter_json(r#"{"field":"published_year","$gte":1940,"$lte":1960}"#).unwrap();
        match f {
            Filter::And(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(&parts[0], Filter::Cmp { op: CmpOp::Gte, .. }));
                assert!(matches!(&parts[1], Filter::Cmp { op: CmpOp::Lte, .. }));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn empty_object_matches_everything() {
        assert_eq!(parse_filter_json("{}").unwrap(), Filter::True);
    }

    #[test]
    fn regex_filter_parses_flag() {
        let f = parse_filter_json(r#"{"field":"title","$regex":"the","case_insensitive":true}"#)
            .unwrap();
        assert!(matches!(f, Filter::Regex { case_insensitive: true, .. }));
    }

    #[test]
    fn update_without_operators_is_rejected() {
        assert!(parse_update_json("{}").is_err());
        let u = parse_update_json(r#"{"$set":{"price":15.99}}"#).unwrap();
        assert_eq!(u.set.len(), 1);
    }

    #[test]
    fn inc_rejects_non_numeric() {
        assert!(parse_update_json(r#"{"$inc":{"pages":"many"}}"#).is_err());
    }
}
