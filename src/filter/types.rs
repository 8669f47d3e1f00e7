use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    #[serde(rename = "nin")]
    NotIn,
}

impl FilterOp {
    /// Parse the bracketed operator token of `field[op]`
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(FilterOp::Eq),
            "ne" => Some(FilterOp::Ne),
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            "like" => Some(FilterOp::Like),
            "in" => Some(FilterOp::In),
            "nin" => Some(FilterOp::NotIn),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Like => "like",
            FilterOp::In => "in",
            FilterOp::NotIn => "nin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCondition {
    pub op: FilterOp,
    pub value: String,
}

impl FilterCondition {
    /// Comma-separated members for `in`/`nin`
    pub fn list_values(&self) -> Vec<&str> {
        self.value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTerm {
    pub field: String,
    pub direction: SortDirection,
}

impl SortTerm {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Parsed filter and sort options for a list request.
///
/// At most one filter per field. The only mutation after parsing is
/// [`QueryOptions::take_search`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    filters: BTreeMap<String, FilterCondition>,
    sort: Vec<SortTerm>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(&mut self, field: impl Into<String>, op: FilterOp, value: impl Into<String>) {
        self.filters.insert(
            field.into(),
            FilterCondition {
                op,
                value: value.into(),
            },
        );
    }

    pub fn add_sort(&mut self, field: impl Into<String>, direction: SortDirection) {
        self.sort.push(SortTerm::new(field, direction));
    }

    pub fn filters(&self) -> impl Iterator<Item = (&str, &FilterCondition)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn filter(&self, field: &str) -> Option<&FilterCondition> {
        self.filters.get(field)
    }

    pub fn sort(&self) -> &[SortTerm] {
        &self.sort
    }

    /// Remove the reserved `search` filter and return its value
    pub fn take_search(&mut self) -> Option<String> {
        self.filters
            .remove(super::parser::SEARCH_PARAM)
            .map(|c| c.value)
            .filter(|v| !v.is_empty())
    }
}

/// Storage type of a filterable column; decides how values are bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Timestamp,
}

/// Allow-list of filterable and sortable fields
#[derive(Debug, Clone)]
pub struct FieldSet {
    fields: HashMap<&'static str, ColumnKind>,
}

impl FieldSet {
    pub fn new(fields: &[(&'static str, ColumnKind)]) -> Self {
        Self {
            fields: fields.iter().copied().collect(),
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn kind(&self, field: &str) -> Option<ColumnKind> {
        self.fields.get(field).copied()
    }

    /// Copy of this set with one more field
    pub fn with(mut self, field: &'static str, kind: ColumnKind) -> Self {
        self.fields.insert(field, kind);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn page(&self) -> i64 {
        self.offset / self.limit + 1
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

/// Typed bind value for a `$n` placeholder
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl SqlParam {
    /// Read a raw query-string value as the given column kind
    pub fn parse(field: &str, kind: ColumnKind, raw: &str) -> Result<Self, FilterError> {
        let invalid = || FilterError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
        };
        match kind {
            ColumnKind::Text => Ok(SqlParam::Text(raw.to_string())),
            ColumnKind::Integer => raw.trim().parse().map(SqlParam::Integer).map_err(|_| invalid()),
            ColumnKind::Timestamp => {
                let raw = raw.trim();
                if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
                    return Ok(SqlParam::Timestamp(ts.with_timezone(&Utc)));
                }
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| SqlParam::Timestamp(dt.and_utc()))
                    .ok_or_else(invalid)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterWhereOptions {
    pub include_deleted: bool,
}
