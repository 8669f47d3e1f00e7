use super::error::FilterError;
use super::parser::is_valid_identifier;
use super::types::{FieldSet, FilterCondition, FilterOp, FilterWhereOptions, QueryOptions, SqlParam};

/// Accumulates WHERE conditions with `$n` placeholders
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    conditions: Vec<String>,
}

impl FilterWhere {
    pub fn new(options: &FilterWhereOptions) -> Self {
        let mut conditions = vec![];
        if !options.include_deleted {
            conditions.push("\"deleted_at\" IS NULL".to_string());
        }
        Self {
            param_values: vec![],
            conditions,
        }
    }

    /// OR of case-insensitive partial matches across `columns`
    pub fn search(&mut self, columns: &[&str], term: &str) {
        let pattern = format!("%{}%", term);
        let parts: Vec<String> = columns
            .iter()
            .filter(|c| is_valid_identifier(c))
            .map(|c| format!("\"{}\" ILIKE {}", c, self.param(SqlParam::Text(pattern.clone()))))
            .collect();
        if !parts.is_empty() {
            self.conditions.push(format!("({})", parts.join(" OR ")));
        }
    }

    /// Render every allow-listed filter in `options`
    pub fn apply(&mut self, options: &QueryOptions, allowed: &FieldSet) -> Result<(), FilterError> {
        for (field, condition) in options.filters() {
            if !is_valid_identifier(field) {
                continue;
            }
            let Some(kind) = allowed.kind(field) else {
                continue;
            };
            if let Some(sql) = self.build_sql_condition(field, kind, condition)? {
                self.conditions.push(sql);
            }
        }
        Ok(())
    }

    fn build_sql_condition(
        &mut self,
        field: &str,
        kind: super::types::ColumnKind,
        condition: &FilterCondition,
    ) -> Result<Option<String>, FilterError> {
        let quoted_column = format!("\"{}\"", field);
        let comparison = |op: &str, this: &mut Self| -> Result<Option<String>, FilterError> {
            let param = SqlParam::parse(field, kind, &condition.value)?;
            Ok(Some(format!("{} {} {}", quoted_column, op, this.param(param))))
        };

        match condition.op {
            FilterOp::Eq => comparison("=", self),
            FilterOp::Ne => comparison("<>", self),
            FilterOp::Gt => comparison(">", self),
            FilterOp::Gte => comparison(">=", self),
            FilterOp::Lt => comparison("<", self),
            FilterOp::Lte => comparison("<=", self),
            FilterOp::Like => {
                let pattern = SqlParam::Text(format!("%{}%", condition.value));
                Ok(Some(format!("CAST({} AS TEXT) ILIKE {}", quoted_column, self.param(pattern))))
            }
            FilterOp::In | FilterOp::NotIn => {
                let values = condition.list_values();
                if values.is_empty() {
                    // Empty IN matches nothing; empty NOT IN matches everything
                    return Ok(match condition.op {
                        FilterOp::In => Some("1=0".to_string()),
                        _ => None,
                    });
                }
                let mut params = Vec::with_capacity(values.len());
                for value in values {
                    let param = SqlParam::parse(field, kind, value)?;
                    params.push(self.param(param));
                }
                let keyword = if condition.op == FilterOp::In { "IN" } else { "NOT IN" };
                Ok(Some(format!("{} {} ({})", quoted_column, keyword, params.join(", "))))
            }
        }
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        format!("${}", self.param_values.len())
    }

    /// `WHERE ...` (or empty) plus the bind values in placeholder order
    pub fn build(self) -> (String, Vec<SqlParam>) {
        let clause = if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        };
        (clause, self.param_values)
    }
}
