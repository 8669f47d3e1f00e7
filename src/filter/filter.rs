use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::parser::is_valid_identifier;
use super::types::{FieldSet, FilterWhereOptions, Pagination, QueryOptions, SortTerm, SqlResult};

/// Builds the paired data and count statements for a filtered list.
///
/// Both statements are rendered from the same WHERE clause so totals always
/// agree with the page contents.
pub struct Filter<'a> {
    table_name: &'a str,
    allowed: &'a FieldSet,
    options: &'a QueryOptions,
    search: Option<(&'a [&'a str], &'a str)>,
    default_sort: SortTerm,
    where_options: FilterWhereOptions,
}

impl<'a> Filter<'a> {
    pub fn new(
        table_name: &'a str,
        allowed: &'a FieldSet,
        options: &'a QueryOptions,
        default_sort: SortTerm,
    ) -> Result<Self, FilterError> {
        if !is_valid_identifier(table_name) {
            return Err(FilterError::InvalidTableName(table_name.to_string()));
        }
        Ok(Self {
            table_name,
            allowed,
            options,
            search: None,
            default_sort,
            where_options: FilterWhereOptions::default(),
        })
    }

    pub fn search(mut self, columns: &'a [&'a str], term: &'a str) -> Self {
        self.search = Some((columns, term));
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.where_options.include_deleted = include;
        self
    }

    fn where_sql(&self) -> Result<(String, Vec<super::types::SqlParam>), FilterError> {
        let mut filter_where = FilterWhere::new(&self.where_options);
        if let Some((columns, term)) = self.search {
            filter_where.search(columns, term);
        }
        filter_where.apply(self.options, self.allowed)?;
        Ok(filter_where.build())
    }

    pub fn to_sql(&self, columns: &str, page: Pagination) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql()?;
        let order_clause = FilterOrder::generate(self.options.sort(), self.allowed, &self.default_sort);
        let limit_clause = format!("LIMIT {} OFFSET {}", page.limit, page.offset);

        let query = [
            format!("SELECT {}", columns),
            format!("FROM \"{}\"", self.table_name),
            where_clause,
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql()?;
        let mut query = format!("SELECT COUNT(*) AS count FROM \"{}\"", self.table_name);
        if !where_clause.is_empty() {
            query.push(' ');
            query.push_str(&where_clause);
        }
        Ok(SqlResult { query, params })
    }
}
