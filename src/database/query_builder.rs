use sqlx::{
    postgres::{PgArguments, PgRow},
    query::{QueryAs, QueryScalar},
    FromRow, PgPool, Postgres,
};

use crate::filter::{SqlParam, SqlResult};

use super::StoreError;

/// Runs rendered filter statements against the pool
pub struct QueryBuilder;

impl QueryBuilder {
    pub async fn select_all<T>(pool: &PgPool, sql: &SqlResult) -> Result<Vec<T>, StoreError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut q = sqlx::query_as::<_, T>(&sql.query);
        for p in &sql.params {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_all(pool).await?)
    }

    pub async fn count(pool: &PgPool, sql: &SqlResult) -> Result<i64, StoreError> {
        let mut q: QueryScalar<'_, Postgres, i64, PgArguments> = sqlx::query_scalar(&sql.query);
        for p in &sql.params {
            q = match p {
                SqlParam::Text(v) => q.bind(v.clone()),
                SqlParam::Integer(v) => q.bind(*v),
                SqlParam::Timestamp(v) => q.bind(*v),
            };
        }
        Ok(q.fetch_one(pool).await?)
    }
}

pub fn bind_param_query_as<'q, T>(
    q: QueryAs<'q, Postgres, T, PgArguments>,
    p: &SqlParam,
) -> QueryAs<'q, Postgres, T, PgArguments> {
    match p {
        SqlParam::Text(v) => q.bind(v.clone()),
        SqlParam::Integer(v) => q.bind(*v),
        SqlParam::Timestamp(v) => q.bind(*v),
    }
}
