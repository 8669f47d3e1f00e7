// handlers/elevated/users/list.rs - GET /api/v1/users handler

use std::collections::HashMap;

use axum::extract::{RawQuery, State};

use crate::api::{ListResponse, UserResponse};
use crate::database::models::user::USER_QUERY_FIELDS;
use crate::filter::{parse_pagination, parse_query_params, DEFAULT_LIMIT};
use crate::middleware::{ApiResponse, ApiResult};
use crate::router::AppState;

/**
 * GET /api/v1/users - Filtered, sorted, paginated listing
 *
 * Query string: `page`, `limit`, `offset`, `sort=a,-b`, `<field>[<op>]=<value>`
 * and the reserved `search=<text>`. Unknown fields are ignored.
 */
pub async fn user_list(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<ListResponse<UserResponse>> {
    let params = query_params(query.as_deref());
    let page = parse_pagination(&params, DEFAULT_LIMIT);
    let options = parse_query_params(&params, &USER_QUERY_FIELDS);

    let result = state.users.list(page, options).await?;
    let items = result.items.iter().map(UserResponse::from).collect();

    Ok(ApiResponse::success(ListResponse::new(items, result.total, page)))
}

/// Decode a query string; when a key repeats the first value wins
fn query_params(raw: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}
