// Query-string parsing: `field[op]=value`, `sort=a,-b`, `page`/`limit`/`offset`

use std::collections::HashMap;

use super::types::{FieldSet, FilterOp, Pagination, QueryOptions, SortDirection};

pub const SORT_PARAM: &str = "sort";
pub const SEARCH_PARAM: &str = "search";
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Identifiers interpolated into SQL must match `^[A-Za-z_][A-Za-z0-9_]*$`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split `field[op]` into its field and operator token; no brackets means `eq`
fn split_key(key: &str) -> (&str, Option<&str>) {
    match (key.find('['), key.find(']')) {
        (Some(start), Some(end)) if start < end => (&key[..start], Some(&key[start + 1..end])),
        _ => (key, None),
    }
}

/// Build `QueryOptions` from raw parameters, silently dropping anything the
/// allow-list does not name.
pub fn parse_query_params(params: &HashMap<String, String>, allowed: &FieldSet) -> QueryOptions {
    let mut opts = QueryOptions::new();

    for (key, value) in params {
        if value.is_empty() {
            continue;
        }

        if key == SORT_PARAM {
            parse_sort_param(value, allowed, &mut opts);
            continue;
        }

        let (field, token) = split_key(key);
        if !allowed.contains(field) || !is_valid_identifier(field) {
            continue;
        }

        let op = match token {
            None => FilterOp::Eq,
            Some(t) => match FilterOp::from_token(t) {
                Some(op) => op,
                None => {
                    tracing::debug!(field, operator = t, "dropping filter with unknown operator");
                    continue;
                }
            },
        };

        opts.add_filter(field, op, value.as_str());
    }

    opts
}

fn parse_sort_param(value: &str, allowed: &FieldSet, opts: &mut QueryOptions) {
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (field, direction) = match part.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Desc),
            None => (part, SortDirection::Asc),
        };

        if allowed.contains(field) && is_valid_identifier(field) {
            opts.add_sort(field, direction);
        }
    }
}

/// Offset/limit from `page`, `limit` and `offset`. Once a `page` key is
/// present `offset` is ignored, even when the page itself is unusable.
pub fn parse_pagination(params: &HashMap<String, String>, default_limit: i64) -> Pagination {
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<i64>().ok())
        .filter(|l| *l > 0)
        .map(|l| l.min(MAX_LIMIT))
        .unwrap_or(default_limit);

    let offset = match params.get("page") {
        Some(page) => page
            .parse::<i64>()
            .ok()
            .filter(|p| *p > 0)
            .map(|p| (p - 1).saturating_mul(limit))
            .unwrap_or(0),
        None => params
            .get("offset")
            .and_then(|o| o.parse::<i64>().ok())
            .filter(|o| *o >= 0)
            .unwrap_or(0),
    };

    Pagination { offset, limit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::{ColumnKind, SortTerm};

    fn fields() -> FieldSet {
        FieldSet::new(&[
            ("username", ColumnKind::Text),
            ("status", ColumnKind::Text),
            ("created_at", ColumnKind::Timestamp),
            ("id", ColumnKind::Integer),
            ("bad-name", ColumnKind::Text),
            ("9lives", ColumnKind::Text),
        ])
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn every_operator_round_trips_into_a_filter() {
        for token in ["eq", "ne", "gt", "gte", "lt", "lte", "like", "in", "nin"] {
            let key = format!("username[{}]", token);
            let opts = parse_query_params(&params(&[(&key, "bob")]), &fields());

            let cond = opts.filter("username").unwrap();
            assert_eq!(cond.op.token(), token);
            assert_eq!(cond.value, "bob");
        }
    }

    #[test]
    fn bare_key_defaults_to_eq() {
        let opts = parse_query_params(&params(&[("status", "ACTIVE")]), &fields());
        assert_eq!(opts.filter("status").unwrap().op, FilterOp::Eq);
    }

    #[test]
    fn fields_outside_allow_list_are_dropped() {
        let opts = parse_query_params(
            &params(&[("password_hash", "x"), ("deleted_at[gt]", "2020-01-01"), ("limit", "5")]),
            &fields(),
        );
        assert_eq!(opts.filters().count(), 0);
    }

    #[test]
    fn unsafe_identifiers_never_apply_even_when_allowed() {
        let opts = parse_query_params(
            &params(&[("bad-name", "x"), ("9lives[eq]", "y"), ("sort", "bad-name,-9lives")]),
            &fields(),
        );
        assert_eq!(opts.filters().count(), 0);
        assert!(opts.sort().is_empty());
    }

    #[test]
    fn unknown_operator_and_empty_value_are_dropped() {
        let opts = parse_query_params(
            &params(&[("username[regex]", "^a"), ("status", "")]),
            &fields(),
        );
        assert_eq!(opts.filters().count(), 0);
    }

    #[test]
    fn sort_keeps_order_and_direction() {
        let opts = parse_query_params(&params(&[("sort", "username,-created_at, id ,nope")]), &fields());
        assert_eq!(
            opts.sort(),
            &[
                SortTerm::new("username", SortDirection::Asc),
                SortTerm::new("created_at", SortDirection::Desc),
                SortTerm::new("id", SortDirection::Asc),
            ]
        );
    }

    #[test]
    fn identifier_pattern() {
        assert!(is_valid_identifier("created_at"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("name;drop"));
        assert!(!is_valid_identifier("\"id\""));
        assert!(!is_valid_identifier("naïve"));
    }

    #[test]
    fn page_converts_to_offset() {
        let p = parse_pagination(&params(&[("page", "2"), ("limit", "10")]), DEFAULT_LIMIT);
        assert_eq!(p, Pagination { offset: 10, limit: 10 });
    }

    #[test]
    fn limit_is_capped_and_defaulted() {
        let p = parse_pagination(&params(&[("limit", "500")]), DEFAULT_LIMIT);
        assert_eq!(p.limit, MAX_LIMIT);

        let p = parse_pagination(&params(&[("limit", "0")]), DEFAULT_LIMIT);
        assert_eq!(p.limit, DEFAULT_LIMIT);

        let p = parse_pagination(&params(&[]), DEFAULT_LIMIT);
        assert_eq!(p, Pagination { offset: 0, limit: 20 });
    }

    #[test]
    fn page_takes_precedence_over_offset() {
        let p = parse_pagination(&params(&[("page", "3"), ("offset", "7"), ("limit", "5")]), DEFAULT_LIMIT);
        assert_eq!(p.offset, 10);

        let p = parse_pagination(&params(&[("offset", "7")]), DEFAULT_LIMIT);
        assert_eq!(p.offset, 7);

        let p = parse_pagination(&params(&[("offset", "-3")]), DEFAULT_LIMIT);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn huge_page_saturates_instead_of_overflowing() {
        let p = parse_pagination(&params(&[("page", "9223372036854775807"), ("limit", "20")]), DEFAULT_LIMIT);
        assert_eq!(p, Pagination { offset: i64::MAX, limit: 20 });
        assert!(p.page() > 0);
    }

    #[test]
    fn unusable_page_still_shadows_offset() {
        for page in ["abc", "0", "-2", ""] {
            let p = parse_pagination(&params(&[("page", page), ("offset", "7")]), DEFAULT_LIMIT);
            assert_eq!(p.offset, 0, "page={:?}", page);
        }
    }
}
