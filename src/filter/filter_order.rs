use super::parser::is_valid_identifier;
use super::types::{FieldSet, SortTerm};

pub struct FilterOrder;

impl FilterOrder {
    /// `ORDER BY` for the allow-listed terms. `default` applies only when
    /// nothing was requested, not when every requested term was rejected.
    pub fn generate(terms: &[SortTerm], allowed: &FieldSet, default: &SortTerm) -> String {
        let chosen: Vec<&SortTerm> = if terms.is_empty() {
            vec![default]
        } else {
            terms
                .iter()
                .filter(|t| allowed.contains(&t.field) && is_valid_identifier(&t.field))
                .collect()
        };

        if chosen.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = chosen
            .iter()
            .map(|t| format!("\"{}\" {}", t.field, t.direction.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::{ColumnKind, SortDirection};

    fn fields() -> FieldSet {
        FieldSet::new(&[("username", ColumnKind::Text), ("created_at", ColumnKind::Timestamp)])
    }

    fn default_sort() -> SortTerm {
        SortTerm::new("created_at", SortDirection::Desc)
    }

    #[test]
    fn default_when_unsorted() {
        assert_eq!(
            FilterOrder::generate(&[], &fields(), &default_sort()),
            "ORDER BY \"created_at\" DESC"
        );
    }

    #[test]
    fn explicit_terms_replace_default() {
        let terms = vec![
            SortTerm::new("username", SortDirection::Asc),
            SortTerm::new("created_at", SortDirection::Asc),
        ];
        assert_eq!(
            FilterOrder::generate(&terms, &fields(), &default_sort()),
            "ORDER BY \"username\" ASC, \"created_at\" ASC"
        );
    }

    #[test]
    fn rejected_terms_are_skipped() {
        let terms = vec![SortTerm::new("password_hash", SortDirection::Asc)];
        assert_eq!(FilterOrder::generate(&terms, &fields(), &default_sort()), "");
    }
}
