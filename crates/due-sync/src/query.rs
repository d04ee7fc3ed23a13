//! AQL query construction for child work order searches.
//!
//! Values are never spliced in raw: identifiers that are not plain tokens and
//! all string operands are rendered as escaped, double-quoted literals.
//! Only `"` and `\` are escaped. Identifiers carrying control characters
//! have no literal form and are rejected by the webhook handler before a
//! query is built (see [`ParentId::has_control_chars`]).

use crate::models::{Category, ParentId};

/// Source table for child record searches.
const SEARCH_TABLE: &str = "__main__";

/// Render a value as an AQL string literal.
///
/// `value` must not contain control characters.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    debug_assert!(!value.chars().any(char::is_control));
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render an identifier operand.
///
/// Plain tokens (ASCII alphanumerics, `-`, `_`) are emitted bare so the
/// common numeric case keeps the backend's native comparison; anything else
/// is quoted.
#[must_use]
pub fn identifier_literal(id: &str) -> String {
    let plain = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if plain {
        id.to_string()
    } else {
        quote_literal(id)
    }
}

/// Query selecting the children of `parent_id` tagged with `category`.
#[must_use]
pub fn child_search(parent_id: &ParentId, category: Category) -> String {
    format!(
        "select id, pkey, title, {field} from {SEARCH_TABLE} where parent_id eq {parent} AND pkey co {tag}",
        field = category.field(),
        parent = identifier_literal(parent_id.as_str()),
        tag = quote_literal(category.tag()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_search_matches_backend_format() {
        assert_eq!(
            child_search(&ParentId::new("1234"), Category::Maintenance),
            r#"select id, pkey, title, cf_next_pm_due_date from __main__ where parent_id eq 1234 AND pkey co "MNT""#
        );
        assert_eq!(
            child_search(&ParentId::new("1234"), Category::Calibration),
            r#"select id, pkey, title, cf_next_calibration_due from __main__ where parent_id eq 1234 AND pkey co "CAL""#
        );
        assert_eq!(
            child_search(&ParentId::new("1234"), Category::Requalification),
            r#"select id, pkey, title, cf_next_requalification from __main__ where parent_id eq 1234 AND pkey co "RQ""#
        );
    }

    #[test]
    fn test_hostile_identifier_is_quoted() {
        let query = child_search(
            &ParentId::new(r#"1 OR 1 eq 1 AND title co "x""#),
            Category::Calibration,
        );
        assert!(query.contains(r#"parent_id eq "1 OR 1 eq 1 AND title co \"x\"" AND"#));
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("plain"), r#""plain""#);
        assert_eq!(quote_literal(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(quote_literal("x'y z"), r#""x'y z""#);
    }

    #[test]
    fn test_identifier_literal() {
        assert_eq!(identifier_literal("abc-123_X"), "abc-123_X");
        assert_eq!(identifier_literal("a b"), r#""a b""#);
        assert_eq!(identifier_literal(""), r#""""#);
    }
}
