//! Ordering of rows and shaped lists by a named field.
//!
//! Items missing the field sort before items that have it; ties fall back to
//! the item's own text. Sorting never fails.

use crate::row::BindingRow;
use crate::shape::Shaped;

// Text used as the tie-breaker and for items without the field.
fn sort_text(item: &Shaped) -> String {
    match item {
        Shaped::Scalar(value) => value.clone(),
        other => other.to_json().to_string(),
    }
}

fn field_text(item: &Shaped, key: &str) -> Option<String> {
    match item {
        Shaped::Map(map) => map.get(key).map(sort_text),
        _ => None,
    }
}

fn sort_items(items: &mut [Shaped], key: &str) {
    items.sort_by_cached_key(|item| (field_text(item, key), sort_text(item)));
}

/// Sorts a top-level list in `shaped` by `key`.
///
/// Lists of scalars sort by the scalar text. Grouped and entity results are
/// left alone: their promoted lists keep row-arrival order.
pub fn sort_shaped(shaped: &mut Shaped, key: &str) {
    if let Shaped::List(items) = shaped {
        sort_items(items, key);
    }
}

/// Stable sort of `rows` by the value bound to `key`; rows without it first.
pub fn sort_rows(rows: &mut [BindingRow], key: &str) {
    rows.sort_by(|a, b| a.value(key).cmp(&b.value(key)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Shaped {
        Shaped::Map(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), Shaped::Scalar((*v).to_string())))
                .collect(),
        )
    }

    #[test]
    fn test_sort_list_of_records() {
        let mut shaped = Shaped::List(vec![
            record(&[("name", "b")]),
            record(&[("name", "a")]),
            record(&[("other", "z")]),
        ]);
        sort_shaped(&mut shaped, "name");
        let names: Vec<_> = shaped
            .as_list()
            .unwrap()
            .iter()
            .map(|item| item.get("name").and_then(|n| n.as_scalar().map(str::to_string)))
            .collect();
        assert_eq!(names, vec![None, Some("a".into()), Some("b".into())]);
    }

    #[test]
    fn test_absent_key_uses_natural_order() {
        let mut shaped = Shaped::List(vec![
            Shaped::Scalar("c".into()),
            Shaped::Scalar("a".into()),
            Shaped::Scalar("b".into()),
        ]);
        sort_shaped(&mut shaped, "missing");
        assert_eq!(
            shaped,
            Shaped::List(vec![
                Shaped::Scalar("a".into()),
                Shaped::Scalar("b".into()),
                Shaped::Scalar("c".into()),
            ])
        );
    }

    #[test]
    fn test_grouped_lists_keep_arrival_order() {
        let mut shaped = Shaped::Map(
            [(
                "x".to_string(),
                Shaped::List(vec![Shaped::Scalar("2".into()), Shaped::Scalar("1".into())]),
            )]
            .into_iter()
            .collect(),
        );
        let before = shaped.clone();
        sort_shaped(&mut shaped, "v");
        assert_eq!(shaped, before);
        assert_eq!(
            shaped.get("x").unwrap().as_list().unwrap()[0],
            Shaped::Scalar("2".into())
        );
    }

    #[test]
    fn test_sort_rows_is_stable() {
        let mut rows = vec![
            BindingRow::new().with_literal("k", "2").with_literal("id", "first"),
            BindingRow::new().with_literal("id", "unbound"),
            BindingRow::new().with_literal("k", "1"),
            BindingRow::new().with_literal("k", "2").with_literal("id", "second"),
        ];
        sort_rows(&mut rows, "k");
        let ids: Vec<_> = rows.iter().map(|r| r.value("id")).collect();
        assert_eq!(ids, vec![Some("unbound"), None, Some("first"), Some("second")]);
    }
}
