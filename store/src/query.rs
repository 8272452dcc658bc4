use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::document::StoredDocument;

pub type Field = Cow<'static, str>;

/// Predicate over documents of one collection.
///
/// Field comparisons look at top-level JSON fields. Strings compare by byte
/// order (so ISO dates and `HH:MM` times order naturally), numbers
/// numerically. A missing field never satisfies a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(Field, Value),
    In(Field, Vec<Value>),
    Gte(Field, Value),
    Lt(Field, Value),
    CreatedAtGte(DateTime<Utc>),
    CreatedAtLt(DateTime<Utc>),
    /// Case-insensitive substring match; any of the fields may match.
    Search { fields: Vec<Field>, term: String },
    And(Vec<Filter>),
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Filter::And(Vec::new())
    }

    pub fn eq(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<Field>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn gte(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Filter::Gte(field.into(), value.into())
    }

    pub fn lt(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Filter::Lt(field.into(), value.into())
    }

    pub fn created_since(at: DateTime<Utc>) -> Self {
        Filter::CreatedAtGte(at)
    }

    pub fn created_before(at: DateTime<Utc>) -> Self {
        Filter::CreatedAtLt(at)
    }

    /// A blank term matches everything.
    pub fn search(fields: &[&'static str], term: &str) -> Self {
        let term = term.trim();
        if term.is_empty() || fields.is_empty() {
            return Filter::all();
        }
        Filter::Search {
            fields: fields.iter().map(|f| Cow::Borrowed(*f)).collect(),
            term: term.to_string(),
        }
    }

    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), other) => {
                left.push(other);
                Filter::And(left)
            }
            (this, Filter::And(mut right)) => {
                right.insert(0, this);
                Filter::And(right)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }

    pub fn matches(&self, doc: &StoredDocument) -> bool {
        match self {
            Filter::Eq(field, value) => doc.data.get(field.as_ref()) == Some(value),
            Filter::In(field, values) => doc
                .data
                .get(field.as_ref())
                .map(|v| values.contains(v))
                .unwrap_or(false),
            Filter::Gte(field, value) => compare_field(doc, field, value)
                .map(|o| o != Ordering::Less)
                .unwrap_or(false),
            Filter::Lt(field, value) => compare_field(doc, field, value)
                .map(|o| o == Ordering::Less)
                .unwrap_or(false),
            Filter::CreatedAtGte(at) => doc.created_at >= *at,
            Filter::CreatedAtLt(at) => doc.created_at < *at,
            Filter::Search { fields, term } => {
                let needle = term.to_lowercase();
                fields.iter().any(|f| {
                    doc.data
                        .get(f.as_ref())
                        .and_then(value_as_text)
                        .map(|text| text.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

fn compare_field(doc: &StoredDocument, field: &str, value: &Value) -> Option<Ordering> {
    let current = doc.data.get(field)?;
    if let Some(rhs) = value.as_f64() {
        return current.as_f64()?.partial_cmp(&rhs);
    }
    let lhs = value_as_text(current)?;
    let rhs = value_as_text(value)?;
    Some(lhs.as_bytes().cmp(rhs.as_bytes()))
}

/// Text form of a JSON value, mirroring Postgres `->>`: strings unquoted,
/// null absent, everything else in its JSON encoding.
pub(crate) fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    Field(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub descending: bool,
}

impl Sort {
    pub fn newest_first() -> Self {
        Self { key: SortKey::CreatedAt, descending: true }
    }

    pub fn asc(field: impl Into<Field>) -> Self {
        Self { key: SortKey::Field(field.into()), descending: false }
    }

    pub fn desc(field: impl Into<Field>) -> Self {
        Self { key: SortKey::Field(field.into()), descending: true }
    }

    /// Missing values sort last ascending and first descending, like Postgres.
    pub(crate) fn compare(&self, a: &StoredDocument, b: &StoredDocument) -> Ordering {
        let ordering = match &self.key {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Field(field) => {
                let left = a.data.get(field.as_ref()).and_then(value_as_text);
                let right = b.data.get(field.as_ref()).and_then(value_as_text);
                match (left, right) {
                    (Some(l), Some(r)) => l.as_bytes().cmp(r.as_bytes()),
                    (None, Some(_)) => Ordering::Greater,
                    (Some(_), None) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                }
            }
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Filter, ordering and window of a `find`. Orderings always end with the
/// document id so equal keys page deterministically.
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Vec<Sort>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new() -> Self {
        Self {
            filter: Filter::all(),
            sort: Vec::new(),
            skip: 0,
            limit: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_sorts(mut self, sorts: impl IntoIterator<Item = Sort>) -> Self {
        self.sort.extend(sorts);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn compare(&self, a: &StoredDocument, b: &StoredDocument) -> Ordering {
        self.sort
            .iter()
            .map(|s| s.compare(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }
}

impl Default for FindQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// One window of a `find`, with the number of documents matching overall.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub documents: Vec<StoredDocument>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn doc(data: Value) -> StoredDocument {
        StoredDocument {
            id: Uuid::new_v4(),
            data,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let filter = Filter::search(&["firstName", "email"], "JANE");
        assert!(filter.matches(&doc(json!({ "firstName": "Jane", "email": "x@y.z" }))));
        assert!(filter.matches(&doc(json!({ "firstName": "Bob", "email": "mary-jane@y.z" }))));
        assert!(!filter.matches(&doc(json!({ "firstName": "Bob", "email": "bob@y.z" }))));
        assert!(!filter.matches(&doc(json!({ "lastName": "Jane" }))));
    }

    #[test]
    fn blank_search_matches_everything() {
        assert_eq!(Filter::search(&["firstName"], "   "), Filter::all());
    }

    #[test]
    fn string_ranges_compare_iso_dates() {
        let filter = Filter::gte("date", "2024-03-01").and(Filter::lt("date", "2024-04-01"));
        assert!(filter.matches(&doc(json!({ "date": "2024-03-15" }))));
        assert!(filter.matches(&doc(json!({ "date": "2024-03-01" }))));
        assert!(!filter.matches(&doc(json!({ "date": "2024-04-01" }))));
        assert!(!filter.matches(&doc(json!({}))));
    }

    #[test]
    fn numeric_ranges_compare_numbers() {
        let filter = Filter::gte("amount", 10);
        assert!(filter.matches(&doc(json!({ "amount": 10.5 }))));
        assert!(!filter.matches(&doc(json!({ "amount": 9 }))));
        assert!(!filter.matches(&doc(json!({ "amount": "11" }))));
    }

    #[test]
    fn in_filter_and_empty_in() {
        let filter = Filter::is_in("status", ["scheduled", "confirmed"]);
        assert!(filter.matches(&doc(json!({ "status": "confirmed" }))));
        assert!(!filter.matches(&doc(json!({ "status": "cancelled" }))));
        assert!(!Filter::is_in("status", Vec::<String>::new()).matches(&doc(json!({ "status": "x" }))));
    }

    #[test]
    fn and_flattens() {
        let combined = Filter::all()
            .and(Filter::eq("a", 1))
            .and(Filter::eq("b", 2).and(Filter::eq("c", 3)));
        match combined {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn sort_puts_missing_values_last_when_ascending() {
        let a = doc(json!({ "name": "b" }));
        let b = doc(json!({}));
        let c = doc(json!({ "name": "a" }));
        let query = FindQuery::new().sort_by(Sort::asc("name"));

        let mut docs = vec![a.clone(), b.clone(), c.clone()];
        docs.sort_by(|x, y| query.compare(x, y));
        assert_eq!(docs, vec![c.clone(), a.clone(), b.clone()]);

        let query = FindQuery::new().sort_by(Sort::desc("name"));
        docs.sort_by(|x, y| query.compare(x, y));
        assert_eq!(docs, vec![b, a, c]);
    }
}
