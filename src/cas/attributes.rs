//! User attributes returned by a CAS server.
//!
//! CAS responses carry a loosely shaped attribute tree: plain text values,
//! grouped blocks of extra attributes, and (when the multi-valued merge
//! option is on) repeated names collected into lists. [`AttributeValue`]
//! models that tree as a tagged union and [`Attributes`] keeps entries in
//! the order the server sent them.

use serde::{Serialize, Serializer, ser::SerializeMap};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Scalar(String),
    List(Vec<AttributeValue>),
    Map(Attributes),
}

impl AttributeValue {
    /// The text of a scalar value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// The scalar itself, or the first scalar of a list.
    pub fn first_scalar(&self) -> Option<&str> {
        match self {
            AttributeValue::Scalar(s) => Some(s),
            AttributeValue::List(items) => items.iter().find_map(AttributeValue::as_str),
            AttributeValue::Map(_) => None,
        }
    }

    fn is_scalar_or_scalar_list(&self) -> bool {
        match self {
            AttributeValue::Scalar(_) => true,
            AttributeValue::List(items) => items.iter().all(|i| i.as_str().is_some()),
            AttributeValue::Map(_) => false,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Scalar(s) => s.is_empty(),
            AttributeValue::List(items) => items.is_empty(),
            AttributeValue::Map(map) => map.is_empty(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Scalar(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Scalar(value)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        AttributeValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<Attributes> for AttributeValue {
    fn from(map: Attributes) -> Self {
        AttributeValue::Map(map)
    }
}

/// How repeated attribute names are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// The last value replaces earlier ones.
    #[default]
    LastWins,
    /// Scalar repeats are collected into an ordered list.
    Combine,
}

impl MergePolicy {
    /// Policy for the `merge_multivalued_attributes` option.
    pub fn from_flag(merge_multivalued: bool) -> Self {
        if merge_multivalued {
            MergePolicy::Combine
        } else {
            MergePolicy::LastWins
        }
    }
}

/// Insertion-ordered attribute map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut AttributeValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Shortcut for `get(key)` followed by [`AttributeValue::first_scalar`].
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::first_scalar)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace `key`. A replaced entry keeps its original position.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Add a scalar under `key`, combining with an existing value per `policy`.
    ///
    /// Only scalars and lists of scalars are combined; a nested map already
    /// stored under `key` is replaced.
    pub fn add_scalar(&mut self, key: &str, value: String, policy: MergePolicy) {
        if policy == MergePolicy::Combine
            && let Some(existing) = self.get_mut(key)
            && existing.is_scalar_or_scalar_list()
        {
            match existing {
                AttributeValue::List(items) => items.push(AttributeValue::Scalar(value)),
                scalar => {
                    let first = std::mem::replace(scalar, AttributeValue::List(Vec::new()));
                    *scalar = AttributeValue::List(vec![first, AttributeValue::Scalar(value)]);
                }
            }
            return;
        }
        self.insert(key, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &AttributeValue) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }
}

impl Extend<(String, AttributeValue)> for Attributes {
    /// Later entries overwrite earlier ones with the same key.
    fn extend<I: IntoIterator<Item = (String, AttributeValue)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for Attributes {
    type Item = (String, AttributeValue);
    type IntoIter = std::vec::IntoIter<(String, AttributeValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (key, value) in iter {
            attributes.insert(key, value);
        }
        attributes
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Recursively drop empty values.
///
/// Empty strings, lists and maps are removed; maps and lists are pruned
/// before their own emptiness is checked.
pub fn prune(attributes: Attributes) -> Attributes {
    attributes
        .into_iter()
        .filter_map(|(key, value)| prune_value(value).map(|v| (key, v)))
        .collect()
}

fn prune_value(value: AttributeValue) -> Option<AttributeValue> {
    let pruned = match value {
        AttributeValue::Map(map) => AttributeValue::Map(prune(map)),
        AttributeValue::List(items) => {
            AttributeValue::List(items.into_iter().filter_map(prune_value).collect())
        }
        scalar => scalar,
    };
    (!pruned.is_empty()).then_some(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_position_on_replace() {
        let mut attrs = Attributes::new();
        attrs.insert("user", "psegel");
        attrs.insert("email", "psegel@example.org");
        attrs.insert("user", "other");

        let keys: Vec<_> = attrs.keys().collect();
        assert_eq!(keys, vec!["user", "email"]);
        assert_eq!(attrs.get_str("user"), Some("other"));
    }

    #[test]
    fn test_add_scalar_last_wins() {
        let mut attrs = Attributes::new();
        attrs.add_scalar("roles", "senator".into(), MergePolicy::LastWins);
        attrs.add_scalar("roles", "lobbyist".into(), MergePolicy::LastWins);

        assert_eq!(attrs.get("roles"), Some(&AttributeValue::from("lobbyist")));
    }

    #[test]
    fn test_add_scalar_combine() {
        let mut attrs = Attributes::new();
        for role in ["senator", "lobbyist", "financier"] {
            attrs.add_scalar("roles", role.into(), MergePolicy::Combine);
        }

        assert_eq!(
            attrs.get("roles"),
            Some(&AttributeValue::from(vec!["senator", "lobbyist", "financier"]))
        );
    }

    #[test]
    fn test_add_scalar_combine_replaces_nested_map() {
        let mut attrs = Attributes::new();
        let nested: Attributes = [("street", "Main")].into_iter().collect();
        attrs.insert("address", nested);
        attrs.add_scalar("address", "somewhere".into(), MergePolicy::Combine);

        assert_eq!(attrs.get_str("address"), Some("somewhere"));
    }

    #[test]
    fn test_first_scalar_of_list() {
        let value = AttributeValue::from(vec!["a", "b"]);
        assert_eq!(value.first_scalar(), Some("a"));
        assert_eq!(value.as_str(), None);
    }

    #[test]
    fn test_prune_removes_empty_values_recursively() {
        let mut inner = Attributes::new();
        inner.insert("blank", "");
        let mut kept_inner = Attributes::new();
        kept_inner.insert("city", "Washington");
        kept_inner.insert("zip", "");

        let mut attrs = Attributes::new();
        attrs.insert("name", "Peter");
        attrs.insert("empty", "");
        attrs.insert("group", inner);
        attrs.insert("address", kept_inner);
        attrs.insert("list", AttributeValue::List(vec!["".into()]));

        let pruned = prune(attrs);
        let keys: Vec<_> = pruned.keys().collect();
        assert_eq!(keys, vec!["name", "address"]);
        match pruned.get("address") {
            Some(AttributeValue::Map(map)) => {
                assert_eq!(map.len(), 1);
                assert_eq!(map.get_str("city"), Some("Washington"));
            }
            other => panic!("expected nested map, got {other:?}"),
        }
    }

    #[test]
    fn test_serializes_in_insertion_order() {
        let mut attrs = Attributes::new();
        attrs.insert("zeta", "1");
        attrs.insert("alpha", AttributeValue::from(vec!["x", "y"]));

        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"zeta":"1","alpha":["x","y"]}"#);
    }
}
