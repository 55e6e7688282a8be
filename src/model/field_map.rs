use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Prefix given to a detail-stage field whose name collides with a list-stage field
pub const DETAILS_PREFIX: &str = "details_";

/// Ordered mapping of field name to text value
///
/// Insertion order is preserved so serialized output is reproducible. The
/// two ways of adding a field carry different collision policies:
///
/// - [`FieldMap::insert_first_wins`] keeps the value already present; used
///   while scraping a single page, where the first matching label wins.
/// - [`merge_with_provenance`] keeps both values, renaming the second
///   writer's key; used when list-stage and detail-stage records meet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(IndexMap<String, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field only if the key is not already present
    ///
    /// # Returns
    ///
    /// `true` if the value was stored, `false` if an earlier value was kept
    pub fn insert_first_wins(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        match self.0.entry(key.into()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
        }
    }

    /// Sets a field, replacing any previous value in place
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the first non-empty value among `keys`
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

/// Merges a detail-stage record into a list-stage record
///
/// Fields from `base` are kept as they are. A field from `extra` is added
/// under its own name unless `base` already holds a different value for it,
/// in which case it is stored as `details_<key>`. Equal values are not
/// duplicated.
///
/// # Examples
///
/// ```
/// use sumi_harvest::model::{merge_with_provenance, FieldMap};
///
/// let list: FieldMap = [("name", "A")].into_iter().collect();
/// let detail: FieldMap = [("name", "B")].into_iter().collect();
/// let merged = merge_with_provenance(&list, &detail);
/// assert_eq!(merged.get("name"), Some("A"));
/// assert_eq!(merged.get("details_name"), Some("B"));
/// ```
pub fn merge_with_provenance(base: &FieldMap, extra: &FieldMap) -> FieldMap {
    let mut out = base.clone();
    for (key, value) in extra.iter() {
        match out.get(key) {
            Some(existing) if existing != value => {
                out.set(format!("{}{}", DETAILS_PREFIX, key), value);
            }
            _ => out.set(key, value),
        }
    }
    out
}
