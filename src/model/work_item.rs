use crate::model::FieldMap;
use indexmap::IndexMap;
use url::Url;

/// One unit of work: a stable identity, the page to fetch, and carried metadata
///
/// Metadata is propagated unchanged into every record derived from the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub url: Url,
    pub metadata: FieldMap,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, url: Url, metadata: FieldMap) -> Self {
        Self {
            id: id.into(),
            url,
            metadata,
        }
    }
}

/// Deduplicates work items by identity
///
/// When two items share an identity the later one wins, but it takes the
/// position where the identity was first seen so enumeration order stays
/// stable across runs.
pub fn dedup_by_identity(items: impl IntoIterator<Item = WorkItem>) -> Vec<WorkItem> {
    let mut by_id: IndexMap<String, WorkItem> = IndexMap::new();
    for item in items {
        by_id.insert(item.id.clone(), item);
    }
    by_id.into_values().collect()
}
