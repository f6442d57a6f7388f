//! Product records and point-in-time snapshots keyed by product id.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    /// Opaque price token as shown on the page, e.g. "CA$ 260.00".
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(alias = "timestamp", default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: None,
            link: None,
            observed_at: Utc::now(),
        }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn observed_at(mut self, ts: DateTime<Utc>) -> Self {
        self.observed_at = ts;
        self
    }

    /// Price if present and non-empty. An empty string counts as missing.
    pub fn price_token(&self) -> Option<&str> {
        self.price.as_deref().filter(|p| !p.is_empty())
    }
}

/// Data-quality findings from building a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotIssues {
    /// Ids seen more than once; the last occurrence was kept.
    pub duplicate_ids: Vec<String>,
    /// Records dropped because their id was empty.
    pub dropped_without_id: usize,
}

impl SnapshotIssues {
    pub fn is_clean(&self) -> bool {
        self.duplicate_ids.is_empty() && self.dropped_without_id == 0
    }
}

/// Records keyed by id. Iteration order is sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<String, ProductRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot, last-write-wins on duplicate ids.
    pub fn from_records<I>(records: I) -> (Self, SnapshotIssues)
    where
        I: IntoIterator<Item = ProductRecord>,
    {
        let mut map = BTreeMap::new();
        let mut issues = SnapshotIssues::default();

        for rec in records {
            if rec.id.trim().is_empty() {
                issues.dropped_without_id += 1;
                continue;
            }
            let id = rec.id.clone();
            if map.insert(id.clone(), rec).is_some() && !issues.duplicate_ids.contains(&id) {
                issues.duplicate_ids.push(id);
            }
        }

        (Self { records: map }, issues)
    }

    pub fn insert(&mut self, rec: ProductRecord) -> Option<ProductRecord> {
        self.records.insert(rec.id.clone(), rec)
    }

    pub fn get(&self, id: &str) -> Option<&ProductRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &ProductRecord> {
        self.records.values()
    }

    pub(crate) fn entries(&self) -> std::collections::btree_map::Iter<'_, String, ProductRecord> {
        self.records.iter()
    }
}

impl FromIterator<ProductRecord> for Snapshot {
    fn from_iter<T: IntoIterator<Item = ProductRecord>>(iter: T) -> Self {
        Self::from_records(iter).0
    }
}
