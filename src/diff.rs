//! # Diff Engine
//! Pure comparison of two snapshots into additions, removals and price changes.
//! No I/O and no failure modes; callers clean their input before building a `Snapshot`.
//!
//! Policy: a price change is only reported when both sides carry a non-empty
//! price and the tokens differ by exact string comparison. Partial scrapes that
//! lose a price never show up as changes.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{ProductRecord, Snapshot};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceChange {
    pub product: ProductRecord,
    pub old_price: String,
    pub new_price: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffResult {
    pub added: Vec<ProductRecord>,
    pub removed: Vec<ProductRecord>,
    pub price_changes: Vec<PriceChange>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    pub added: usize,
    pub removed: usize,
    pub price_changes: usize,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.price_changes.is_empty()
    }

    pub fn counts(&self) -> DiffCounts {
        DiffCounts {
            added: self.added.len(),
            removed: self.removed.len(),
            price_changes: self.price_changes.len(),
        }
    }
}

/// A diff stamped with when it was computed, as persisted and sent to notifiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeRecord {
    pub timestamp: DateTime<Utc>,
    /// Products in the new snapshot.
    #[serde(default)]
    pub total_products: usize,
    #[serde(flatten)]
    pub diff: DiffResult,
}

impl ChangeRecord {
    pub fn new(diff: DiffResult, total_products: usize, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            total_products,
            diff,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.diff.is_empty()
    }
}

/// Compare `old` against `new`. Each output list is sorted by id.
///
/// Both snapshots iterate in id order, so this is a single merge pass.
pub fn compute_diff(old: &Snapshot, new: &Snapshot) -> DiffResult {
    let mut out = DiffResult::default();

    let mut olds = old.entries().peekable();
    let mut news = new.entries().peekable();

    loop {
        let ord = match (olds.peek(), news.peek()) {
            (Some((o, _)), Some((n, _))) => o.cmp(n),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };

        match ord {
            Ordering::Less => {
                if let Some((_, rec)) = olds.next() {
                    out.removed.push(rec.clone());
                }
            }
            Ordering::Greater => {
                if let Some((_, rec)) = news.next() {
                    out.added.push(rec.clone());
                }
            }
            Ordering::Equal => {
                if let (Some((_, o)), Some((_, n))) = (olds.next(), news.next()) {
                    if let Some(change) = price_change(o, n) {
                        out.price_changes.push(change);
                    }
                }
            }
        }
    }

    out
}

fn price_change(old: &ProductRecord, new: &ProductRecord) -> Option<PriceChange> {
    match (old.price_token(), new.price_token()) {
        (Some(op), Some(np)) if op != np => Some(PriceChange {
            product: new.clone(),
            old_price: op.to_string(),
            new_price: np.to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(items: &[(&str, Option<&str>)]) -> Snapshot {
        items
            .iter()
            .map(|(id, price)| {
                let r = ProductRecord::new(*id, format!("item {id}"));
                match price {
                    Some(p) => r.with_price(*p),
                    None => r,
                }
            })
            .collect()
    }

    #[test]
    fn empty_new_snapshot_removes_everything() {
        let old = snap(&[("a", Some("$1")), ("b", None)]);
        let d = compute_diff(&old, &Snapshot::new());
        assert!(d.added.is_empty());
        assert!(d.price_changes.is_empty());
        let ids: Vec<_> = d.removed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn empty_string_price_is_not_a_change() {
        let old = snap(&[("a", Some(""))]);
        let new = snap(&[("a", Some("$3"))]);
        assert!(compute_diff(&old, &new).is_empty());
    }

    #[test]
    fn price_tokens_compare_exactly() {
        let old = snap(&[("a", Some("$10.00"))]);
        let new = snap(&[("a", Some("$10"))]);
        let d = compute_diff(&old, &new);
        assert_eq!(d.price_changes.len(), 1);
        assert_eq!(d.price_changes[0].old_price, "$10.00");
        assert_eq!(d.price_changes[0].new_price, "$10");
    }

    #[test]
    fn outputs_are_sorted_by_id() {
        let old = snap(&[("m", None), ("c", None), ("x", None)]);
        let new = snap(&[("z", None), ("b", None), ("k", None)]);
        let d = compute_diff(&old, &new);
        let added: Vec<_> = d.added.iter().map(|r| r.id.as_str()).collect();
        let removed: Vec<_> = d.removed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(added, vec!["b", "k", "z"]);
        assert_eq!(removed, vec!["c", "m", "x"]);
        assert_eq!(
            d.counts(),
            DiffCounts {
                added: 3,
                removed: 3,
                price_changes: 0
            }
        );
    }
}
