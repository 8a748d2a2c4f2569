use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::{Item, Scope};

/// Per-scope result buckets holding references into the item arena.
///
/// Bucket order is insertion order until [`crate::format_selection`] sorts it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection<'a> {
    buckets: BTreeMap<Scope, Vec<&'a Item>>,
}

impl<'a> Selection<'a> {
    #[must_use]
    pub fn bucket(&self, scope: &Scope) -> Option<&[&'a Item]> {
        self.buckets.get(scope).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Scope, &[&'a Item])> {
        self.buckets.iter().map(|(scope, items)| (scope, items.as_slice()))
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.buckets.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Append each item to every scope it names, creating buckets on demand.
    #[must_use]
    pub fn resolve_scopes(active: &[&'a Item]) -> Self {
        let mut selection = Self::default();
        for &item in active {
            for scope in item.scopes() {
                selection.buckets.entry(scope).or_default().push(item);
            }
        }
        selection
    }

    /// Make sure every declared client and `common` get an artifact.
    pub fn register_clients(&mut self, clients: &[Scope]) {
        for client in clients {
            self.buckets.entry(client.clone()).or_default();
        }
        self.buckets.entry(Scope::common()).or_default();
    }

    /// Append the `common` items after every other bucket's own items, once.
    pub fn merge_common(&mut self) {
        let common = self.buckets.get(&Scope::common()).cloned().unwrap_or_default();
        for (scope, items) in &mut self.buckets {
            if !scope.is_common() {
                items.extend(common.iter().copied());
            }
        }
    }
}

/// Items whose validity window contains `now`, in source order.
#[must_use]
pub fn filter_active(items: &[Item], now: OffsetDateTime) -> Vec<&Item> {
    items.iter().filter(|item| item.is_active_at(now)).collect()
}

/// Filter, distribute, register clients, and merge `common` in one pass.
#[must_use]
pub fn select<'a>(items: &'a [Item], clients: &[Scope], now: OffsetDateTime) -> Selection<'a> {
    let active = filter_active(items, now);
    let mut selection = Selection::resolve_scopes(&active);
    selection.register_clients(clients);
    selection.merge_common();
    selection
}
