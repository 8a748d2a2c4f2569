use std::collections::HashSet;

use crate::BulletinError;

/// Tracks identifiers seen so far while walking items in source order.
///
/// Every item is admitted, active or not, so an expired duplicate still fails.
#[derive(Debug, Default)]
pub struct IdentityGuard {
    seen: HashSet<String>,
}

impl IdentityGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id`, failing if it was admitted before.
    ///
    /// # Errors
    /// Returns [`BulletinError::DuplicateIdentifier`] naming the repeated id.
    pub fn admit(&mut self, id: &str) -> Result<(), BulletinError> {
        if self.seen.contains(id) {
            return Err(BulletinError::DuplicateIdentifier(id.to_string()));
        }
        self.seen.insert(id.to_string());
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
