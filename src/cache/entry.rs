//! Cache Entry Module
//!
//! Binds a key and value to an optional deadline policy.

use chrono::{DateTime, Utc};

use crate::cache::Deadline;

// == Cache Entry ==
/// A stored value together with its expiration metadata.
///
/// `expires_at` is always `policy.map(Deadline::resolve)` as of construction
/// or renewal; the two fields are only ever set together.
#[derive(Debug, Clone)]
pub struct Entry<K, V> {
    key: K,
    value: V,
    expires_at: Option<DateTime<Utc>>,
    policy: Option<Deadline>,
}

impl<K, V> Entry<K, V> {
    // == Constructor ==
    /// Creates an entry, resolving `policy` against the current time.
    /// `None` means the entry never expires.
    pub fn new(key: K, value: V, policy: Option<Deadline>) -> Self {
        Self {
            key,
            value,
            expires_at: policy.as_ref().map(Deadline::resolve),
            policy,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Resolved expiration instant, `None` for permanent entries.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn policy(&self) -> Option<&Deadline> {
        self.policy.as_ref()
    }

    // == Is Live ==
    /// Returns `true` if the entry never expires or expires strictly after `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => expires > now,
            None => true,
        }
    }

    /// Returns `true` if the entry has an expiry that is still in the future.
    pub fn is_expiring_after(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires) if expires > now)
    }
}

impl<K: Clone, V: Clone> Entry<K, V> {
    // == Renewed ==
    /// Returns a copy whose policy has been bumped by `by` and re-resolved.
    ///
    /// A permanent entry has nothing to bump and is returned as is.
    pub fn renewed(&self, by: &Deadline) -> Self {
        match self.policy {
            Some(policy) => Self::new(self.key.clone(), self.value.clone(), Some(policy.bump(by))),
            None => self.clone(),
        }
    }

    // == Previous Item ==
    /// Describes this entry for a recompute on a miss.
    pub fn previous_item(&self) -> PreviousItem<V> {
        PreviousItem {
            expires_at: self.expires_at,
            policy: self.policy,
            value: self.value.clone(),
        }
    }
}

// == Previous Item ==
/// What a compute closure sees of the entry it is about to replace.
#[derive(Debug, Clone)]
pub struct PreviousItem<V> {
    /// Resolved expiration of the replaced entry
    pub expires_at: Option<DateTime<Utc>>,
    /// Deadline policy of the replaced entry
    pub policy: Option<Deadline>,
    /// The replaced value
    pub value: V,
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_entry_without_policy_never_expires() {
        let entry = Entry::new("k", "v", None);

        assert!(entry.expires_at().is_none());
        assert!(entry.policy().is_none());
        assert!(entry.is_live(Utc::now() + TimeDelta::days(3650)));
        assert!(!entry.is_expiring_after(Utc::now()));
    }

    #[test]
    fn test_entry_resolves_policy_on_creation() {
        let before = Utc::now();
        let entry = Entry::new("k", "v", Some(Deadline::in_seconds(60)));

        let expires = entry.expires_at().unwrap();
        assert!(expires >= before + TimeDelta::seconds(60));
        assert!(entry.is_live(Utc::now()));
        assert!(entry.is_expiring_after(Utc::now()));
    }

    #[test]
    fn test_entry_expiration() {
        let entry = Entry::new("k", "v", Some(Deadline::in_seconds(1)));
        assert!(entry.is_live(Utc::now()));

        sleep(Duration::from_millis(1100));

        assert!(!entry.is_live(Utc::now()));
        assert!(!entry.is_expiring_after(Utc::now()));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let at = Utc::now();
        let entry = Entry::new("k", "v", Some(Deadline::at(at)));

        assert!(!entry.is_live(at), "Entry should be expired at boundary");
    }

    #[test]
    fn test_renewed_extends_expiry() {
        let entry = Entry::new("k".to_string(), 7, Some(Deadline::in_seconds(1)));
        let renewed = entry.renewed(&Deadline::in_seconds(1));

        assert!(matches!(renewed.policy(), Some(Deadline::InSeconds(2))));
        assert!(renewed.expires_at().unwrap() > entry.expires_at().unwrap());
        assert_eq!(renewed.value(), &7);
        assert_eq!(renewed.key(), "k");
    }

    #[test]
    fn test_renewed_permanent_entry_is_unchanged() {
        let entry = Entry::new("k".to_string(), 7, None);
        let renewed = entry.renewed(&Deadline::in_hours(1));

        assert!(renewed.policy().is_none());
        assert!(renewed.expires_at().is_none());
    }

    #[test]
    fn test_previous_item() {
        let entry = Entry::new("k".to_string(), "old".to_string(), Some(Deadline::in_minutes(1)));
        let previous = entry.previous_item();

        assert_eq!(previous.value, "old");
        assert_eq!(previous.expires_at, entry.expires_at());
        assert!(matches!(previous.policy, Some(Deadline::InMinutes(1))));
    }
}
