//! Listener storage owned by the lane thread.

use crate::callback::Callback;
use crate::handle::{RegistrationId, SubscriptionHandle};
use fxhash::FxHashMap;
use std::fmt;
use std::hash::Hash;

pub(crate) struct Registration<T> {
    pub(crate) id: RegistrationId,
    pub(crate) callback: Box<dyn Callback<T>>,
}

impl<T> fmt::Debug for Registration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Event key to ordered listeners.
///
/// A key is present only while it has at least one registration.
pub(crate) struct Registry<K, T> {
    entries: FxHashMap<K, Vec<Registration<T>>>,
}

impl<K: Eq + Hash, T> Registry<K, T> {
    pub(crate) fn new() -> Self {
        Self { entries: FxHashMap::default() }
    }

    /// Appends a listener under `key` and returns how many listeners the key now has.
    pub(crate) fn insert(
        &mut self,
        key: K,
        id: RegistrationId,
        callback: Box<dyn Callback<T>>,
    ) -> usize {
        let listeners = self.entries.entry(key).or_default();
        listeners.push(Registration { id, callback });
        listeners.len()
    }

    /// Removes exactly the registration named by `handle`.
    pub(crate) fn remove(&mut self, handle: &SubscriptionHandle<K>) -> bool {
        let Some(listeners) = self.entries.get_mut(handle.key()) else {
            return false;
        };
        let Some(position) = listeners.iter().position(|r| r.id == handle.id()) else {
            return false;
        };
        listeners.remove(position);
        if listeners.is_empty() {
            self.entries.remove(handle.key());
        }
        true
    }

    pub(crate) fn listeners(&self, key: &K) -> Option<&[Registration<T>]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub(crate) fn listener_count(&self, key: &K) -> usize {
        self.entries.get(key).map_or(0, Vec::len)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: fmt::Debug, T> fmt::Debug for Registry<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v.len()))).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Box<dyn Callback<u32>> {
        Box::new(|_: &u32| {})
    }

    #[test]
    fn insert_preserves_order() {
        let mut registry = Registry::<&str, u32>::new();
        let first = RegistrationId::next();
        let second = RegistrationId::next();

        assert_eq!(registry.insert("k", first, noop()), 1);
        assert_eq!(registry.insert("k", second, noop()), 2);

        let ids: Vec<_> = registry.listeners(&"k").unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn remove_targets_a_single_registration() {
        let mut registry = Registry::<&str, u32>::new();
        let first = RegistrationId::next();
        let second = RegistrationId::next();
        registry.insert("k", first, noop());
        registry.insert("k", second, noop());

        assert!(registry.remove(&SubscriptionHandle::new("k", first)));
        assert!(!registry.remove(&SubscriptionHandle::new("k", first)));
        assert_eq!(registry.listener_count(&"k"), 1);
        assert_eq!(registry.listeners(&"k").unwrap()[0].id, second);
    }

    #[test]
    fn last_removal_drops_the_key() {
        let mut registry = Registry::<&str, u32>::new();
        let id = RegistrationId::next();
        registry.insert("k", id, noop());

        assert!(registry.remove(&SubscriptionHandle::new("k", id)));
        assert!(registry.listeners(&"k").is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn remove_on_unknown_key_is_false() {
        let mut registry = Registry::<&str, u32>::new();
        assert!(!registry.remove(&SubscriptionHandle::new("missing", RegistrationId::next())));
    }
}
