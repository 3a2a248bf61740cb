//! Collection-valued entity properties.
//!
//! `EntityList` starts out plain (as deserialized). The graph walker observes
//! it once, recording the owning entity, the field name and the owner's
//! notifier. From then on every structural mutation reports exactly one
//! change to the owner. Element access is read-only through `Deref`, so
//! mutations cannot bypass the notification.

use std::any::Any;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ParentRef;

pub struct EntityList<T> {
    items: Vec<T>,
    binding: Option<ParentRef>,
}

impl<T> EntityList<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            binding: None,
        }
    }

    pub fn is_observed(&self) -> bool {
        self.binding.is_some()
    }

    /// Owner and field this list reports to, once observed.
    pub fn binding(&self) -> Option<&ParentRef> {
        self.binding.as_ref()
    }

    /// Start reporting mutations to `owner`. Returns `false`, leaving the
    /// existing binding untouched, if the list is already observed.
    pub fn observe(&mut self, owner: ParentRef) -> bool {
        if self.binding.is_some() {
            return false;
        }
        self.binding = Some(owner);
        true
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Mutable element access. Changing an element's own fields is not a
    /// structural change and is not reported.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Any> EntityList<T> {
    pub fn push(&mut self, value: T) {
        self.items.push(value);
        self.changed();
    }

    pub fn insert(&mut self, index: usize, value: T) {
        self.items.insert(index, value);
        self.changed();
    }

    pub fn remove(&mut self, index: usize) -> T {
        let removed = self.items.remove(index);
        self.changed();
        removed
    }

    pub fn pop(&mut self) -> Option<T> {
        let popped = self.items.pop();
        self.changed();
        popped
    }

    /// Replace the element at `index`, returning the previous one.
    pub fn set(&mut self, index: usize, value: T) -> T {
        let previous = std::mem::replace(&mut self.items[index], value);
        self.changed();
        previous
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.changed();
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
        self.changed();
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
        self.changed();
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = T>) {
        self.items.extend(values);
        self.changed();
    }

    /// Remove the first element equal to `value`.
    pub fn remove_item(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        let found = self.items.iter().position(|item| item == value);
        if let Some(index) = found {
            self.items.remove(index);
        }
        self.changed();
        found.is_some()
    }

    fn changed(&self) {
        if let Some(binding) = &self.binding {
            binding.notifier().notify(binding.owner(), binding.field(), self);
        }
    }
}

impl<T> Default for EntityList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for EntityList<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items, binding: None }
    }
}

impl<T> FromIterator<T> for EntityList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<T> Deref for EntityList<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a EntityList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A clone is detached: it copies the elements but not the binding.
impl<T: Clone> Clone for EntityList<T> {
    fn clone(&self) -> Self {
        Self::from(self.items.clone())
    }
}

impl<T: PartialEq> PartialEq for EntityList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: fmt::Debug> fmt::Debug for EntityList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityList")
            .field("items", &self.items)
            .field("observed", &self.is_observed())
            .finish()
    }
}

impl<T: Serialize> Serialize for EntityList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for EntityList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from)
    }
}
