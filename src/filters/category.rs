//! Category index: named groupings of registered filter keys.
//!
//! Categories are kept in ascending name order and their member lists in
//! ascending key order, so every listing is deterministic. A key may belong
//! to several categories. Every member must exist in the registry; members
//! are checked on insertion and dropped when the filter is unregistered.
//!
//! Categories can in turn be grouped into collections. A collection keeps
//! its categories in the order they were added, since that order is what a
//! collection browser shows.

use crate::filters::registry::FilterRegistry;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A named grouping of filter keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique name, also the sort key.
    pub name: String,
    /// Display title.
    pub title: String,
    members: BTreeSet<String>,
}

impl Category {
    fn new(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            members: BTreeSet::new(),
        }
    }

    /// Members in ascending key order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|s| s.as_str())
    }

    /// Whether `key` is a member.
    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the category has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Membership assignments used by [`CategoryIndex::rebuild`]:
/// `(name, title, keys)`.
pub type CategoryAssignment = (String, String, Vec<String>);

/// Collection assignments used by [`CategoryIndex::rebuild_collections`]:
/// `(name, title, categories)`.
pub type CollectionAssignment = (String, String, Vec<String>);

/// A named grouping of categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Unique name, also the sort key among collections.
    pub name: String,
    /// Display title.
    pub title: String,
    categories: Vec<String>,
}

impl Collection {
    fn new(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            categories: Vec::new(),
        }
    }

    /// Category names in insertion order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Whether `category` belongs to this collection.
    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether the collection has no categories.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Ordered collection of categories.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    categories: BTreeMap<String, Category>,
    collections: BTreeMap<String, Collection>,
}

impl CategoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// All categories, ordered by name.
    pub fn categories(&self) -> Vec<&Category> {
        self.categories.values().collect()
    }

    /// Category names, ordered.
    pub fn names(&self) -> Vec<&str> {
        self.categories.keys().map(|s| s.as_str()).collect()
    }

    /// Look up a category.
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    /// Sorted member keys of a category. Unknown categories yield an empty
    /// list.
    pub fn filters(&self, name: &str) -> Vec<String> {
        match self.categories.get(name) {
            Some(category) => category.members.iter().cloned().collect(),
            None => {
                warn!("Unknown category '{}'", name);
                Vec::new()
            }
        }
    }

    /// Create a category, or retitle an existing one. Returns `true` when
    /// the category is new.
    pub fn add_category(&mut self, name: &str, title: &str) -> bool {
        match self.categories.get_mut(name) {
            Some(existing) => {
                existing.title = title.to_string();
                false
            }
            None => {
                self.categories.insert(name.to_string(), Category::new(name, title));
                true
            }
        }
    }

    /// Add a registered filter to a category, creating the category if
    /// needed.
    ///
    /// Unregistered keys are refused with a warning. Returns `true` only when
    /// the key was newly added.
    pub fn add_member(&mut self, name: &str, key: &str, registry: &FilterRegistry) -> bool {
        if !registry.contains(key) {
            warn!("Cannot add '{}' to category '{}': filter not registered", key, name);
            return false;
        }
        self.categories
            .entry(name.to_string())
            .or_insert_with(|| Category::new(name, name))
            .members
            .insert(key.to_string())
    }

    /// Remove a key from one category.
    pub fn remove_member(&mut self, name: &str, key: &str) -> bool {
        self.categories
            .get_mut(name)
            .map_or(false, |c| c.members.remove(key))
    }

    /// Remove a key from every category. Returns how many lost it.
    pub fn remove_everywhere(&mut self, key: &str) -> usize {
        self.categories
            .values_mut()
            .map(|c| c.members.remove(key))
            .filter(|removed| *removed)
            .count()
    }

    /// Replace all categories from scratch.
    ///
    /// Keys missing from the registry are dropped with a warning, and
    /// collections lose the categories that no longer exist.
    pub fn rebuild(&mut self, assignments: &[CategoryAssignment], registry: &FilterRegistry) {
        self.categories.clear();
        for (name, title, keys) in assignments {
            self.add_category(name, title);
            for key in keys {
                self.add_member(name, key, registry);
            }
        }
        let categories = &self.categories;
        for collection in self.collections.values_mut() {
            collection.categories.retain(|c| categories.contains_key(c));
        }
    }

    /// All collections, ordered by name.
    pub fn collections(&self) -> Vec<&Collection> {
        self.collections.values().collect()
    }

    /// Collection names, ordered.
    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.keys().map(|s| s.as_str()).collect()
    }

    /// Look up a collection.
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Create a collection, or retitle an existing one. Returns `true` when
    /// the collection is new.
    pub fn add_collection(&mut self, name: &str, title: &str) -> bool {
        match self.collections.get_mut(name) {
            Some(existing) => {
                existing.title = title.to_string();
                false
            }
            None => {
                self.collections.insert(name.to_string(), Collection::new(name, title));
                true
            }
        }
    }

    /// Append an existing category to a collection, creating the collection
    /// if needed.
    ///
    /// Unknown categories are refused with a warning. Returns `true` only
    /// when the category was newly added.
    pub fn add_to_collection(&mut self, collection: &str, category: &str) -> bool {
        if !self.categories.contains_key(category) {
            warn!("Cannot add '{}' to collection '{}': unknown category", category, collection);
            return false;
        }
        let entry = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(collection, collection));
        if entry.contains(category) {
            return false;
        }
        entry.categories.push(category.to_string());
        true
    }

    /// Replace all collections.
    pub fn rebuild_collections(&mut self, assignments: &[CollectionAssignment]) {
        self.collections.clear();
        for (name, title, categories) in assignments {
            self.add_collection(name, title);
            for category in categories {
                self.add_to_collection(name, category);
            }
        }
    }

    /// Categories of a collection in collection order. An empty name means
    /// every category; unknown collections yield an empty list.
    pub fn categories_in(&self, collection: &str) -> Vec<String> {
        if collection.is_empty() {
            return self.categories.keys().cloned().collect();
        }
        match self.collections.get(collection) {
            Some(found) => found.categories.clone(),
            None => {
                warn!("Unknown collection '{}'", collection);
                Vec::new()
            }
        }
    }

    /// Position of a collection in name order.
    pub fn collection_index_of(&self, name: &str) -> Option<usize> {
        self.collections.keys().position(|n| n == name)
    }

    /// Collection at `index`, clamped to the valid range.
    pub fn collection_at(&self, index: usize) -> Option<&Collection> {
        let last = self.collections.len().checked_sub(1)?;
        self.collections.values().nth(index.min(last))
    }

    /// Position of a category in name order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.categories.keys().position(|n| n == name)
    }

    /// Category at `index`, clamped to the valid range. `None` only when the
    /// index is empty.
    pub fn category_at(&self, index: usize) -> Option<&Category> {
        let last = self.categories.len().checked_sub(1)?;
        self.categories.values().nth(index.min(last))
    }

    /// Move `delta` positions from `name`, clamped at both ends.
    ///
    /// An unknown starting category is treated as position 0.
    pub fn step(&self, name: &str, delta: isize) -> Option<&Category> {
        let current = self.index_of(name).unwrap_or(0) as isize;
        let target = (current + delta).max(0) as usize;
        self.category_at(target)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether there are no categories.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::{Descriptor, FilterOperation};
    use proptest::prelude::*;

    fn registry(keys: &[&str]) -> FilterRegistry {
        let mut registry = FilterRegistry::new();
        for key in keys {
            let op = FilterOperation::single(|img, _| Some(img.clone()));
            registry.register(Descriptor::builder(*key, *key, op).build()).unwrap();
        }
        registry
    }

    #[test]
    fn test_members_are_sorted() {
        let reg = registry(&["zoom", "blur", "mono"]);
        let mut index = CategoryIndex::new();
        for key in ["zoom", "blur", "mono"] {
            assert!(index.add_member("x", key, &reg));
        }
        assert_eq!(index.filters("x"), vec!["blur", "mono", "zoom"]);
    }

    #[test]
    fn test_add_member_rules() {
        let reg = registry(&["blur"]);
        let mut index = CategoryIndex::new();
        assert!(!index.add_member("x", "ghost", &reg));
        assert!(index.is_empty());
        assert!(index.add_member("x", "blur", &reg));
        assert!(!index.add_member("x", "blur", &reg));
        assert_eq!(index.filters("x").len(), 1);
    }

    #[test]
    fn test_unknown_category_is_empty() {
        let index = CategoryIndex::new();
        assert!(index.filters("nope").is_empty());
    }

    #[test]
    fn test_key_in_many_categories() {
        let reg = registry(&["sepia"]);
        let mut index = CategoryIndex::new();
        index.add_member("color", "sepia", &reg);
        index.add_member("vintage", "sepia", &reg);
        assert_eq!(index.remove_everywhere("sepia"), 2);
        assert!(index.filters("color").is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut index = CategoryIndex::new();
        index.add_category("color", "Color");
        index.add_category("blur", "Blur");
        index.add_category("style", "Style");

        assert_eq!(index.names(), vec!["blur", "color", "style"]);
        assert_eq!(index.index_of("color"), Some(1));
        assert_eq!(index.category_at(99).unwrap().name, "style");
        assert_eq!(index.step("blur", -1).unwrap().name, "blur");
        assert_eq!(index.step("color", 1).unwrap().name, "style");
        assert_eq!(index.step("style", 5).unwrap().name, "style");
        assert!(CategoryIndex::new().category_at(0).is_none());
    }

    #[test]
    fn test_rebuild_drops_unknown_keys() {
        let reg = registry(&["a", "b"]);
        let mut index = CategoryIndex::new();
        index.add_member("old", "a", &reg);
        index.rebuild(
            &[(
                "new".to_string(),
                "New".to_string(),
                vec!["b".to_string(), "ghost".to_string(), "a".to_string()],
            )],
            &reg,
        );
        assert!(index.get("old").is_none());
        assert_eq!(index.get("new").unwrap().title, "New");
        assert_eq!(index.filters("new"), vec!["a", "b"]);
    }

    #[test]
    fn test_collections_keep_insertion_order() {
        let mut index = CategoryIndex::new();
        for name in ["basic", "color", "style"] {
            index.add_category(name, name);
        }
        assert!(index.add_to_collection("looks", "style"));
        assert!(index.add_to_collection("looks", "basic"));
        assert!(!index.add_to_collection("looks", "basic"));
        assert!(!index.add_to_collection("looks", "ghost"));
        index.add_collection("all", "Everything");

        assert_eq!(index.collection_names(), vec!["all", "looks"]);
        assert_eq!(index.categories_in("looks"), vec!["style", "basic"]);
        assert_eq!(index.categories_in(""), vec!["basic", "color", "style"]);
        assert!(index.categories_in("nope").is_empty());
        assert_eq!(index.collection_index_of("looks"), Some(1));
        assert_eq!(index.collection_at(7).unwrap().name, "looks");
        assert!(index.collection("all").unwrap().is_empty());
    }

    #[test]
    fn test_rebuild_prunes_collections() {
        let reg = registry(&["a"]);
        let mut index = CategoryIndex::new();
        index.add_member("keep", "a", &reg);
        index.add_member("drop", "a", &reg);
        index.rebuild_collections(&[(
            "mix".to_string(),
            "Mix".to_string(),
            vec!["drop".to_string(), "keep".to_string()],
        )]);
        assert_eq!(index.categories_in("mix"), vec!["drop", "keep"]);

        index.rebuild(&[("keep".to_string(), "Keep".to_string(), vec!["a".to_string()])], &reg);
        assert_eq!(index.categories_in("mix"), vec!["keep"]);
        assert_eq!(index.collection("mix").unwrap().title, "Mix");
    }

    proptest! {
        #[test]
        fn prop_filters_sorted_and_registered(keys in proptest::collection::vec("[a-z]{1,8}", 0..24)) {
            let mut reg = FilterRegistry::new();
            let mut index = CategoryIndex::new();
            for key in &keys {
                let op = FilterOperation::single(|img, _| Some(img.clone()));
                let _ = reg.register(Descriptor::builder(key.as_str(), key.as_str(), op).build());
                index.add_member("c", key, &reg);
            }
            let listed = index.filters("c");
            let mut sorted = listed.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(&listed, &sorted);
            prop_assert_eq!(&listed, &index.filters("c"));
            for key in &listed {
                prop_assert!(reg.lookup(key).is_some());
            }
        }
    }
}
