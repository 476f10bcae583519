//! Current collection, category and filter plus per-filter user flags.
//!
//! Besides the catalog's categories, the selection offers a `favourites`
//! category whose members are the user's favourite filters. It shadows a
//! catalog category of the same name.

use crate::core::error::StoreError;
use crate::core::events::{Broadcaster, SubscriberId, Subscription};
use crate::filters::catalog::Catalog;
use crate::selection::store::{MemoryStore, SettingsStore};
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const KEY_COLLECTION: &str = "current/collection";
const KEY_CATEGORY: &str = "current/category";
const KEY_FILTER: &str = "current/filter";
const PREFIX_HIDDEN: &str = "hidden/";
const PREFIX_FAVOURITE: &str = "favourite/";
const PREFIX_RATING: &str = "rating/";

/// Name of the category listing the favourite filters.
pub const FAVOURITES_CATEGORY: &str = "favourites";

/// Highest rating a filter can carry.
pub const MAX_RATING: u8 = 3;

/// Selection change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// The current collection changed. `category` is the auto-selected
    /// category, if the collection had any.
    CollectionChanged {
        collection: Option<String>,
        category: Option<String>,
    },
    /// The current category changed. `filter` is the auto-selected filter.
    CategoryChanged {
        category: Option<String>,
        filter: Option<String>,
    },
    /// The current filter changed.
    FilterChanged { filter: Option<String> },
}

#[derive(Debug, Clone, Copy, Default)]
struct FilterFlags {
    hidden: Option<bool>,
    favourite: bool,
    rating: Option<u8>,
}

#[derive(Debug, Clone, Default)]
struct Current {
    collection: Option<String>,
    category: Option<String>,
    filter: Option<String>,
}

/// Process-wide selection state.
///
/// Flags are keyed by arbitrary strings, so flags for keys that are not (yet)
/// registered are accepted and kept. Every change is written through to the
/// [`SettingsStore`]; if the store fails, the state keeps working from
/// memory for the rest of the session.
///
/// Selection changes are persisted and published while the selection lock is
/// held, so observers see them in the order they were applied.
pub struct SelectionState {
    catalog: Arc<Catalog>,
    store: Arc<dyn SettingsStore>,
    degraded: AtomicBool,
    current: RwLock<Current>,
    flags: RwLock<HashMap<String, FilterFlags>>,
    events: Broadcaster<SelectionEvent>,
}

impl SelectionState {
    /// Restore state from `store`, repairing a stale category or filter.
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn SettingsStore>) -> Self {
        let state = Self {
            catalog,
            store,
            degraded: AtomicBool::new(false),
            current: RwLock::new(Current::default()),
            flags: RwLock::new(HashMap::new()),
            events: Broadcaster::new(),
        };
        state.restore();
        state
    }

    /// State backed by a fresh in-memory store.
    pub fn in_memory(catalog: Arc<Catalog>) -> Self {
        Self::new(catalog, Arc::new(MemoryStore::new()))
    }

    fn restore(&self) {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                self.store_failed(e);
                return;
            }
        };

        let mut flags = HashMap::new();
        let mut current = Current::default();
        for key in keys {
            let value = match self.store.get(&key) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    self.store_failed(e);
                    return;
                }
            };
            if key == KEY_COLLECTION {
                current.collection = Some(value);
            } else if key == KEY_CATEGORY {
                current.category = Some(value);
            } else if key == KEY_FILTER {
                current.filter = Some(value);
            } else if let Some(k) = key.strip_prefix(PREFIX_HIDDEN) {
                flags.entry(k.to_string()).or_insert_with(FilterFlags::default).hidden =
                    Some(value == "true");
            } else if let Some(k) = key.strip_prefix(PREFIX_FAVOURITE) {
                flags.entry(k.to_string()).or_insert_with(FilterFlags::default).favourite =
                    value == "true";
            } else if let Some(k) = key.strip_prefix(PREFIX_RATING) {
                match value.parse::<i64>() {
                    Ok(r) => {
                        flags.entry(k.to_string()).or_insert_with(FilterFlags::default).rating =
                            Some(r.clamp(0, MAX_RATING as i64) as u8)
                    }
                    Err(_) => warn!("Ignoring unreadable rating '{}' for '{}'", value, k),
                }
            } else {
                debug!("Ignoring unknown settings key '{}'", key);
            }
        }

        *self.flags.write() = flags;

        if let Some(collection) = &current.collection {
            if !self.catalog.has_collection(collection) {
                warn!("Stored collection '{}' no longer exists", collection);
                current.collection = None;
            }
        }
        if let Some(category) = &current.category {
            if !self.has_category(category) {
                warn!("Stored category '{}' no longer exists", category);
                current.category = None;
            }
        }
        if let Some(filter) = &current.filter {
            if !self.catalog.contains(filter) {
                warn!("Stored filter '{}' no longer exists", filter);
                current.filter = None;
            }
        }
        if current.filter.is_none() {
            current.filter = current
                .category
                .as_deref()
                .and_then(|c| self.filters(c).into_iter().next());
        }

        *self.current.write() = current;
    }

    fn store_failed(&self, error: StoreError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!("Settings store failed, keeping selection in memory only: {}", error);
        }
    }

    fn persist(&self, key: &str, value: Option<&str>) {
        if self.degraded.load(Ordering::Relaxed) {
            return;
        }
        let result = match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        };
        if let Err(e) = result {
            self.store_failed(e);
        }
    }

    /// Whether changes still reach the settings store.
    pub fn is_persistent(&self) -> bool {
        !self.degraded.load(Ordering::Relaxed)
    }

    /// The catalog this state refers to.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Current collection, if any.
    pub fn current_collection(&self) -> Option<String> {
        self.current.read().collection.clone()
    }

    /// Current category, if any.
    pub fn current_category(&self) -> Option<String> {
        self.current.read().category.clone()
    }

    /// Current filter, if any.
    pub fn current_filter(&self) -> Option<String> {
        self.current.read().filter.clone()
    }

    /// Whether `name` is the favourites category or a catalog category.
    pub fn has_category(&self, name: &str) -> bool {
        name == FAVOURITES_CATEGORY || self.catalog.has_category(name)
    }

    /// Categories of `collection` (all categories for an empty name), with
    /// the favourites category first.
    pub fn category_list(&self, collection: &str) -> Vec<String> {
        let mut list = vec![FAVOURITES_CATEGORY.to_string()];
        list.extend(
            self.catalog
                .categories_in(collection)
                .into_iter()
                .filter(|c| c != FAVOURITES_CATEGORY),
        );
        list
    }

    /// Select a collection.
    ///
    /// A different collection auto-selects its first category, which in turn
    /// selects that category's first filter. An empty or unknown collection
    /// keeps the category and clears the filter. An empty name means no
    /// collection. Returns whether anything changed.
    pub fn set_collection(&self, name: &str) -> bool {
        let collection = (!name.is_empty()).then(|| name.to_string());
        let mut current = self.current.write();
        if current.collection == collection {
            return false;
        }
        current.collection = collection.clone();
        self.persist(KEY_COLLECTION, collection.as_deref());

        let first = self.catalog.categories_in(name).into_iter().next();
        debug!("Collection -> {:?}, category -> {:?}", collection, first);
        self.events.publish(SelectionEvent::CollectionChanged {
            collection,
            category: first.clone(),
        });
        match first {
            Some(category) => {
                self.apply_category(&mut current, &category);
            }
            None => {
                warn!("Collection '{}' is empty or unknown", name);
                self.apply_clear_filter(&mut current);
            }
        }
        true
    }

    /// Select a category.
    ///
    /// A different category auto-selects its first member (or none) and
    /// notifies observers. Unknown categories are accepted with a warning
    /// and leave no filter selected. Returns whether anything changed.
    pub fn set_category(&self, name: &str) -> bool {
        let mut current = self.current.write();
        self.apply_category(&mut current, name)
    }

    fn apply_category(&self, current: &mut Current, name: &str) -> bool {
        if current.category.as_deref() == Some(name) {
            return false;
        }
        if !self.has_category(name) {
            warn!("Selecting unknown category '{}'", name);
        }
        let first = self.filters(name).into_iter().next();
        let filter_changed = current.filter != first;
        current.category = Some(name.to_string());
        current.filter = first;

        self.persist(KEY_CATEGORY, current.category.as_deref());
        self.persist(KEY_FILTER, current.filter.as_deref());
        debug!("Category -> {:?}, filter -> {:?}", current.category, current.filter);

        self.events.publish(SelectionEvent::CategoryChanged {
            category: current.category.clone(),
            filter: current.filter.clone(),
        });
        if filter_changed {
            self.events.publish(SelectionEvent::FilterChanged {
                filter: current.filter.clone(),
            });
        }
        true
    }

    /// Select a filter. Unregistered keys are refused with a warning.
    /// Returns whether anything changed.
    pub fn set_filter(&self, key: &str) -> bool {
        if !self.catalog.contains(key) {
            warn!("Cannot select unknown filter '{}'", key);
            return false;
        }
        let mut current = self.current.write();
        if current.filter.as_deref() == Some(key) {
            return false;
        }
        current.filter = Some(key.to_string());
        self.persist(KEY_FILTER, Some(key));
        self.events.publish(SelectionEvent::FilterChanged {
            filter: Some(key.to_string()),
        });
        true
    }

    /// Clear the current filter.
    pub fn clear_filter(&self) -> bool {
        let mut current = self.current.write();
        self.apply_clear_filter(&mut current)
    }

    fn apply_clear_filter(&self, current: &mut Current) -> bool {
        if current.filter.take().is_none() {
            return false;
        }
        self.persist(KEY_FILTER, None);
        self.events.publish(SelectionEvent::FilterChanged { filter: None });
        true
    }

    /// Select the next shown filter of the current category, wrapping.
    pub fn next_filter(&self) -> Option<String> {
        self.step_filter(1)
    }

    /// Select the previous shown filter of the current category, wrapping.
    pub fn previous_filter(&self) -> Option<String> {
        self.step_filter(-1)
    }

    fn step_filter(&self, delta: isize) -> Option<String> {
        let category = self.current_category()?;
        let shown = self.shown_filters(&category);
        if shown.is_empty() {
            return None;
        }
        let len = shown.len() as isize;
        let target = match self.current_filter().and_then(|f| shown.iter().position(|k| *k == f)) {
            Some(pos) => (pos as isize + delta).rem_euclid(len) as usize,
            None => 0,
        };
        let key = shown[target].clone();
        self.set_filter(&key);
        Some(key)
    }

    /// Members of `category`, sorted by key. The favourites category
    /// resolves to [`favourites`](Self::favourites).
    pub fn filters(&self, category: &str) -> Vec<String> {
        if category == FAVOURITES_CATEGORY {
            self.favourites()
        } else {
            self.catalog.filters(category)
        }
    }

    /// Members of `category` that are not hidden, sorted by key.
    pub fn shown_filters(&self, category: &str) -> Vec<String> {
        self.filters(category)
            .into_iter()
            .filter(|key| !self.is_hidden(key))
            .collect()
    }

    fn update_flags(&self, key: &str, f: impl FnOnce(&mut FilterFlags)) {
        let mut flags = self.flags.write();
        f(flags.entry(key.to_string()).or_default());
    }

    /// Hide or show a filter.
    pub fn set_hidden(&self, key: &str, hidden: bool) {
        self.update_flags(key, |f| f.hidden = Some(hidden));
        self.persist(&format!("{}{}", PREFIX_HIDDEN, key), Some(bool_str(hidden)));
    }

    /// Whether a filter is hidden. Falls back to the catalog default.
    pub fn is_hidden(&self, key: &str) -> bool {
        let stored = self.flags.read().get(key).and_then(|f| f.hidden);
        stored.unwrap_or_else(|| {
            self.catalog
                .lookup(key)
                .map_or(false, |d| d.hidden_by_default())
        })
    }

    /// Mark or unmark a favourite.
    pub fn set_favourite(&self, key: &str, favourite: bool) {
        self.update_flags(key, |f| f.favourite = favourite);
        let store_key = format!("{}{}", PREFIX_FAVOURITE, key);
        self.persist(&store_key, favourite.then_some("true"));
    }

    /// Whether a filter is a favourite.
    pub fn is_favourite(&self, key: &str) -> bool {
        self.flags.read().get(key).map_or(false, |f| f.favourite)
    }

    /// Registered favourites, sorted by key.
    pub fn favourites(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .flags
            .read()
            .iter()
            .filter(|(_, f)| f.favourite)
            .map(|(k, _)| k.clone())
            .collect();
        keys.retain(|k| self.catalog.contains(k));
        keys.sort();
        keys
    }

    /// Rate a filter; the rating is clamped to `0..=3`.
    pub fn set_rating(&self, key: &str, rating: i64) {
        let rating = rating.clamp(0, MAX_RATING as i64) as u8;
        self.update_flags(key, |f| f.rating = Some(rating));
        self.persist(&format!("{}{}", PREFIX_RATING, key), Some(&rating.to_string()));
    }

    /// Rating of a filter. Falls back to the catalog default, then 0.
    pub fn rating(&self, key: &str) -> u8 {
        let stored = self.flags.read().get(key).and_then(|f| f.rating);
        stored.unwrap_or_else(|| self.catalog.lookup(key).map_or(0, |d| d.default_rating()))
    }

    /// Observe selection changes.
    pub fn subscribe(&self) -> Subscription<SelectionEvent> {
        self.events.subscribe()
    }

    /// Stop observing.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::{Descriptor, FilterOperation};

    fn catalog() -> Arc<Catalog> {
        let catalog = Catalog::new();
        for key in ["C", "A", "B"] {
            let op = FilterOperation::single(|img, _| Some(img.clone()));
            catalog.register(Descriptor::builder(key, key, op).build()).unwrap();
            catalog.add_member("x", key);
        }
        let op = FilterOperation::single(|img, _| Some(img.clone()));
        catalog
            .register(Descriptor::builder("D", "D", op).hidden(true).rating(2).build())
            .unwrap();
        catalog.add_member("y", "D");
        catalog.add_category("empty", "Empty");
        catalog.add_to_collection("mixed", "y");
        catalog.add_to_collection("mixed", "x");
        catalog.add_collection("hollow", "Hollow");
        Arc::new(catalog)
    }

    struct BrokenStore;

    impl SettingsStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        fn keys(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_set_category_selects_first_member() {
        let state = SelectionState::in_memory(catalog());
        assert!(state.set_category("x"));
        assert_eq!(state.current_filter().as_deref(), Some("A"));
        assert!(state.set_category("empty"));
        assert_eq!(state.current_filter(), None);
    }

    #[test]
    fn test_same_category_is_noop() {
        let state = SelectionState::in_memory(catalog());
        state.set_category("x");
        state.set_filter("C");
        let sub = state.subscribe();
        assert!(!state.set_category("x"));
        assert_eq!(state.current_filter().as_deref(), Some("C"));
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_events_in_order() {
        let state = SelectionState::in_memory(catalog());
        let sub = state.subscribe();
        state.set_category("x");
        state.set_filter("B");
        state.set_filter("B");
        assert_eq!(
            sub.drain(),
            vec![
                SelectionEvent::CategoryChanged {
                    category: Some("x".to_string()),
                    filter: Some("A".to_string()),
                },
                SelectionEvent::FilterChanged { filter: Some("A".to_string()) },
                SelectionEvent::FilterChanged { filter: Some("B".to_string()) },
            ]
        );
    }

    #[test]
    fn test_unknown_category_and_filter() {
        let state = SelectionState::in_memory(catalog());
        state.set_category("x");
        assert!(state.set_category("nowhere"));
        assert_eq!(state.current_filter(), None);
        assert!(!state.set_filter("ghost"));
    }

    #[test]
    fn test_flags_for_unknown_keys_are_kept() {
        let state = SelectionState::in_memory(catalog());
        state.set_favourite("future", true);
        assert!(state.is_favourite("future"));
        assert!(state.favourites().is_empty());
    }

    #[test]
    fn test_rating_clamped_and_defaulted() {
        let state = SelectionState::in_memory(catalog());
        assert_eq!(state.rating("D"), 2);
        state.set_rating("A", 9);
        assert_eq!(state.rating("A"), 3);
        state.set_rating("A", -4);
        assert_eq!(state.rating("A"), 0);
    }

    #[test]
    fn test_hidden_filters_are_not_shown() {
        let state = SelectionState::in_memory(catalog());
        assert!(state.is_hidden("D"));
        assert!(state.shown_filters("y").is_empty());
        state.set_hidden("D", false);
        assert_eq!(state.shown_filters("y"), vec!["D"]);
        state.set_hidden("B", true);
        assert_eq!(state.shown_filters("x"), vec!["A", "C"]);
    }

    #[test]
    fn test_navigation_wraps() {
        let state = SelectionState::in_memory(catalog());
        state.set_category("x");
        assert_eq!(state.next_filter().as_deref(), Some("B"));
        assert_eq!(state.next_filter().as_deref(), Some("C"));
        assert_eq!(state.next_filter().as_deref(), Some("A"));
        assert_eq!(state.previous_filter().as_deref(), Some("C"));
        state.set_category("empty");
        assert_eq!(state.next_filter(), None);
    }

    #[test]
    fn test_flags_survive_reload() {
        let catalog = catalog();
        let store: Arc<dyn SettingsStore> = Arc::new(MemoryStore::new());
        {
            let state = SelectionState::new(catalog.clone(), store.clone());
            state.set_favourite("B", true);
            state.set_rating("C", 1);
            state.set_hidden("A", true);
            state.set_category("x");
            state.set_filter("C");
        }
        let state = SelectionState::new(catalog, store);
        assert!(state.is_favourite("B"));
        assert_eq!(state.favourites(), vec!["B"]);
        assert_eq!(state.rating("C"), 1);
        assert!(state.is_hidden("A"));
        assert_eq!(state.current_category().as_deref(), Some("x"));
        assert_eq!(state.current_filter().as_deref(), Some("C"));
    }

    #[test]
    fn test_restore_repairs_stale_selection() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_CATEGORY, "x").unwrap();
        store.set(KEY_FILTER, "deleted").unwrap();
        let state = SelectionState::new(catalog(), store.clone());
        assert_eq!(state.current_filter().as_deref(), Some("A"));

        store.set(KEY_CATEGORY, "deleted").unwrap();
        let state = SelectionState::new(catalog(), store);
        assert_eq!(state.current_category(), None);
        assert_eq!(state.current_filter(), None);
    }

    #[test]
    fn test_set_collection_selects_first_category() {
        let state = SelectionState::in_memory(catalog());
        state.set_category("x");
        state.set_filter("C");
        let sub = state.subscribe();

        assert!(state.set_collection("mixed"));
        assert_eq!(state.current_collection().as_deref(), Some("mixed"));
        assert_eq!(state.current_category().as_deref(), Some("y"));
        assert_eq!(state.current_filter().as_deref(), Some("D"));
        assert!(!state.set_collection("mixed"));
        assert_eq!(
            sub.drain()[0],
            SelectionEvent::CollectionChanged {
                collection: Some("mixed".to_string()),
                category: Some("y".to_string()),
            }
        );

        assert!(state.set_collection("hollow"));
        assert_eq!(state.current_category().as_deref(), Some("y"));
        assert_eq!(state.current_filter(), None);
    }

    #[test]
    fn test_category_list_starts_with_favourites() {
        let state = SelectionState::in_memory(catalog());
        assert_eq!(state.category_list("mixed"), vec![FAVOURITES_CATEGORY, "y", "x"]);
        assert_eq!(state.category_list(""), vec![FAVOURITES_CATEGORY, "empty", "x", "y"]);
        assert_eq!(state.category_list("nope"), vec![FAVOURITES_CATEGORY]);
    }

    #[test]
    fn test_favourites_category_is_browsable() {
        let state = SelectionState::in_memory(catalog());
        state.set_favourite("C", true);
        state.set_favourite("A", true);
        state.set_favourite("ghost", true);

        assert!(state.set_category(FAVOURITES_CATEGORY));
        assert_eq!(state.current_filter().as_deref(), Some("A"));
        assert_eq!(state.shown_filters(FAVOURITES_CATEGORY), vec!["A", "C"]);
        assert_eq!(state.next_filter().as_deref(), Some("C"));
        assert_eq!(state.next_filter().as_deref(), Some("A"));

        state.set_favourite("A", false);
        assert_eq!(state.filters(FAVOURITES_CATEGORY), vec!["C"]);
    }

    #[test]
    fn test_favourites_and_collection_survive_reload() {
        let catalog = catalog();
        let store: Arc<dyn SettingsStore> = Arc::new(MemoryStore::new());
        {
            let state = SelectionState::new(catalog.clone(), store.clone());
            state.set_favourite("B", true);
            state.set_collection("mixed");
            state.set_category(FAVOURITES_CATEGORY);
        }
        let state = SelectionState::new(catalog, store.clone());
        assert_eq!(state.current_collection().as_deref(), Some("mixed"));
        assert_eq!(state.current_category().as_deref(), Some(FAVOURITES_CATEGORY));
        assert_eq!(state.current_filter().as_deref(), Some("B"));

        store.set(KEY_COLLECTION, "deleted").unwrap();
        let state = SelectionState::new(self::catalog(), store);
        assert_eq!(state.current_collection(), None);
    }

    #[test]
    fn test_concurrent_changes_publish_in_applied_order() {
        let state = Arc::new(SelectionState::in_memory(catalog()));
        let sub = state.subscribe();
        let workers: Vec<_> = ["x", "y"]
            .into_iter()
            .map(|name| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        state.set_category(if i % 2 == 0 { name } else { "empty" });
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let last = sub
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                SelectionEvent::CategoryChanged { category, .. } => Some(category),
                _ => None,
            })
            .last()
            .flatten();
        assert_eq!(last, state.current_category());
    }

    #[test]
    fn test_broken_store_falls_back_to_memory() {
        let state = SelectionState::new(catalog(), Arc::new(BrokenStore));
        assert!(!state.is_persistent());
        state.set_favourite("A", true);
        assert!(state.is_favourite("A"));
        assert!(state.set_category("x"));
        assert_eq!(state.current_filter().as_deref(), Some("A"));
    }
}
