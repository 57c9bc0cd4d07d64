use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use spin_sdk::key_value::Store;

use crate::auth::{AuthService, StoreAuth};
use crate::config::email_key;
use crate::messages::post_message;
use crate::topics::{create_topic, NewTopic};

/// Byte-level key-value access plus JSON helpers on top.
///
/// Entities live under prefixed keys (`topic:<id>`), and ordered index
/// lists (`topics_list`, `messages:<topic_id>`) record creation order so
/// that queries can walk them.
pub trait Datastore {
    fn get_bytes(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set_bytes(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete_key(&self, key: &str) -> anyhow::Result<()>;

    /// Read-modify-write of one key. `f` sees the current value and
    /// returns the replacement, or `None` to leave the key untouched. On
    /// stores shared between threads no other write to `key` can land in
    /// between.
    fn update_bytes<F>(&self, key: &str, f: F) -> anyhow::Result<()>
    where
        Self: Sized,
        F: FnOnce(Option<&[u8]>) -> anyhow::Result<Option<Vec<u8>>>;

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        Self: Sized,
    {
        match self.get_bytes(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()>
    where
        Self: Sized,
    {
        self.set_bytes(key, &serde_json::to_vec(value)?)
    }

    /// Stores `value` only when `key` is unset. Returns whether it did.
    fn insert_json_if_absent<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<bool>
    where
        Self: Sized,
    {
        let mut inserted = false;
        self.update_bytes(key, |current| {
            if current.is_some() {
                return Ok(None);
            }
            inserted = true;
            Ok(Some(serde_json::to_vec(value)?))
        })?;
        Ok(inserted)
    }
}

impl Datastore for Store {
    fn get_bytes(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.get(key)
            .map_err(|e| anyhow::anyhow!("key-value get {} failed: {:?}", key, e))
    }

    fn set_bytes(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.set(key, value)
            .map_err(|e| anyhow::anyhow!("key-value set {} failed: {:?}", key, e))
    }

    fn delete_key(&self, key: &str) -> anyhow::Result<()> {
        self.delete(key)
            .map_err(|e| anyhow::anyhow!("key-value delete {} failed: {:?}", key, e))
    }

    // Spin's key-value API has no compare-and-swap.
    fn update_bytes<F>(&self, key: &str, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(Option<&[u8]>) -> anyhow::Result<Option<Vec<u8>>>,
    {
        let current = self.get_bytes(key)?;
        if let Some(next) = f(current.as_deref())? {
            self.set_bytes(key, &next)?;
        }
        Ok(())
    }
}

/// Opens the component's default Spin key-value store.
pub fn spin_store() -> anyhow::Result<Store> {
    Store::open_default().map_err(|e| anyhow::anyhow!("KV store must exist: {:?}", e))
}

/// In-process store used by the native server and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> anyhow::Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Datastore for MemoryStore {
    fn get_bytes(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set_bytes(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.entries()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete_key(&self, key: &str) -> anyhow::Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn update_bytes<F>(&self, key: &str, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(Option<&[u8]>) -> anyhow::Result<Option<Vec<u8>>>,
    {
        let mut entries = self.entries()?;
        if let Some(next) = f(entries.get(key).map(Vec::as_slice))? {
            entries.insert(key.to_string(), next);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    OldestFirst,
    NewestFirst,
}

fn edit_index<S, F>(store: &S, index: &str, edit: F) -> anyhow::Result<()>
where
    S: Datastore,
    F: FnOnce(&mut Vec<String>),
{
    store.update_bytes(index, |current| {
        let mut ids: Vec<String> = match current {
            Some(bytes) => serde_json::from_slice(bytes)?,
            None => Vec::new(),
        };
        edit(&mut ids);
        if current.is_none() && ids.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_vec(&ids)?))
    })
}

pub fn append_to_index<S: Datastore>(store: &S, index: &str, id: &str) -> anyhow::Result<()> {
    edit_index(store, index, |ids| ids.push(id.to_string()))
}

pub fn remove_from_index<S: Datastore>(store: &S, index: &str, removed: &[String]) -> anyhow::Result<()> {
    edit_index(store, index, |ids| ids.retain(|id| !removed.contains(id)))
}

fn ordered_ids<S: Datastore>(store: &S, index: &str, order: Order) -> anyhow::Result<Vec<String>> {
    let mut ids: Vec<String> = store.get_json(index)?.unwrap_or_default();
    if order == Order::NewestFirst {
        ids.reverse();
    }
    Ok(ids)
}

/// Equality-style query: walks `index` in `order`, keeps the entities
/// matching `filter`, then applies offset and limit to the matches.
pub fn fetch<S, T, K, F>(
    store: &S,
    index: &str,
    entity_key: K,
    order: Order,
    offset: usize,
    limit: usize,
    filter: F,
) -> anyhow::Result<Vec<T>>
where
    S: Datastore,
    T: DeserializeOwned,
    K: Fn(&str) -> String,
    F: Fn(&T) -> bool,
{
    let mut results = Vec::new();
    let mut skipped = 0;

    for id in ordered_ids(store, index, order)? {
        if results.len() >= limit {
            break;
        }
        let Some(entity) = store.get_json::<T>(&entity_key(&id))? else {
            continue;
        };
        if !filter(&entity) {
            continue;
        }
        if skipped < offset {
            skipped += 1;
            continue;
        }
        results.push(entity);
    }

    Ok(results)
}

/// Unfiltered page of an index. Ids before `offset` are skipped without
/// loading their entities.
pub fn page<S, T, K>(
    store: &S,
    index: &str,
    entity_key: K,
    order: Order,
    offset: usize,
    limit: usize,
) -> anyhow::Result<Vec<T>>
where
    S: Datastore,
    T: DeserializeOwned,
    K: Fn(&str) -> String,
{
    let mut results = Vec::new();
    for id in ordered_ids(store, index, order)?.iter().skip(offset).take(limit) {
        if let Some(entity) = store.get_json::<T>(&entity_key(id))? {
            results.push(entity);
        }
    }
    Ok(results)
}

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "demo";

/// Seeds a demo user with one topic and a greeting message. Does nothing
/// when the demo user already exists.
pub fn init_demo_data<S: Datastore>(store: &S) -> anyhow::Result<()> {
    if store.get_json::<String>(&email_key(DEMO_EMAIL))?.is_some() {
        return Ok(());
    }

    let auth = StoreAuth::new(store);
    let author = auth
        .signup(DEMO_EMAIL, DEMO_PASSWORD)
        .map_err(|e| anyhow::anyhow!("seeding demo user: {}", e))?;

    let topic = create_topic(
        store,
        &author,
        NewTopic {
            title: "Welcome to the board",
            ..NewTopic::default()
        },
    )
    .map_err(|e| anyhow::anyhow!("seeding demo topic: {}", e))?;

    post_message(store, &author, &topic.id, "Say hello here!")
        .map_err(|e| anyhow::anyhow!("seeding demo message: {}", e))?;

    tracing::info!(topic = %topic.id, "seeded demo data");
    Ok(())
}
