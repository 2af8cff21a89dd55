//! In-memory mock store for testing.
//!
//! One [`MockStore`] is the shared substrate; each simulated peer holds a
//! [`MockStoreHandle`] (a connection) obtained from [`MockStore::connect`].
//! Handles can be taken offline to exercise transient unavailability, or
//! severed to exercise abrupt process loss - severing fires any registered
//! dead-man's-switch writes, exactly like the real store's server side.

use super::{SessionStore, StoreError, WatchId};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

/// The shared in-memory substrate behind every [`MockStoreHandle`].
#[derive(Debug, Default, Clone)]
pub struct MockStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Leaf documents keyed by full path. BTreeMap keeps child iteration
    /// deterministic.
    docs: BTreeMap<String, Value>,
    watchers: HashMap<u64, Watcher>,
    next_watch: u64,
    next_conn: u64,
    /// Dead-man's-switch writes per connection, applied on sever.
    hooks: HashMap<u64, Vec<(String, Value)>>,
    offline: HashSet<u64>,
    severed: HashSet<u64>,
}

#[derive(Debug)]
struct Watcher {
    conn: u64,
    path: String,
    sender: UnboundedSender<Value>,
}

/// One peer's connection to a [`MockStore`].
#[derive(Debug, Clone)]
pub struct MockStoreHandle {
    store: MockStore,
    conn: u64,
}

impl MockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection to the store.
    pub fn connect(&self) -> MockStoreHandle {
        let mut inner = self.inner.lock().unwrap();
        let conn = inner.next_conn;
        inner.next_conn += 1;
        MockStoreHandle {
            store: self.clone(),
            conn,
        }
    }

    /// Read the current value at a path, bypassing any connection. Test
    /// helper for assertions.
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        let inner = self.inner.lock().unwrap();
        value_at(&inner.docs, path)
    }

    fn mutate<F>(&self, conn: u64, f: F) -> Result<MutationResult, StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, Value>) -> MutationResult,
    {
        let mut inner = self.inner.lock().unwrap();
        check_connected(&inner, conn)?;
        let result = f(&mut inner.docs);
        if let Some(path) = result.changed_path.clone() {
            notify(&mut inner, &path);
        }
        Ok(result)
    }
}

struct MutationResult {
    changed_path: Option<String>,
    created: bool,
    removed: bool,
}

impl MockStoreHandle {
    /// Simulate transient connectivity loss: operations fail until
    /// [`set_online`](Self::set_online) is called. Dead-man's-switch writes
    /// are not fired - the connection is degraded, not dropped.
    pub fn set_offline(&self) {
        let mut inner = self.store.inner.lock().unwrap();
        inner.offline.insert(self.conn);
    }

    /// Restore connectivity after [`set_offline`](Self::set_offline).
    pub fn set_online(&self) {
        let mut inner = self.store.inner.lock().unwrap();
        inner.offline.remove(&self.conn);
    }

    /// Simulate abrupt process loss: fires every registered
    /// dead-man's-switch write, drops this connection's subscriptions, and
    /// fails all further operations on this handle.
    pub fn sever(&self) {
        let mut inner = self.store.inner.lock().unwrap();
        inner.severed.insert(self.conn);
        inner.watchers.retain(|_, w| w.conn != self.conn);

        let hooks = inner.hooks.remove(&self.conn).unwrap_or_default();
        for (path, fields) in hooks {
            merge_into(&mut inner.docs, &path, fields);
            notify(&mut inner, &path);
        }
    }

    /// The shared substrate this handle is connected to.
    pub fn store(&self) -> &MockStore {
        &self.store
    }
}

#[async_trait]
impl SessionStore for MockStoreHandle {
    async fn subscribe(
        &self,
        path: &str,
        sender: UnboundedSender<Value>,
    ) -> Result<WatchId, StoreError> {
        let mut inner = self.store.inner.lock().unwrap();
        check_connected(&inner, self.conn)?;
        let id = inner.next_watch;
        inner.next_watch += 1;
        inner.watchers.insert(
            id,
            Watcher {
                conn: self.conn,
                path: path.to_string(),
                sender,
            },
        );
        Ok(WatchId(id))
    }

    async fn unsubscribe(&self, watch: WatchId) {
        let mut inner = self.store.inner.lock().unwrap();
        inner.watchers.remove(&watch.0);
    }

    async fn write(&self, path: &str, fields: Value) -> Result<(), StoreError> {
        let path = path.to_string();
        self.store
            .mutate(self.conn, move |docs| {
                merge_into(docs, &path, fields);
                MutationResult {
                    changed_path: Some(path),
                    created: false,
                    removed: false,
                }
            })
            .map(|_| ())
    }

    async fn write_once(&self, path: &str, value: Value) -> Result<bool, StoreError> {
        let path = path.to_string();
        self.store
            .mutate(self.conn, move |docs| {
                if docs.contains_key(&path) {
                    MutationResult {
                        changed_path: None,
                        created: false,
                        removed: false,
                    }
                } else {
                    docs.insert(path.clone(), value);
                    MutationResult {
                        changed_path: Some(path),
                        created: true,
                        removed: false,
                    }
                }
            })
            .map(|r| r.created)
    }

    async fn read_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.store.inner.lock().unwrap();
        check_connected(&inner, self.conn)?;
        Ok(value_at(&inner.docs, path))
    }

    async fn remove_if_present(&self, path: &str) -> Result<bool, StoreError> {
        let path = path.to_string();
        self.store
            .mutate(self.conn, move |docs| {
                let removed = docs.remove(&path).is_some();
                MutationResult {
                    changed_path: removed.then_some(path),
                    created: false,
                    removed,
                }
            })
            .map(|r| r.removed)
    }

    async fn on_disconnect_set(&self, path: &str, fields: Value) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock().unwrap();
        check_connected(&inner, self.conn)?;
        inner
            .hooks
            .entry(self.conn)
            .or_default()
            .push((path.to_string(), fields));
        Ok(())
    }
}

fn check_connected(inner: &Inner, conn: u64) -> Result<(), StoreError> {
    if inner.severed.contains(&conn) {
        return Err(StoreError::Unavailable("connection severed".into()));
    }
    if inner.offline.contains(&conn) {
        return Err(StoreError::Unavailable("connection offline".into()));
    }
    Ok(())
}

/// Merge `fields` into the leaf at `path`, field by field. A field whose
/// current value is a terminal status string is never overwritten: the
/// first terminal writer wins, and later terminal writes are dropped.
fn merge_into(docs: &mut BTreeMap<String, Value>, path: &str, fields: Value) {
    let existing = docs.entry(path.to_string()).or_insert_with(|| {
        Value::Object(Map::new())
    });
    match (existing, fields) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                if is_terminal(existing.get(&key)) {
                    continue;
                }
                existing.insert(key, value);
            }
        }
        (existing, fields) => *existing = fields,
    }
}

fn is_terminal(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if s.starts_with("ended:"))
}

/// The value at `path`: the leaf if one exists, else the nested object of
/// descendants, else `None`.
fn value_at(docs: &BTreeMap<String, Value>, path: &str) -> Option<Value> {
    if let Some(leaf) = docs.get(path) {
        return Some(leaf.clone());
    }

    let prefix = format!("{}/", path);
    let mut children = Map::new();
    for (key, value) in docs.range(prefix.clone()..) {
        let Some(remainder) = key.strip_prefix(&prefix) else {
            break;
        };
        insert_nested(&mut children, remainder, value.clone());
    }
    (!children.is_empty()).then_some(Value::Object(children))
}

fn insert_nested(object: &mut Map<String, Value>, remainder: &str, value: Value) {
    match remainder.split_once('/') {
        None => {
            object.insert(remainder.to_string(), value);
        }
        Some((head, rest)) => {
            let child = object
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                insert_nested(child, rest, value);
            }
        }
    }
}

/// Push the current value under every watcher related to the changed path.
fn notify(inner: &mut Inner, changed: &str) {
    let mut dead = Vec::new();
    for (id, watcher) in &inner.watchers {
        if !paths_related(&watcher.path, changed) {
            continue;
        }
        let value = value_at(&inner.docs, &watcher.path).unwrap_or(Value::Null);
        if watcher.sender.send(value).is_err() {
            dead.push(*id);
        }
    }
    for id in dead {
        inner.watchers.remove(&id);
    }
}

/// True when one path is the other, an ancestor of it, or a descendant.
fn paths_related(a: &str, b: &str) -> bool {
    a == b
        || b.starts_with(&format!("{}/", a))
        || a.starts_with(&format!("{}/", b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let store = MockStore::new();
        let handle = store.connect();

        handle
            .write("g/sessions/AB12X", json!({"board": "start"}))
            .await
            .unwrap();

        let value = handle.read_once("g/sessions/AB12X").await.unwrap().unwrap();
        assert_eq!(value, json!({"board": "start"}));
    }

    #[tokio::test]
    async fn write_merges_fields() {
        let store = MockStore::new();
        let handle = store.connect();

        handle.write("doc", json!({"a": 1, "b": 2})).await.unwrap();
        handle.write("doc", json!({"b": 3})).await.unwrap();

        let value = handle.read_once("doc").await.unwrap().unwrap();
        assert_eq!(value, json!({"a": 1, "b": 3}));
    }

    #[tokio::test]
    async fn terminal_field_wins_first_write() {
        let store = MockStore::new();
        let a = store.connect();
        let b = store.connect();

        a.write("doc", json!({"status": "ended:timeout:w"}))
            .await
            .unwrap();
        // The losing racer's write is dropped, not merged.
        b.write("doc", json!({"status": "ended:abandoned:b"}))
            .await
            .unwrap();

        let value = store.snapshot("doc").unwrap();
        assert_eq!(value["status"], "ended:timeout:w");
    }

    #[tokio::test]
    async fn non_terminal_status_still_overwrites() {
        let store = MockStore::new();
        let handle = store.connect();

        handle.write("doc", json!({"status": "waiting"})).await.unwrap();
        handle.write("doc", json!({"status": "playing"})).await.unwrap();

        assert_eq!(store.snapshot("doc").unwrap()["status"], "playing");
    }

    #[tokio::test]
    async fn write_once_only_creates() {
        let store = MockStore::new();
        let handle = store.connect();

        assert!(handle.write_once("doc", json!({"v": 1})).await.unwrap());
        assert!(!handle.write_once("doc", json!({"v": 2})).await.unwrap());
        assert_eq!(store.snapshot("doc").unwrap(), json!({"v": 1}));
    }

    #[tokio::test]
    async fn remove_if_present_is_exactly_once() {
        let store = MockStore::new();
        let a = store.connect();
        let b = store.connect();

        a.write_once("q/600/AAAA1", json!({"e": 1})).await.unwrap();

        let first = a.remove_if_present("q/600/AAAA1").await.unwrap();
        let second = b.remove_if_present("q/600/AAAA1").await.unwrap();
        assert!(first);
        assert!(!second, "only one claimant may succeed");
    }

    #[tokio::test]
    async fn interior_read_collects_children() {
        let store = MockStore::new();
        let handle = store.connect();

        handle.write_once("q/600/AAAA1", json!({"t": 1})).await.unwrap();
        handle.write_once("q/600/BBBB2", json!({"t": 2})).await.unwrap();
        handle.write_once("q/300/CCCC3", json!({"t": 3})).await.unwrap();

        let bucket = handle.read_once("q/600").await.unwrap().unwrap();
        let object = bucket.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(object.contains_key("AAAA1"));
        assert!(object.contains_key("BBBB2"));
    }

    #[tokio::test]
    async fn missing_path_reads_none() {
        let store = MockStore::new();
        let handle = store.connect();
        assert!(handle.read_once("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subscriber_sees_writes() {
        let store = MockStore::new();
        let writer = store.connect();
        let watcher = store.connect();

        let (tx, mut rx) = mpsc::unbounded_channel();
        watcher.subscribe("doc", tx).await.unwrap();

        writer.write("doc", json!({"a": 1})).await.unwrap();
        let value = rx.recv().await.unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn subscriber_sees_removal_as_null() {
        let store = MockStore::new();
        let handle = store.connect();
        handle.write("doc", json!({"a": 1})).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.subscribe("doc", tx).await.unwrap();

        handle.remove_if_present("doc").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let store = MockStore::new();
        let handle = store.connect();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watch = handle.subscribe("doc", tx).await.unwrap();
        handle.unsubscribe(watch).await;

        handle.write("doc", json!({"a": 1})).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_handle_fails_operations() {
        let store = MockStore::new();
        let handle = store.connect();

        handle.set_offline();
        let result = handle.write("doc", json!({"a": 1})).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        handle.set_online();
        handle.write("doc", json!({"a": 1})).await.unwrap();
    }

    #[tokio::test]
    async fn sever_fires_dead_man_switch() {
        let store = MockStore::new();
        let doomed = store.connect();
        let survivor = store.connect();

        doomed
            .on_disconnect_set("doc", json!({"presence_guest": false}))
            .await
            .unwrap();
        doomed
            .write("doc", json!({"presence_guest": true}))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        survivor.subscribe("doc", tx).await.unwrap();

        doomed.sever();

        let value = rx.recv().await.unwrap();
        assert_eq!(value["presence_guest"], false);
        assert!(matches!(
            doomed.read_once("doc").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn sever_without_hooks_is_quiet() {
        let store = MockStore::new();
        let handle = store.connect();
        handle.write("doc", json!({"a": 1})).await.unwrap();
        handle.sever();
        assert_eq!(store.snapshot("doc").unwrap(), json!({"a": 1}));
    }
}
