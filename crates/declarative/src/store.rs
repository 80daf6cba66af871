//! Resource stores
//!
//! A store is the repository declarations are published into. Consumers
//! list and watch it; controllers reconcile it. Keys are unique across the
//! whole store, namespaces partition listings.

use crate::error::{Error, Result};
use crate::resource::Resource;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

/// Change notification delivered to store watchers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent<K> {
    /// A resource was created
    Created(K),
    /// A resource was replaced with a different value
    Updated(K),
    /// A resource was removed
    Destroyed(K),
}

impl<K> WatchEvent<K> {
    /// Key of the resource the event refers to
    pub fn key(&self) -> &K {
        match self {
            Self::Created(k) | Self::Updated(k) | Self::Destroyed(k) => k,
        }
    }
}

/// Repository abstraction for published resources
///
/// Implementations must make every single call atomic: a reader never
/// observes a half-written resource.
pub trait ResourceStore<R: Resource>: Send + Sync {
    /// List every resource in a namespace, ordered by key
    fn list(&self, namespace: &str) -> Result<Vec<R>>;

    /// Get a resource by key
    fn get(&self, key: &R::Key) -> Result<Option<R>>;

    /// Create a resource; fails with `AlreadyExists` if the key is taken
    fn create(&self, resource: R) -> Result<()>;

    /// Replace an existing resource; fails with `NotFound` if absent
    fn update(&self, resource: R) -> Result<()>;

    /// Remove a resource; fails with `NotFound` if absent
    fn destroy(&self, key: &R::Key) -> Result<()>;

    /// Subscribe to change notifications
    ///
    /// Events are delivered for every successful mutation after the call.
    /// Dropping the receiver unsubscribes.
    fn watch(&self) -> Result<Receiver<WatchEvent<R::Key>>>;
}

struct Inner<R: Resource> {
    resources: BTreeMap<R::Key, R>,
    watchers: Vec<Sender<WatchEvent<R::Key>>>,
}

/// In-memory resource store
///
/// Cloning is cheap and yields a handle to the same underlying store.
pub struct MemoryStore<R: Resource> {
    inner: Arc<Mutex<Inner<R>>>,
}

impl<R: Resource> Clone for MemoryStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resource> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> MemoryStore<R> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                resources: BTreeMap::new(),
                watchers: Vec::new(),
            })),
        }
    }

    /// Number of resources across all namespaces
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.resources.len()).unwrap_or(0)
    }

    /// Check if the store holds no resources
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create or replace a resource, whichever applies
    ///
    /// Replacing a resource with an identical value notifies nobody.
    pub fn put(&self, resource: R) -> Result<()> {
        let key = resource.key();
        let mut inner = self.lock()?;
        let event = match inner.resources.insert(key.clone(), resource.clone()) {
            Some(previous) if previous == resource => return Ok(()),
            Some(_) => WatchEvent::Updated(key),
            None => WatchEvent::Created(key),
        };
        notify(&mut inner, event);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<R>>> {
        self.inner
            .lock()
            .map_err(|_| Error::Other("memory store lock poisoned".to_string()))
    }
}

/// Deliver an event to every live watcher, dropping closed ones
fn notify<R: Resource>(inner: &mut Inner<R>, event: WatchEvent<R::Key>) {
    inner
        .watchers
        .retain(|watcher| watcher.send(event.clone()).is_ok());
}

impl<R: Resource> ResourceStore<R> for MemoryStore<R> {
    fn list(&self, namespace: &str) -> Result<Vec<R>> {
        let inner = self.lock()?;
        Ok(inner
            .resources
            .values()
            .filter(|r| r.namespace() == namespace)
            .cloned()
            .collect())
    }

    fn get(&self, key: &R::Key) -> Result<Option<R>> {
        Ok(self.lock()?.resources.get(key).cloned())
    }

    fn create(&self, resource: R) -> Result<()> {
        let key = resource.key();
        let mut inner = self.lock()?;
        if inner.resources.contains_key(&key) {
            return Err(Error::AlreadyExists {
                key: key.to_string(),
            });
        }
        inner.resources.insert(key.clone(), resource);
        notify(&mut inner, WatchEvent::Created(key));
        Ok(())
    }

    fn update(&self, resource: R) -> Result<()> {
        let key = resource.key();
        let mut inner = self.lock()?;
        match inner.resources.get_mut(&key) {
            Some(existing) => {
                if *existing == resource {
                    return Ok(());
                }
                *existing = resource;
            }
            None => {
                return Err(Error::NotFound {
                    key: key.to_string(),
                });
            }
        }
        notify(&mut inner, WatchEvent::Updated(key));
        Ok(())
    }

    fn destroy(&self, key: &R::Key) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.resources.remove(key).is_none() {
            return Err(Error::NotFound {
                key: key.to_string(),
            });
        }
        notify(&mut inner, WatchEvent::Destroyed(key.clone()));
        Ok(())
    }

    fn watch(&self) -> Result<Receiver<WatchEvent<R::Key>>> {
        let (tx, rx) = mpsc::channel();
        self.lock()?.watchers.push(tx);
        Ok(rx)
    }
}
