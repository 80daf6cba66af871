//! File-backed store of published link declarations
//!
//! The whole set lives in one TOML file. Every mutation rewrites it through
//! a temporary file in the same directory and an atomic rename, so readers
//! only ever see a complete file.

use chrono::{DateTime, Utc};
use declarative::{Error, Resource, ResourceStore, Result, WatchEvent};
use linkspec::{LinkKey, LinkSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

/// On-disk layout of the state file
#[derive(Debug, Serialize, Deserialize)]
struct LinkState {
    /// Last time the file was written
    last_updated: DateTime<Utc>,
    #[serde(default)]
    links: Vec<LinkSpec>,
}

type Links = BTreeMap<LinkKey, LinkSpec>;

/// Link declarations persisted in a TOML file
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles and holds the watchers
    watchers: Mutex<Vec<Sender<WatchEvent<LinkKey>>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Sender<WatchEvent<LinkKey>>>>> {
        self.watchers
            .lock()
            .map_err(|_| Error::Other("file store lock poisoned".to_string()))
    }

    /// Read every declaration; a missing file is an empty store.
    fn read(&self) -> Result<Links> {
        if !self.path.exists() {
            return Ok(Links::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::unavailable(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let state: LinkState = toml::from_str(&content).map_err(|e| {
            Error::Other(format!("failed to parse {}: {e}", self.path.display()))
        })?;

        Ok(state
            .links
            .into_iter()
            .map(|link| (link.key(), link))
            .collect())
    }

    fn write(&self, links: &Links) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let io_error = |e: std::io::Error| {
            Error::unavailable(format!("failed to write {}: {e}", self.path.display()))
        };

        fs::create_dir_all(dir).map_err(io_error)?;

        let state = LinkState {
            last_updated: Utc::now(),
            links: links.values().cloned().collect(),
        };
        let content = toml::to_string_pretty(&state)
            .map_err(|e| Error::Other(format!("failed to serialize link state: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
        tmp.write_all(content.as_bytes()).map_err(io_error)?;
        tmp.as_file().sync_all().map_err(io_error)?;
        tmp.persist(&self.path).map_err(|e| io_error(e.error))?;

        log::debug!("Saved {} link(s) to {}", links.len(), self.path.display());
        Ok(())
    }

    /// Apply one change to the file under the lock and notify watchers.
    fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Links) -> Result<Option<WatchEvent<LinkKey>>>,
    {
        let mut watchers = self.lock()?;
        let mut links = self.read()?;

        if let Some(event) = change(&mut links)? {
            self.write(&links)?;
            watchers.retain(|tx| tx.send(event.clone()).is_ok());
        }
        Ok(())
    }
}

impl ResourceStore<LinkSpec> for FileStore {
    fn list(&self, namespace: &str) -> Result<Vec<LinkSpec>> {
        let _guard = self.lock()?;
        Ok(self
            .read()?
            .into_values()
            .filter(|link| link.namespace() == namespace)
            .collect())
    }

    fn get(&self, key: &LinkKey) -> Result<Option<LinkSpec>> {
        let _guard = self.lock()?;
        Ok(self.read()?.remove(key))
    }

    fn create(&self, resource: LinkSpec) -> Result<()> {
        self.mutate(|links| {
            let key = resource.key();
            if links.contains_key(&key) {
                return Err(Error::AlreadyExists {
                    key: key.to_string(),
                });
            }
            links.insert(key.clone(), resource);
            Ok(Some(WatchEvent::Created(key)))
        })
    }

    fn update(&self, resource: LinkSpec) -> Result<()> {
        self.mutate(|links| {
            let key = resource.key();
            match links.get_mut(&key) {
                None => Err(Error::NotFound {
                    key: key.to_string(),
                }),
                Some(existing) if *existing == resource => Ok(None),
                Some(existing) => {
                    *existing = resource;
                    Ok(Some(WatchEvent::Updated(key)))
                }
            }
        })
    }

    fn destroy(&self, key: &LinkKey) -> Result<()> {
        self.mutate(|links| match links.remove(key) {
            Some(_) => Ok(Some(WatchEvent::Destroyed(key.clone()))),
            None => Err(Error::NotFound {
                key: key.to_string(),
            }),
        })
    }

    fn watch(&self) -> Result<Receiver<WatchEvent<LinkKey>>> {
        let (tx, rx) = mpsc::channel();
        self.lock()?.push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::CancelToken;
    use linkconfig::{Bond, Device, LinkConfigController, MachineConfig, Vlan};
    use linkspec::{ConfigLayer, LinkKind, NAMESPACE, VlanSpec};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path().join("state").join("links.toml"))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.list(NAMESPACE).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_crud_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let vlan = LinkSpec::logical(
            "eth0.24",
            ConfigLayer::MachineConfiguration,
            LinkKind::Vlan(VlanSpec::new(24, "eth0").unwrap()),
        );

        store(&dir).create(LinkSpec::loopback()).unwrap();
        store(&dir).create(vlan.clone()).unwrap();

        let reopened = store(&dir);
        assert_eq!(reopened.get(&vlan.key()).unwrap(), Some(vlan.clone()));
        assert_eq!(reopened.list(NAMESPACE).unwrap().len(), 2);

        let mut down = vlan.clone();
        down.up = false;
        reopened.update(down.clone()).unwrap();
        assert_eq!(store(&dir).get(&vlan.key()).unwrap(), Some(down));

        reopened.destroy(&vlan.key()).unwrap();
        assert_eq!(store(&dir).get(&vlan.key()).unwrap(), None);
    }

    #[test]
    fn test_conflicts_and_missing_keys() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(LinkSpec::loopback()).unwrap();

        assert!(matches!(
            store.create(LinkSpec::loopback()),
            Err(Error::AlreadyExists { .. })
        ));

        let eth0 = LinkSpec::physical("eth0", ConfigLayer::Cmdline);
        assert!(matches!(store.update(eth0.clone()), Err(Error::NotFound { .. })));
        assert!(matches!(store.destroy(&eth0.key()), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_watch_events() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let events = store.watch().unwrap();
        let lo = LinkSpec::loopback();

        store.create(lo.clone()).unwrap();
        store.update(lo.clone()).unwrap();
        store.destroy(&lo.key()).unwrap();

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![WatchEvent::Created(lo.key()), WatchEvent::Destroyed(lo.key())]
        );
    }

    #[test]
    fn test_corrupt_file_is_not_retryable() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "links = 5").unwrap();

        let err = store.list(NAMESPACE).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_controller_over_file_store_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let configs: declarative::MemoryStore<MachineConfig> = declarative::MemoryStore::new();
        configs
            .put(MachineConfig::new(vec![
                Device {
                    vlans: vec![Vlan { id: 24, cidr: None }],
                    ..Device::named("eth0")
                },
                Device {
                    bond: Some(Bond {
                        interfaces: vec!["eth2".into(), "eth3".into()],
                        mode: "802.3ad".into(),
                        hash_policy: Some("layer3+4".into()),
                        ..Bond::default()
                    }),
                    ..Device::named("bond0")
                },
            ]))
            .unwrap();

        let ctrl = LinkConfigController::new(None, configs, store(&dir));
        let first = ctrl.reconcile(&CancelToken::new()).unwrap();
        assert_eq!(first.summary.created, 6);

        let second = ctrl.reconcile(&CancelToken::new()).unwrap();
        assert_eq!(second.summary.total_changes(), 0);
    }
}
