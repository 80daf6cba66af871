//! `linkd watch` - keep declarations published while the machine config changes
//!
//! A poll watcher on the config file's directory feeds a reload thread,
//! which puts the file's current contents into the config store; the
//! controller loop reacts to the store's notifications.

use anyhow::{Context as AnyhowContext, Result};
use declarative::{CancelToken, Error as StoreError, MemoryStore, ResourceStore};
use linkconfig::{MACHINE_CONFIG_ID, MachineConfig};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{
    Config as DebouncerConfig, DebounceEventResult, DebouncedEventKind, Debouncer,
    new_debouncer_opt,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use super::{Inputs, read_machine_config};
use crate::Context;
use crate::ui;

/// Quiet period before a burst of file events is delivered
const DEBOUNCE: Duration = Duration::from_millis(500);

/// How often the reload thread checks for cancellation
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

pub fn run(ctx: &Context) -> Result<()> {
    let inputs = Inputs::load(ctx)?;
    let interval = inputs.settings.poll_interval();
    let ctrl = Arc::new(inputs.controller(false, None)?);
    let events = ctrl.watch()?;
    let cancel = CancelToken::new();

    let (tx, rx) = mpsc::channel();
    // Dropping the debouncer stops the watcher
    let _debouncer = watch_file(&inputs.machine_config, interval, DEBOUNCE, tx)?;

    if !ctx.quiet {
        ui::info(&format!(
            "Watching {} (every {:?}), publishing to {}",
            inputs.machine_config.display(),
            interval,
            inputs.state_file.display()
        ));
    }

    let reloader = {
        let ctrl = Arc::clone(&ctrl);
        let cancel = cancel.clone();
        let path = inputs.machine_config.clone();
        thread::Builder::new()
            .name("config-reload".to_string())
            .spawn(move || reload_on_change(&path, &rx, ctrl.config_store(), &cancel))
            .context("Failed to start config reload thread")?
    };

    let result = ctrl.run(&events, &cancel);
    cancel.cancel();
    if reloader.join().is_err() {
        log::error!("config reload thread panicked");
    }
    result?;
    Ok(())
}

/// Poll the directory holding `path` and send debounced events to `tx`.
///
/// The directory is watched rather than the file so that a config created
/// after startup is still seen. Contents are hashed on every poll, so a
/// rewrite that keeps the modification time is still reported.
fn watch_file(
    path: &Path,
    poll_interval: Duration,
    debounce: Duration,
    tx: Sender<DebounceEventResult>,
) -> Result<Debouncer<PollWatcher>> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let poll_config = NotifyConfig::default()
        .with_poll_interval(poll_interval)
        .with_compare_contents(true);

    let debouncer_config = DebouncerConfig::default()
        .with_timeout(debounce)
        .with_notify_config(poll_config);

    let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
        .context("Failed to create config watcher")?;

    debouncer
        .watcher()
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;

    log::debug!("Watching directory: {}", dir.display());
    Ok(debouncer)
}

/// Reload `path` into `store` whenever an event names it, until cancelled
/// or the watcher goes away.
fn reload_on_change(
    path: &Path,
    rx: &Receiver<DebounceEventResult>,
    store: &MemoryStore<MachineConfig>,
    cancel: &CancelToken,
) {
    let Some(file_name) = path.file_name() else {
        log::error!("{} does not name a file", path.display());
        return;
    };

    while !cancel.is_cancelled() {
        match rx.recv_timeout(RECV_TIMEOUT) {
            Ok(Ok(events)) => {
                let touched = events.iter().any(|event| {
                    matches!(event.kind, DebouncedEventKind::Any)
                        && event.path.file_name() == Some(file_name)
                });
                if touched && let Err(e) = sync_machine_config(path, store) {
                    log::error!("{e:#}");
                }
            }
            Ok(Err(e)) => log::warn!("Watch error: {e:?}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("Config watcher stopped");
                break;
            }
        }
    }
}

/// Make `store` hold what `path` currently contains.
///
/// A missing file removes the stored config. A file that fails to parse
/// leaves the previous config in place. Putting an unchanged config is
/// silent in the store, so repeated calls are harmless.
pub fn sync_machine_config(path: &Path, store: &MemoryStore<MachineConfig>) -> Result<()> {
    match read_machine_config(path)? {
        Some(config) => {
            log::info!("Machine config {} changed", path.display());
            store.put(config)?;
        }
        None => {
            log::info!("Machine config {} removed", path.display());
            match store.destroy(&MACHINE_CONFIG_ID.to_string()) {
                Ok(()) | Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    const DUMMY0: &str = "[[network.devices]]\ninterface = \"dummy0\"\ndummy = true\n";
    const DUMMY1: &str = "[[network.devices]]\ninterface = \"dummy1\"\ndummy = true\n";

    fn stored_interface(store: &MemoryStore<MachineConfig>) -> Option<String> {
        store
            .get(&MACHINE_CONFIG_ID.to_string())
            .unwrap()
            .map(|config| config.devices()[0].interface.clone())
    }

    fn eventually(what: &str, mut check: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !check() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_sync_follows_file_lifecycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("machine.toml");
        let store: MemoryStore<MachineConfig> = MemoryStore::new();

        sync_machine_config(&path, &store).unwrap();
        assert!(store.is_empty());

        fs::write(&path, DUMMY0).unwrap();
        sync_machine_config(&path, &store).unwrap();
        assert_eq!(stored_interface(&store).as_deref(), Some("dummy0"));

        fs::remove_file(&path).unwrap();
        sync_machine_config(&path, &store).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_unparsable_file_keeps_previous_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("machine.toml");
        let store: MemoryStore<MachineConfig> = MemoryStore::new();
        store
            .put(MachineConfig::new(vec![linkconfig::Device::named("eth0")]))
            .unwrap();

        fs::write(&path, "[[network.devices]\n").unwrap();
        assert!(sync_machine_config(&path, &store).is_err());
        assert_eq!(stored_interface(&store).as_deref(), Some("eth0"));
    }

    #[test]
    fn test_watcher_reloads_on_create_rewrite_and_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("machine.toml");
        let store = Arc::new(MemoryStore::<MachineConfig>::new());
        let cancel = CancelToken::new();

        let (tx, rx) = mpsc::channel();
        let debouncer = watch_file(
            &path,
            Duration::from_millis(50),
            Duration::from_millis(50),
            tx,
        )
        .unwrap();

        let reloader = {
            let store = Arc::clone(&store);
            let cancel = cancel.clone();
            let path = path.clone();
            thread::spawn(move || reload_on_change(&path, &rx, &store, &cancel))
        };

        // Unrelated files in the same directory are ignored
        fs::write(dir.path().join("other.toml"), DUMMY1).unwrap();

        fs::write(&path, DUMMY0).unwrap();
        eventually("created config", || {
            stored_interface(&store).as_deref() == Some("dummy0")
        });

        // Same length right after the previous write, so size and
        // modification time may both be unchanged
        fs::write(&path, DUMMY1).unwrap();
        eventually("rewritten config", || {
            stored_interface(&store).as_deref() == Some("dummy1")
        });

        fs::remove_file(&path).unwrap();
        eventually("removed config", || store.is_empty());

        cancel.cancel();
        reloader.join().unwrap();
        drop(debouncer);
    }

    #[test]
    fn test_reload_stops_when_watcher_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("machine.toml");
        let store: MemoryStore<MachineConfig> = MemoryStore::new();

        let (tx, rx) = mpsc::channel();
        let debouncer = watch_file(
            &path,
            Duration::from_millis(50),
            Duration::from_millis(50),
            tx,
        )
        .unwrap();
        drop(debouncer);

        // Returns without cancellation once the sender is gone
        reload_on_change(&path, &rx, &store, &CancelToken::new());
        assert!(store.is_empty());
    }
}
