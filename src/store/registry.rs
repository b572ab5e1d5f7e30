//! Store registry (§4.9), modeled as a `Runtime` value passed by reference
//! rather than a process-wide singleton (§9) — tests construct fresh
//! runtimes instead of sharing global state.

use crate::config::Config;
use crate::error::{MailCacheError, Result};
use crate::events::{ChangedItem, EventKind};
use crate::mode::Mode;
use crate::store::credential::CredentialSource;
use crate::store::imap_client::ImapClient;
use crate::store::store::Store;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Process-wide (or test-scoped) directory of open stores keyed by account
/// id. `open_store` returns the existing instance rather than opening a
/// second connection for an already-open account.
#[derive(Default)]
pub struct Runtime {
    stores: Mutex<HashMap<String, Arc<Store>>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or return the already-open) store for `account_id`. `remote`
    /// is consulted only the first time an account is opened.
    pub fn open_store(
        &self,
        account_id: &str,
        config: &Config,
        remote: Option<Box<dyn ImapClient>>,
    ) -> Arc<Store> {
        self.open_store_with_credentials(account_id, config, None, remote)
    }

    /// Like [`Runtime::open_store`], but additionally consults
    /// `credentials` exactly once to resolve the mode a freshly opened
    /// store should start in, per §6 ("the core reads this exactly once
    /// per store open").  A `stored_mode` from the credential source takes
    /// precedence over `config`'s default; `config`'s default applies when
    /// the credential source has no opinion, or there is none.
    pub fn open_store_with_credentials(
        &self,
        account_id: &str,
        config: &Config,
        credentials: Option<&dyn CredentialSource>,
        remote: Option<Box<dyn ImapClient>>,
    ) -> Arc<Store> {
        let mut stores = self.stores.lock().expect("runtime lock poisoned");
        if let Some(existing) = stores.get(account_id) {
            return existing.clone();
        }
        let stored_mode = credentials.and_then(|source| source.credentials_for(account_id)).and_then(|c| c.stored_mode);
        let mode = stored_mode.unwrap_or_else(|| config.default_mode());
        let mut store = Store::new(account_id, config.cache_root.clone(), mode).with_config(config);
        if let Some(remote) = remote {
            store = store.with_remote(remote);
        }
        let store = Arc::new(store);
        stores.insert(account_id.to_string(), store.clone());
        store.publish(EventKind::StoreOpened, ChangedItem::Account(account_id.to_string()));
        store
    }

    pub fn get(&self, account_id: &str) -> Option<Arc<Store>> {
        self.stores.lock().expect("runtime lock poisoned").get(account_id).cloned()
    }

    /// Close one store and remove it from the registry.
    pub fn close_store(&self, account_id: &str) -> Result<()> {
        let store = self.stores.lock().expect("runtime lock poisoned").remove(account_id);
        match store {
            Some(store) => {
                store.close();
                Ok(())
            }
            None => Err(MailCacheError::NotFound(format!("no open store for {account_id}"))),
        }
    }

    /// Close every open store and clear the registry.
    pub fn close_all_stores(&self) {
        let mut stores = self.stores.lock().expect("runtime lock poisoned");
        for (_, store) in stores.drain() {
            store.close();
        }
    }

    pub fn open_account_ids(&self) -> Vec<String> {
        self.stores.lock().expect("runtime lock poisoned").keys().cloned().collect()
    }
}

/// Convenience default mode name used when a `Config` is not available.
pub const DEFAULT_MODE: Mode = Mode::Online;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reopening_same_account_returns_existing_instance() {
        let dir = tempdir().unwrap();
        let runtime = Runtime::new();
        let config = Config::new(dir.path());
        let a = runtime.open_store("user@host", &config, None);
        let b = runtime.open_store("user@host", &config, None);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn close_all_stores_empties_registry() {
        let dir = tempdir().unwrap();
        let runtime = Runtime::new();
        let config = Config::new(dir.path());
        runtime.open_store("a@host", &config, None);
        runtime.open_store("b@host", &config, None);
        runtime.close_all_stores();
        assert!(runtime.open_account_ids().is_empty());
    }

    #[test]
    fn close_store_missing_account_is_not_found() {
        let runtime = Runtime::new();
        assert!(matches!(runtime.close_store("nobody@host"), Err(MailCacheError::NotFound(_))));
    }
}
