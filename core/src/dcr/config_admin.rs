//! Configuration Admin.
//!
//! Pushes named property bags ("configurations", keyed by PID — a
//! component's name) to the DCR, which re-evaluates affected components'
//! satisfaction and, for `Dynamic` references, live bindings.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use forge_abi::Properties;

/// Notified whenever a configuration is created, updated, or deleted.
pub trait ConfigurationListener: Send + Sync {
    fn configuration_changed(&self, pid: &str, properties: Option<&Properties>);
}

/// The Configuration Admin surface: get/update/delete plus listener
/// registration, so the DCR (and tests) can react to pushes.
pub trait ConfigurationAdmin: Send + Sync {
    fn get(&self, pid: &str) -> Option<Properties>;
    fn update(&self, pid: &str, properties: Properties);
    fn delete(&self, pid: &str);
    fn add_listener(&self, listener: Weak<dyn ConfigurationListener>);
}

/// In-memory `ConfigurationAdmin`, sufficient for a single-process
/// framework instance. No persistence across restarts.
#[derive(Default)]
pub struct MemoryConfigurationAdmin {
    configs: RwLock<HashMap<String, Properties>>,
    listeners: RwLock<Vec<Weak<dyn ConfigurationListener>>>,
}

impl MemoryConfigurationAdmin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn notify(&self, pid: &str, properties: Option<&Properties>) {
        let mut listeners = self.listeners.write().unwrap();
        listeners.retain(|weak| {
            if let Some(listener) = weak.upgrade() {
                listener.configuration_changed(pid, properties);
                true
            } else {
                false
            }
        });
    }
}

impl ConfigurationAdmin for MemoryConfigurationAdmin {
    fn get(&self, pid: &str) -> Option<Properties> {
        self.configs.read().unwrap().get(pid).cloned()
    }

    fn update(&self, pid: &str, properties: Properties) {
        self.configs
            .write()
            .unwrap()
            .insert(pid.to_owned(), properties.clone());
        self.notify(pid, Some(&properties));
    }

    fn delete(&self, pid: &str) {
        self.configs.write().unwrap().remove(pid);
        self.notify(pid, None);
    }

    fn add_listener(&self, listener: Weak<dyn ConfigurationListener>) {
        self.listeners.write().unwrap().push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener(AtomicUsize);

    impl ConfigurationListener for CountingListener {
        fn configuration_changed(&self, _pid: &str, _properties: Option<&Properties>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn update_notifies_listeners() {
        let admin = MemoryConfigurationAdmin::new();
        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));
        admin.add_listener(Arc::downgrade(&listener) as Weak<dyn ConfigurationListener>);

        admin.update("com.example.Producer", Properties::new());
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
        assert_eq!(admin.get("com.example.Producer"), Some(Properties::new()));

        admin.delete("com.example.Producer");
        assert_eq!(listener.0.load(Ordering::SeqCst), 2);
        assert_eq!(admin.get("com.example.Producer"), None);
    }
}
