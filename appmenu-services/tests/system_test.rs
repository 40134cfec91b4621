use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use appmenu_services::system::{
    Environment, MemoryEnvironment, XSettingsStore, MODULES_KEY, OVERRIDES_KEY,
};
use appmenu_services::{Activation, SystemError, SystemProperties};
use async_trait::async_trait;

#[derive(Clone, Default)]
struct MemoryStore {
    values: Rc<RefCell<HashMap<&'static str, String>>>,
}

#[async_trait(?Send)]
impl XSettingsStore for MemoryStore {
    async fn read(&self, key: &'static str) -> Result<String, SystemError> {
        Ok(self.values.borrow().get(key).cloned().unwrap_or_default())
    }

    async fn write(&self, key: &'static str, value: &str) -> Result<(), SystemError> {
        self.values.borrow_mut().insert(key, value.to_string());
        Ok(())
    }
}

fn store() -> MemoryStore {
    let store = MemoryStore::default();
    store.values.borrow_mut().insert(MODULES_KEY, "['gail']".to_string());
    store
        .values
        .borrow_mut()
        .insert(OVERRIDES_KEY, "{'Gtk/IMModule': <'ibus'>}".to_string());
    store
}

#[tokio::test]
async fn test_first_enable_needs_restart() {
    let store = store();
    let mut env = MemoryEnvironment::default();
    env.set_var("GTK_MODULES", "gail");
    let mut system = SystemProperties::new(Box::new(env), Box::new(store.clone()));

    assert!(!system.module_loaded());
    assert_eq!(system.enable().await.unwrap(), Activation::NeedsRestart);
    assert!(system.is_enabled());
    assert!(system.module_loaded());

    let values = store.values.borrow();
    assert_eq!(values[MODULES_KEY], "['gail', 'unity-gtk-module']");
    assert_eq!(
        values[OVERRIDES_KEY],
        "{'Gtk/IMModule': <'ibus'>, 'Gtk/ShellShowsAppMenu': <1>, 'Gtk/ShellShowsMenubar': <1>}"
    );
}

#[tokio::test]
async fn test_enable_when_already_loaded_is_active() {
    let mut env = MemoryEnvironment::default();
    env.set_var("GTK_MODULES", "gail:unity-gtk-module");
    let mut system = SystemProperties::new(Box::new(env), Box::new(store()));
    assert_eq!(system.enable().await.unwrap(), Activation::Active);
}

#[tokio::test]
async fn test_disable_resets_overrides_only() {
    let store = store();
    let mut system = SystemProperties::new(Box::new(MemoryEnvironment::default()), Box::new(store.clone()));
    system.enable().await.unwrap();
    system.disable().await.unwrap();
    assert!(!system.is_enabled());

    let values = store.values.borrow();
    assert_eq!(values[OVERRIDES_KEY], "{'Gtk/IMModule': <'ibus'>}");
    assert_eq!(values[MODULES_KEY], "['gail', 'unity-gtk-module']");
}

#[tokio::test]
async fn test_malformed_store_values_fail() {
    let store = MemoryStore::default();
    store.values.borrow_mut().insert(MODULES_KEY, "nonsense".to_string());
    let mut system = SystemProperties::new(Box::new(MemoryEnvironment::default()), Box::new(store));
    assert!(matches!(system.enable().await, Err(SystemError::Parse(..))));
}
