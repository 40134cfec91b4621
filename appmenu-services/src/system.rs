//! Session integration that makes GTK applications export their menus.
//!
//! GTK only exports menu bars when `unity-gtk-module` is loaded and the xsettings overrides
//! claim the shell shows them. Applications read both at startup, which is why turning the
//! integration on for the first time needs a restart of the session.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, info};
use smol::process::Command;
use thiserror::Error;

/// Module appended to `GTK_MODULES`.
pub const GTK_MODULE: &str = "unity-gtk-module";
/// Schema holding the xsettings keys.
pub const XSETTINGS_SCHEMA: &str = "org.gnome.settings-daemon.plugins.xsettings";
/// `as` key listing GTK modules loaded by every application.
pub const MODULES_KEY: &str = "enabled-gtk-modules";
/// `a{sv}` key with xsettings overrides.
pub const OVERRIDES_KEY: &str = "overrides";
/// Overrides forced to `1` while the integration is on.
pub const SHELL_OVERRIDES: [&str; 2] = ["Gtk/ShellShowsAppMenu", "Gtk/ShellShowsMenubar"];

/// Failures talking to the session.
#[derive(Debug, Error)]
pub enum SystemError {
    /// The settings tool could not be started.
    #[error("failed to run {0}: {1}")]
    Spawn(&'static str, #[source] std::io::Error),
    /// The settings tool failed.
    #[error("{0} exited with status {1}: {2}")]
    Exit(&'static str, i32, String),
    /// A stored value was not in the expected text form.
    #[error("malformed value of {0}: {1}")]
    Parse(&'static str, String),
}

/// Process environment, abstracted so tests do not touch the real one.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
    fn set_var(&mut self, key: &str, value: &str);
    fn remove_var(&mut self, key: &str);
}

/// The environment of this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set_var(&mut self, key: &str, value: &str) {
        std::env::set_var(key, value);
    }

    fn remove_var(&mut self, key: &str) {
        std::env::remove_var(key);
    }
}

/// An environment kept in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryEnvironment {
    pub vars: HashMap<String, String>,
}

impl Environment for MemoryEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn set_var(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    fn remove_var(&mut self, key: &str) {
        self.vars.remove(key);
    }
}

/// Text level access to xsettings keys, values in GVariant text form.
#[async_trait(?Send)]
pub trait XSettingsStore {
    async fn read(&self, key: &'static str) -> Result<String, SystemError>;
    async fn write(&self, key: &'static str, value: &str) -> Result<(), SystemError>;
}

/// [XSettingsStore] backed by the `gsettings` tool.
#[derive(Debug, Clone)]
pub struct GsettingsCli {
    schema: String,
}

impl Default for GsettingsCli {
    fn default() -> Self {
        Self {
            schema: XSETTINGS_SCHEMA.to_string(),
        }
    }
}

impl GsettingsCli {
    async fn run(&self, args: &[&str]) -> Result<String, SystemError> {
        let output = Command::new("gsettings")
            .args(args)
            .output()
            .await
            .map_err(|err| SystemError::Spawn("gsettings", err))?;
        if !output.status.success() {
            return Err(SystemError::Exit(
                "gsettings",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait(?Send)]
impl XSettingsStore for GsettingsCli {
    async fn read(&self, key: &'static str) -> Result<String, SystemError> {
        self.run(&["get", &self.schema, key]).await
    }

    async fn write(&self, key: &'static str, value: &str) -> Result<(), SystemError> {
        self.run(&["set", &self.schema, key, value]).await.map(|_| ())
    }
}

/// Split `text` at top level `, ` separators, ignoring those nested in brackets or quotes.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {},
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '{' | '(' | '<') => depth += 1,
            (None, ']' | '}' | ')' | '>') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(text[start..index].trim());
                start = index + 1;
            },
            _ => {},
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

fn strip_type_prefix<'a>(text: &'a str, prefix: &str) -> &'a str {
    text.trim().strip_prefix(prefix).unwrap_or(text).trim()
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches(|c| c == '\'' || c == '"')
}

/// Parse an `as` value such as `['gail', 'atk-bridge']` or `@as []`.
pub fn parse_string_list(text: &str) -> Result<Vec<String>, SystemError> {
    let body = strip_type_prefix(text, "@as");
    let Some(inner) = body.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) else {
        return Err(SystemError::Parse(MODULES_KEY, text.to_string()));
    };
    Ok(split_top_level(inner).into_iter().map(|item| unquote(item).to_string()).collect())
}

/// Format an `as` value.
pub fn format_string_list(items: &[String]) -> String {
    if items.is_empty() {
        return "@as []".to_string();
    }
    let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// Parse an `a{sv}` value into key and raw value text, keeping entry order.
pub fn parse_overrides(text: &str) -> Result<Vec<(String, String)>, SystemError> {
    let body = strip_type_prefix(text, "@a{sv}");
    let Some(inner) = body.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) else {
        return Err(SystemError::Parse(OVERRIDES_KEY, text.to_string()));
    };
    split_top_level(inner)
        .into_iter()
        .map(|entry| {
            let (key, value) = entry
                .split_once(": ")
                .ok_or_else(|| SystemError::Parse(OVERRIDES_KEY, entry.to_string()))?;
            Ok((unquote(key).to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Format an `a{sv}` value from key and raw value text.
pub fn format_overrides(entries: &[(String, String)]) -> String {
    if entries.is_empty() {
        return "@a{sv} {}".to_string();
    }
    let pairs: Vec<String> = entries.iter().map(|(key, value)| format!("'{key}': {value}")).collect();
    format!("{{{}}}", pairs.join(", "))
}

/// Outcome of [SystemProperties::enable].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Running applications already export their menus.
    Active,
    /// The module was switched on now; applications pick it up after a restart.
    NeedsRestart,
}

/// Switches the GTK menu export on and off.
pub struct SystemProperties {
    env: Box<dyn Environment>,
    store: Box<dyn XSettingsStore>,
    enabled: bool,
}

impl std::fmt::Debug for SystemProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemProperties").field("enabled", &self.enabled).finish()
    }
}

impl SystemProperties {
    /// Use `env` and `store`.
    pub fn new(env: Box<dyn Environment>, store: Box<dyn XSettingsStore>) -> Self {
        Self {
            env,
            store,
            enabled: false,
        }
    }

    /// The process environment and `gsettings`.
    pub fn session() -> Self {
        Self::new(Box::new(ProcessEnvironment), Box::new(GsettingsCli::default()))
    }

    /// Whether [SystemProperties::enable] ran last.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `GTK_MODULES` already lists the module.
    pub fn module_loaded(&self) -> bool {
        self.env
            .var("GTK_MODULES")
            .map(|modules| modules.split(':').any(|module| module == GTK_MODULE))
            .unwrap_or(false)
    }

    /// Turn the integration on.
    pub async fn enable(&mut self) -> Result<Activation, SystemError> {
        let activation = if self.module_loaded() {
            Activation::Active
        } else {
            Activation::NeedsRestart
        };

        let modules = self.env.var("GTK_MODULES").unwrap_or_default();
        if !self.module_loaded() {
            let modules = if modules.is_empty() {
                GTK_MODULE.to_string()
            } else {
                format!("{modules}:{GTK_MODULE}")
            };
            self.env.set_var("GTK_MODULES", &modules);
        }
        self.env.set_var("UBUNTU_MENUPROXY", "1");

        let mut enabled_modules = parse_string_list(&self.store.read(MODULES_KEY).await?)?;
        if !enabled_modules.iter().any(|module| module == GTK_MODULE) {
            enabled_modules.push(GTK_MODULE.to_string());
            self.store
                .write(MODULES_KEY, &format_string_list(&enabled_modules))
                .await?;
        }

        let mut overrides = parse_overrides(&self.store.read(OVERRIDES_KEY).await?)?;
        for key in SHELL_OVERRIDES {
            match overrides.iter_mut().find(|(name, _)| name == key) {
                Some((_, value)) => *value = "<1>".to_string(),
                None => overrides.push((key.to_string(), "<1>".to_string())),
            }
        }
        self.store.write(OVERRIDES_KEY, &format_overrides(&overrides)).await?;

        self.enabled = true;
        info!("GTK menu export enabled ({activation:?})");
        Ok(activation)
    }

    /// Turn the integration off. The module list is left alone.
    pub async fn disable(&mut self) -> Result<(), SystemError> {
        self.env.remove_var("UBUNTU_MENUPROXY");

        let mut overrides = parse_overrides(&self.store.read(OVERRIDES_KEY).await?)?;
        let before = overrides.len();
        overrides.retain(|(name, _)| !SHELL_OVERRIDES.contains(&name.as_str()));
        if overrides.len() != before {
            self.store.write(OVERRIDES_KEY, &format_overrides(&overrides)).await?;
        } else {
            debug!("No shell overrides to reset");
        }

        self.enabled = false;
        info!("GTK menu export disabled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_lists() {
        assert_eq!(parse_string_list("@as []").unwrap(), Vec::<String>::new());
        assert_eq!(
            parse_string_list("['gail', 'atk-bridge']").unwrap(),
            vec!["gail".to_string(), "atk-bridge".to_string()]
        );
        assert!(parse_string_list("gail").is_err());
        assert_eq!(format_string_list(&[]), "@as []");
        assert_eq!(format_string_list(&["gail".to_string()]), "['gail']");
    }

    #[test]
    fn test_overrides_keep_nested_values() {
        let entries = parse_overrides("{'Gtk/IMModule': <'ibus'>, 'Xft/DPI': <(1, 2)>}").unwrap();
        assert_eq!(
            entries,
            vec![
                ("Gtk/IMModule".to_string(), "<'ibus'>".to_string()),
                ("Xft/DPI".to_string(), "<(1, 2)>".to_string())
            ]
        );
        assert_eq!(format_overrides(&entries), "{'Gtk/IMModule': <'ibus'>, 'Xft/DPI': <(1, 2)>}");
        assert_eq!(parse_overrides("@a{sv} {}").unwrap(), Vec::new());
        assert_eq!(format_overrides(&[]), "@a{sv} {}");
    }
}
