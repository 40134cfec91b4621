//! Window property probe for applications that never talk to the registrar.
//!
//! GTK applications publish their menu model location as X11 window properties. They are read
//! with `xprop` so no X connection has to be held here.

use std::process::Stdio;

use appmenu_core::error::ProbeError;
use appmenu_core::registry::WindowId;
use appmenu_core::resolver::MenuLocator;
use log::debug;
use tokio::process::Command;

/// Properties requested from `xprop`, in locator field order.
pub const PROPERTIES: [&str; 5] = [
    "_GTK_UNIQUE_BUS_NAME",
    "_GTK_MENUBAR_OBJECT_PATH",
    "_GTK_APP_MENU_OBJECT_PATH",
    "_GTK_WINDOW_OBJECT_PATH",
    "_GTK_APPLICATION_OBJECT_PATH",
];

/// Run `xprop` for `window` and parse the result.
///
/// The child is killed if the returned future is dropped, which is how cancellation works.
pub async fn probe_window(window: WindowId) -> Result<MenuLocator, ProbeError> {
    let output = Command::new("xprop")
        .arg("-id")
        .arg(window.0.to_string())
        .arg("-notype")
        .args(PROPERTIES)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| ProbeError::Spawn(err.to_string()))?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        debug!("xprop for {window} exited with {code}");
        return Err(ProbeError::Exit(code));
    }
    parse_xprop(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `xprop -notype` output. The bus name and menu bar path are required.
pub fn parse_xprop(output: &str) -> Result<MenuLocator, ProbeError> {
    let mut locator = MenuLocator {
        is_gtk: true,
        ..MenuLocator::default()
    };
    for line in output.lines() {
        // Missing properties print as `NAME:  not found.`
        let Some((key, value)) = line.split_once(" = ") else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            continue;
        }
        let field = match key.trim() {
            "_GTK_UNIQUE_BUS_NAME" => &mut locator.sender,
            "_GTK_MENUBAR_OBJECT_PATH" => &mut locator.menubar_path,
            "_GTK_APP_MENU_OBJECT_PATH" => &mut locator.appmenu_path,
            "_GTK_WINDOW_OBJECT_PATH" => &mut locator.window_path,
            "_GTK_APPLICATION_OBJECT_PATH" => &mut locator.application_path,
            _ => continue,
        };
        *field = Some(value.to_string());
    }

    if locator.is_resolvable() {
        Ok(locator)
    } else {
        Err(ProbeError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_output() {
        let output = r#"_GTK_UNIQUE_BUS_NAME = ":1.93"
_GTK_MENUBAR_OBJECT_PATH = "/org/gnome/gedit/menus/menubar"
_GTK_APP_MENU_OBJECT_PATH:  not found.
_GTK_WINDOW_OBJECT_PATH = "/org/gnome/gedit/window/1"
_GTK_APPLICATION_OBJECT_PATH = "/org/gnome/gedit"
"#;
        let locator = parse_xprop(output).unwrap();
        assert!(locator.is_gtk);
        assert_eq!(locator.sender.as_deref(), Some(":1.93"));
        assert_eq!(locator.menubar_path.as_deref(), Some("/org/gnome/gedit/menus/menubar"));
        assert_eq!(locator.appmenu_path, None);
        assert_eq!(locator.window_path.as_deref(), Some("/org/gnome/gedit/window/1"));
        assert_eq!(locator.application_path.as_deref(), Some("/org/gnome/gedit"));
    }

    #[test]
    fn test_missing_menubar_is_a_parse_error() {
        let output = "_GTK_UNIQUE_BUS_NAME = \":1.93\"\n_GTK_MENUBAR_OBJECT_PATH:  not found.\n";
        assert_eq!(parse_xprop(output), Err(ProbeError::Parse));
        assert_eq!(parse_xprop(""), Err(ProbeError::Parse));
    }
}
