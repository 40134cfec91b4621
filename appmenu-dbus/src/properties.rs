//! dbusmenu item properties.
//!
//! Items carry a sparse `a{sv}` map where missing keys mean the default value. A
//! [DecodedItem] keeps that map in typed form so updates and removals can be applied key by
//! key before the result is turned into model [ItemProperties].

use std::collections::HashMap;

use appmenu_core::model::{IconRef, ItemProperties, MenuKind, ToggleKind};
use log::debug;
use zbus::zvariant::{OwnedValue, Value};

/// Keys understood by [DecodedItem::apply].
pub const KNOWN_PROPERTIES: [&str; 10] = [
    "type",
    "label",
    "enabled",
    "visible",
    "icon-name",
    "icon-data",
    "shortcut",
    "toggle-type",
    "toggle-state",
    "children-display",
];

/// Strip nested variant wrappers.
pub(crate) fn peel<'a, 'v>(value: &'a Value<'v>) -> &'a Value<'v> {
    match value {
        Value::Value(inner) => peel(inner),
        other => other,
    }
}

pub(crate) fn as_str<'a>(value: &'a Value<'_>) -> Option<&'a str> {
    match peel(value) {
        Value::Str(text) => Some(text.as_str()),
        _ => None,
    }
}

pub(crate) fn as_bool(value: &Value<'_>) -> Option<bool> {
    match peel(value) {
        Value::Bool(flag) => Some(*flag),
        _ => None,
    }
}

pub(crate) fn as_i32(value: &Value<'_>) -> Option<i32> {
    match peel(value) {
        Value::I32(number) => Some(*number),
        Value::U32(number) => i32::try_from(*number).ok(),
        _ => None,
    }
}

fn as_bytes(value: &Value<'_>) -> Option<Vec<u8>> {
    let Value::Array(array) = peel(value) else {
        return None;
    };
    array
        .iter()
        .map(|byte| match peel(byte) {
            Value::U8(byte) => Some(*byte),
            _ => None,
        })
        .collect()
}

fn as_shortcut(value: &Value<'_>) -> Option<Vec<Vec<String>>> {
    let Value::Array(combinations) = peel(value) else {
        return None;
    };
    combinations
        .iter()
        .map(|combination| match peel(combination) {
            Value::Array(keys) => keys.iter().map(|key| as_str(key).map(str::to_string)).collect(),
            _ => None,
        })
        .collect()
}

/// Remove GTK style mnemonic underscores. A doubled underscore stands for a literal one.
pub fn strip_mnemonics(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut chars = label.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            if chars.peek() == Some(&'_') {
                chars.next();
                out.push('_');
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn key_name(key: &str) -> String {
    match key {
        "Control" | "Primary" | "Ctrl" => "Ctrl".to_string(),
        "Mod1" => "Alt".to_string(),
        other if other.chars().count() == 1 => other.to_uppercase(),
        other => other.to_string(),
    }
}

/// Render the first key combination of a dbusmenu shortcut, e.g. `[["Control", "s"]]` as
/// `Ctrl+S`.
pub fn format_shortcut(combinations: &[Vec<String>]) -> String {
    combinations
        .first()
        .map(|keys| keys.iter().map(|key| key_name(key)).collect::<Vec<_>>().join("+"))
        .unwrap_or_default()
}

/// Render a GTK accelerator string such as `<Control><Shift>n` as `Ctrl+Shift+N`.
pub fn format_gtk_accel(accel: &str) -> String {
    let mut keys = Vec::new();
    let mut rest = accel.trim();
    while let Some(stripped) = rest.strip_prefix('<') {
        let Some(end) = stripped.find('>') else {
            break;
        };
        keys.push(key_name(&stripped[..end]));
        rest = &stripped[end + 1..];
    }
    if !rest.is_empty() {
        keys.push(key_name(rest));
    }
    keys.join("+")
}

/// Typed view of one item's property map.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedItem {
    /// Label with mnemonics stripped.
    pub label: String,
    pub enabled: bool,
    pub visible: bool,
    /// `type` is `separator`.
    pub separator: bool,
    /// `children-display` is `submenu`.
    pub submenu: bool,
    pub toggle_kind: ToggleKind,
    pub toggle_state: bool,
    pub icon_name: Option<String>,
    pub icon_data: Option<Vec<u8>>,
    /// Accelerator in `Ctrl+S` form.
    pub accelerator: String,
}

impl Default for DecodedItem {
    fn default() -> Self {
        Self {
            label: String::new(),
            enabled: true,
            visible: true,
            separator: false,
            submenu: false,
            toggle_kind: ToggleKind::None,
            toggle_state: false,
            icon_name: None,
            icon_data: None,
            accelerator: String::new(),
        }
    }
}

impl DecodedItem {
    /// An item with a label, mostly useful in tests.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// A submenu item with a label.
    pub fn submenu(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            submenu: true,
            ..Self::default()
        }
    }

    /// A separator.
    pub fn separator() -> Self {
        Self {
            separator: true,
            ..Self::default()
        }
    }

    /// Decode a full property map.
    pub fn decode(properties: &HashMap<String, OwnedValue>) -> Self {
        let mut item = Self::default();
        for (key, value) in properties {
            item.apply(key, Some(&**value));
        }
        item
    }

    /// Set one property, or reset it to its default when `value` is `None`.
    ///
    /// Values of the wrong type are treated like removals. Returns false for unknown keys.
    pub fn apply(&mut self, key: &str, value: Option<&Value<'_>>) -> bool {
        let defaults = Self::default();
        match key {
            "type" => self.separator = value.and_then(as_str) == Some("separator"),
            "label" => {
                self.label = value.and_then(as_str).map(strip_mnemonics).unwrap_or_default();
            },
            "enabled" => self.enabled = value.and_then(as_bool).unwrap_or(defaults.enabled),
            "visible" => self.visible = value.and_then(as_bool).unwrap_or(defaults.visible),
            "icon-name" => {
                self.icon_name = value.and_then(as_str).filter(|name| !name.is_empty()).map(str::to_string);
            },
            "icon-data" => self.icon_data = value.and_then(as_bytes).filter(|data| !data.is_empty()),
            "shortcut" => {
                self.accelerator = value
                    .and_then(as_shortcut)
                    .map(|combinations| format_shortcut(&combinations))
                    .unwrap_or_default();
            },
            "toggle-type" => {
                self.toggle_kind = match value.and_then(as_str) {
                    Some("checkmark") => ToggleKind::Checkmark,
                    Some("radio") => ToggleKind::Radio,
                    _ => ToggleKind::None,
                };
            },
            "toggle-state" => self.toggle_state = value.and_then(as_i32) == Some(1),
            "children-display" => self.submenu = value.and_then(as_str) == Some("submenu"),
            other => {
                debug!("Ignoring dbusmenu property {other}");
                return false;
            },
        }
        true
    }

    /// Model properties of this item. The root always stays a plain [MenuKind::Root].
    pub fn to_properties(&self, is_root: bool, has_children: bool) -> ItemProperties {
        if is_root {
            return ItemProperties::new(MenuKind::Root);
        }
        let kind = if self.separator {
            MenuKind::Separator
        } else if self.submenu || has_children {
            MenuKind::SubMenu
        } else {
            MenuKind::Item
        };
        let icon = match (&self.icon_name, &self.icon_data) {
            (Some(name), _) => Some(IconRef::Name(name.clone())),
            (None, Some(data)) => Some(IconRef::Data(data.clone())),
            (None, None) => None,
        };
        ItemProperties {
            kind,
            label: self.label.clone(),
            icon,
            enabled: self.enabled,
            visible: self.visible,
            toggle_kind: self.toggle_kind,
            toggle_state: self.toggle_state,
            accelerator: self.accelerator.clone(),
            action: String::new(),
        }
    }
}
