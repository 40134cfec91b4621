//! Rendered counterparts of menu nodes.
//!
//! A [MenuWidget] carries only the capabilities its kind supports. Callers do not probe for
//! methods; they look at the capability slots, which are `None` when the kind has no such part.

use std::fmt;

use crate::model::{IconRef, ItemProperties, MenuKind, NodeId, PropertyName, ToggleKind};
use crate::popup::MenuId;

/// Id of a widget inside a [Binder](crate::binder::Binder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Decoration drawn in front of a toggle item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ornament {
    /// Nothing.
    #[default]
    None,
    /// A check mark.
    Check,
    /// A radio dot.
    Dot,
}

impl Ornament {
    /// Ornament for a toggle kind and state. Nothing is drawn while the toggle is off.
    pub fn for_toggle(kind: ToggleKind, state: bool) -> Self {
        match (kind, state) {
            (ToggleKind::Checkmark, true) => Ornament::Check,
            (ToggleKind::Radio, true) => Ornament::Dot,
            _ => Ornament::None,
        }
    }
}

/// Presentation settings shared by all widgets of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetSettings {
    /// Whether item icons are drawn.
    pub show_item_icon: bool,
    /// Whether item icons are drawn in grayscale.
    pub desaturate_item_icon: bool,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            show_item_icon: true,
            desaturate_item_icon: false,
        }
    }
}

/// Ornament and accelerator of an activatable item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoration {
    /// Toggle kind as last synced.
    pub toggle: ToggleKind,
    /// Current ornament.
    pub ornament: Ornament,
    /// Accelerator text.
    pub accel: String,
}

/// Icon slot of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconSlot {
    /// Icon to draw.
    pub icon: Option<IconRef>,
    /// Whether the slot is drawn.
    pub shown: bool,
    /// Whether the icon is drawn in grayscale.
    pub desaturated: bool,
}

/// Ordered child widgets of a container widget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    /// Child widgets in render order.
    pub children: Vec<WidgetId>,
    /// Whether the children have been built.
    pub populated: bool,
}

/// A rendered menu node.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuWidget {
    id: WidgetId,
    node: NodeId,
    kind: MenuKind,
    parent: Option<WidgetId>,
    visible: bool,
    sensitive: bool,
    active: bool,
    /// Label text, for kinds that draw one.
    pub label: Option<String>,
    /// Ornament and accelerator, for activatable items.
    pub decoration: Option<Decoration>,
    /// Icon, for items and submenu items.
    pub icon: Option<IconSlot>,
    /// Children, for roots, submenus and sections.
    pub container: Option<Container>,
    /// Popup opened by this widget, for roots and submenus.
    pub menu: Option<MenuId>,
}

impl MenuWidget {
    /// Build a widget for a node, with the capability slots its kind supports.
    pub fn new(
        id: WidgetId,
        node: NodeId,
        properties: &ItemProperties,
        parent: Option<WidgetId>,
        settings: &WidgetSettings,
    ) -> Self {
        let kind = properties.kind;
        let labeled = matches!(kind, MenuKind::Item | MenuKind::SubMenu);
        let mut widget = Self {
            id,
            node,
            kind,
            parent,
            visible: properties.visible,
            sensitive: properties.enabled,
            active: false,
            label: labeled.then(String::new),
            decoration: (kind == MenuKind::Item).then(Decoration::default),
            icon: labeled.then(IconSlot::default),
            container: kind.holds_children().then(Container::default),
            menu: None,
        };
        widget.sync_all(properties, settings);
        widget
    }

    /// Widget id.
    pub fn id(&self) -> WidgetId {
        self.id
    }

    /// Bound node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Kind the widget was built for.
    pub fn kind(&self) -> MenuKind {
        self.kind
    }

    /// Parent widget.
    pub fn parent(&self) -> Option<WidgetId> {
        self.parent
    }

    /// Whether the widget is shown.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the widget reacts to input.
    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Whether the widget is highlighted.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether keyboard navigation may stop on this widget.
    pub fn is_navigable(&self) -> bool {
        self.visible && self.sensitive && matches!(self.kind, MenuKind::Item | MenuKind::SubMenu)
    }

    /// Child widgets, empty for non-containers.
    pub fn children(&self) -> &[WidgetId] {
        self.container
            .as_ref()
            .map(|container| container.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the children have been built. Non-containers count as populated.
    pub fn is_populated(&self) -> bool {
        self.container.as_ref().map(|container| container.populated).unwrap_or(true)
    }

    /// Set the label. Returns false when unchanged or unsupported.
    pub fn set_label(&mut self, text: &str) -> bool {
        match &mut self.label {
            Some(label) if label != text => {
                *label = text.to_string();
                true
            },
            _ => false,
        }
    }

    /// Set the ornament from a toggle kind and state.
    pub fn set_ornament(&mut self, kind: ToggleKind, state: bool) -> bool {
        let Some(decoration) = &mut self.decoration else {
            return false;
        };
        let ornament = Ornament::for_toggle(kind, state);
        if decoration.toggle == kind && decoration.ornament == ornament {
            return false;
        }
        decoration.toggle = kind;
        decoration.ornament = ornament;
        true
    }

    /// Set the accelerator text.
    pub fn set_accel(&mut self, accel: &str) -> bool {
        match &mut self.decoration {
            Some(decoration) if decoration.accel != accel => {
                decoration.accel = accel.to_string();
                true
            },
            _ => false,
        }
    }

    /// Set the icon.
    pub fn set_icon(&mut self, icon: Option<&IconRef>, settings: &WidgetSettings) -> bool {
        let Some(slot) = &mut self.icon else {
            return false;
        };
        let shown = settings.show_item_icon && icon.is_some();
        let desaturated = settings.desaturate_item_icon;
        if slot.icon.as_ref() == icon && slot.shown == shown && slot.desaturated == desaturated {
            return false;
        }
        slot.icon = icon.cloned();
        slot.shown = shown;
        slot.desaturated = desaturated;
        true
    }

    /// Show or hide the widget.
    pub fn set_visible(&mut self, visible: bool) -> bool {
        let changed = self.visible != visible;
        self.visible = visible;
        changed
    }

    /// Enable or disable the widget.
    pub fn set_sensitive(&mut self, sensitive: bool) -> bool {
        let changed = self.sensitive != sensitive;
        self.sensitive = sensitive;
        changed
    }

    /// Highlight the widget.
    pub fn set_active(&mut self, active: bool) -> bool {
        let changed = self.active != active;
        self.active = active;
        changed
    }

    /// Pull every property from the model.
    pub fn sync_all(&mut self, properties: &ItemProperties, settings: &WidgetSettings) {
        self.set_label(&properties.label);
        self.set_ornament(properties.toggle_kind, properties.toggle_state);
        self.set_accel(&properties.accelerator);
        self.set_icon(properties.icon.as_ref(), settings);
        self.set_visible(properties.visible);
        self.set_sensitive(properties.enabled);
    }

    /// Pull one property from the model. Returns whether the widget changed.
    pub fn sync(&mut self, properties: &ItemProperties, name: PropertyName, settings: &WidgetSettings) -> bool {
        match name {
            PropertyName::Label => self.set_label(&properties.label),
            PropertyName::Icon => self.set_icon(properties.icon.as_ref(), settings),
            PropertyName::Enabled => self.set_sensitive(properties.enabled),
            PropertyName::Visible => self.set_visible(properties.visible),
            PropertyName::Toggle => self.set_ornament(properties.toggle_kind, properties.toggle_state),
            PropertyName::Accelerator => self.set_accel(&properties.accelerator),
            PropertyName::Action => false,
        }
    }

    /// Re-apply icon settings to the current icon.
    pub fn apply_settings(&mut self, settings: &WidgetSettings) -> bool {
        let icon = self.icon.as_ref().and_then(|slot| slot.icon.clone());
        self.set_icon(icon.as_ref(), settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(kind: MenuKind) -> MenuWidget {
        let props = ItemProperties::labeled(kind, "Open");
        MenuWidget::new(WidgetId(1), NodeId(1), &props, None, &WidgetSettings::default())
    }

    #[test]
    fn test_capabilities_follow_kind() {
        let item = widget(MenuKind::Item);
        assert_eq!(item.label.as_deref(), Some("Open"));
        assert!(item.decoration.is_some());
        assert!(item.container.is_none());

        let submenu = widget(MenuKind::SubMenu);
        assert!(submenu.decoration.is_none());
        assert!(submenu.container.is_some());

        let mut separator = widget(MenuKind::Separator);
        assert!(separator.label.is_none());
        assert!(!separator.set_label("ignored"));
        assert!(!separator.set_accel("Ctrl+Q"));
    }

    #[test]
    fn test_ornament_tracks_toggle_state() {
        let mut item = widget(MenuKind::Item);
        assert!(item.set_ornament(ToggleKind::Radio, true));
        assert_eq!(item.decoration.as_ref().map(|d| d.ornament), Some(Ornament::Dot));
        assert!(item.set_ornament(ToggleKind::Radio, false));
        assert_eq!(item.decoration.as_ref().map(|d| d.ornament), Some(Ornament::None));
        assert!(!item.set_ornament(ToggleKind::Radio, false));
    }

    #[test]
    fn test_icon_hidden_by_settings() {
        let mut item = widget(MenuKind::Item);
        let icon = IconRef::Name("document-open".into());
        let hidden = WidgetSettings {
            show_item_icon: false,
            desaturate_item_icon: true,
        };

        assert!(item.set_icon(Some(&icon), &WidgetSettings::default()));
        assert!(item.icon.as_ref().map(|slot| slot.shown).unwrap_or(false));
        assert!(item.apply_settings(&hidden));
        let slot = item.icon.as_ref().cloned().unwrap_or_default();
        assert!(!slot.shown);
        assert!(slot.desaturated);
    }
}
