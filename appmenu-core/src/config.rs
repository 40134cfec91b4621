//! Applet options.

use std::time::Duration;

use serde::Deserialize;

use crate::manager::MenuSettings;
use crate::popup::Effect;
use crate::widget::WidgetSettings;

/// Options recognised by the applet and its menus.
///
/// Field names follow the applet's settings keys, so a `[applet]` table with
/// `display-in-panel = true` deserializes directly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppletConfig {
    /// Show the focused application's icon in the panel.
    pub show_app_icon: bool,
    /// Draw that icon in grey.
    pub desaturate_app_icon: bool,
    /// Show the focused application's name in the panel.
    pub show_app_name: bool,
    /// Longest application name shown, in characters.
    pub max_app_name_size: usize,
    /// Open a docked main menu as soon as it is available.
    pub automatic_active_mainmenu: bool,
    /// Close submenus when the pointer leaves their launcher.
    pub close_active_submenu: bool,
    /// Draw popup arrows.
    pub show_boxpointer: bool,
    /// Align the main menu to the corner of the panel button.
    pub align_menu_launcher: bool,
    /// Lay the top-level items out in the panel instead of a floating main menu.
    pub display_in_panel: bool,
    /// Show item icons.
    pub show_item_icon: bool,
    /// Draw item icons in grey.
    pub desaturate_item_icon: bool,
    /// Open submenus when their launcher is hovered.
    pub open_on_hover: bool,
    /// Transition played by floating popups.
    pub effect: Effect,
    /// Transition length in seconds.
    pub effect_time: f64,
    /// Show submenus as floating popups.
    pub floating_submenu: bool,
}

impl Default for AppletConfig {
    fn default() -> Self {
        Self {
            show_app_icon: true,
            desaturate_app_icon: false,
            show_app_name: true,
            max_app_name_size: 10,
            automatic_active_mainmenu: true,
            close_active_submenu: false,
            show_boxpointer: true,
            align_menu_launcher: false,
            display_in_panel: false,
            show_item_icon: true,
            desaturate_item_icon: false,
            open_on_hover: false,
            effect: Effect::None,
            effect_time: 0.15,
            floating_submenu: true,
        }
    }
}

impl AppletConfig {
    /// Transition length, with negative or broken values read as zero.
    pub fn effect_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.effect_time).unwrap_or(Duration::ZERO)
    }

    /// Settings for item widgets.
    pub fn widget_settings(&self) -> WidgetSettings {
        WidgetSettings {
            show_item_icon: self.show_item_icon,
            desaturate_item_icon: self.desaturate_item_icon,
        }
    }

    /// Settings for submenu popups.
    pub fn menu_settings(&self) -> MenuSettings {
        MenuSettings {
            floating: self.floating_submenu,
            show_box_pointer: self.show_boxpointer,
            fix_to_corner: false,
            effect: self.effect,
            effect_time: self.effect_duration(),
        }
    }

    /// Whether the main menu floats.
    pub fn floating_root(&self) -> bool {
        !self.display_in_panel
    }

    /// Cut an application name down to [AppletConfig::max_app_name_size] characters.
    pub fn truncate_app_name(&self, name: &str) -> String {
        match name.char_indices().nth(self.max_app_name_size) {
            Some((end, _)) => name[..end].to_string(),
            None => name.to_string(),
        }
    }
}
