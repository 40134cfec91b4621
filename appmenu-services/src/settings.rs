// SPDX-License-Identifier: LGPL-3.0-only
use anyhow::Result;
use appmenu_core::config::AppletConfig;
use appmenu_core::popup::Effect;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;
use smol::fs;

/// Directory name used under the XDG base directories.
pub const PREFIX: &str = "appmenu";

/// The file read from every XDG location.
pub const CONFIG_FILE: &str = "config.toml";

/// The main configuration structure of the applet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralSettings,
    /// Applet and menu options
    #[serde(default)]
    pub applet: AppletSettings,
    /// Any other sections are captured here
    #[serde(flatten)]
    pub other: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralSettings {
    pub debug: Option<bool>,
    pub log_level: Option<String>,
    /// Export GTK menus over D-Bus by enabling the unity GTK module.
    pub integrate_system: Option<bool>,
}

/// `[applet]` as written in a file. Unset keys leave lower precedence files in charge.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppletSettings {
    pub show_app_icon: Option<bool>,
    pub desaturate_app_icon: Option<bool>,
    pub show_app_name: Option<bool>,
    pub max_app_name_size: Option<usize>,
    pub automatic_active_mainmenu: Option<bool>,
    pub close_active_submenu: Option<bool>,
    pub show_boxpointer: Option<bool>,
    pub align_menu_launcher: Option<bool>,
    pub display_in_panel: Option<bool>,
    pub show_item_icon: Option<bool>,
    pub desaturate_item_icon: Option<bool>,
    pub open_on_hover: Option<bool>,
    pub effect: Option<Effect>,
    pub effect_time: Option<f64>,
    pub floating_submenu: Option<bool>,
}

macro_rules! merge_fields {
    ($target:expr, $source:expr, $($field:ident),+ $(,)?) => {
        $(
            if $source.$field.is_some() {
                $target.$field = $source.$field;
            }
        )+
    };
}

impl AppletSettings {
    fn merge(&mut self, other: AppletSettings) {
        merge_fields!(
            self,
            other,
            show_app_icon,
            desaturate_app_icon,
            show_app_name,
            max_app_name_size,
            automatic_active_mainmenu,
            close_active_submenu,
            show_boxpointer,
            align_menu_launcher,
            display_in_panel,
            show_item_icon,
            desaturate_item_icon,
            open_on_hover,
            effect,
            effect_time,
            floating_submenu,
        );
    }

    /// Apply the keys that are set on top of `base`.
    pub fn apply_to(&self, base: &mut AppletConfig) {
        macro_rules! apply {
            ($($field:ident),+ $(,)?) => {
                $(
                    if let Some(value) = self.$field {
                        base.$field = value;
                    }
                )+
            };
        }
        apply!(
            show_app_icon,
            desaturate_app_icon,
            show_app_name,
            max_app_name_size,
            automatic_active_mainmenu,
            close_active_submenu,
            show_boxpointer,
            align_menu_launcher,
            display_in_panel,
            show_item_icon,
            desaturate_item_icon,
            open_on_hover,
            effect,
            effect_time,
            floating_submenu,
        );
    }
}

/// Registry for managing applet settings.
#[derive(Debug, Clone)]
pub struct SettingsRegistry {
    config: Config,
}

impl Default for SettingsRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SettingsRegistry {
    /// Create a new SettingsRegistry and load configuration from standard locations.
    pub async fn new() -> Result<Self> {
        let mut registry = Self::with_defaults();
        registry.load().await?;
        Ok(registry)
    }

    /// A registry holding only built-in defaults, without touching the filesystem.
    pub fn with_defaults() -> Self {
        Self {
            config: Config {
                general: GeneralSettings {
                    debug: Some(false),
                    log_level: None,
                    integrate_system: Some(true),
                },
                applet: AppletSettings::default(),
                other: HashMap::new(),
            },
        }
    }

    /// Load configuration from standard locations in precedence order.
    ///
    /// Order (later overrides earlier):
    /// 1. System Data: /usr/share/appmenu/config.toml (and XDG_DATA_DIRS)
    /// 2. System Config: /etc/xdg/appmenu/config.toml (and XDG_CONFIG_DIRS)
    /// 3. User Config: ~/.config/appmenu/config.toml (XDG_CONFIG_HOME)
    pub async fn load(&mut self) -> Result<()> {
        let xdg_dirs = BaseDirectories::with_prefix(PREFIX)?;
        for path in Self::candidate_paths(&xdg_dirs, CONFIG_FILE) {
            self.load_file(&path).await;
        }
        Ok(())
    }

    /// Every existing file named `filename`, lowest precedence first.
    fn candidate_paths(xdg_dirs: &BaseDirectories, filename: &str) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = xdg_dirs.find_data_files(filename).collect();
        paths.reverse();

        let mut config_paths: Vec<PathBuf> = xdg_dirs.find_config_files(filename).collect();
        config_paths.reverse();
        // find_config_files includes the user file, which must come last.
        let user_config_path = xdg_dirs.get_config_file(filename);
        config_paths.retain(|path| *path != user_config_path);
        paths.extend(config_paths);

        if user_config_path.exists() {
            paths.push(user_config_path);
        }
        paths
    }

    async fn load_file(&mut self, path: &Path) {
        log::info!("Loading config from: {:?}", path);
        match fs::read_to_string(path).await {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(loaded_config) => {
                    self.merge(loaded_config);
                },
                Err(e) => {
                    log::error!("Failed to parse config file {:?}: {}", path, e);
                },
            },
            Err(e) => {
                log::warn!("Failed to read config file {:?}: {}", path, e);
            },
        }
    }

    /// Merge a loaded config into the current config.
    fn merge(&mut self, other: Config) {
        merge_fields!(self.config.general, other.general, debug, log_level, integrate_system);
        self.config.applet.merge(other.applet);
        self.config.other.extend(other.other);
    }

    /// Get the current configuration.
    pub fn get(&self) -> &Config {
        &self.config
    }

    /// The merged `[applet]` table folded over the built-in defaults.
    pub fn applet_config(&self) -> AppletConfig {
        let mut config = AppletConfig::default();
        self.config.applet.apply_to(&mut config);
        config
    }

    /// Configured log filter, if any.
    pub fn log_level(&self) -> Option<&str> {
        self.config.general.log_level.as_deref()
    }

    /// Whether the GTK menu export should be switched on at startup.
    pub fn integrate_system(&self) -> bool {
        self.config.general.integrate_system.unwrap_or(true)
    }

    /// Load configuration from multiple custom paths asynchronously.
    pub async fn load_from_paths_async(&mut self, paths: Vec<PathBuf>) -> Vec<anyhow::Result<()>> {
        let mut results = Vec::new();

        for path in paths {
            let result = async {
                let content = fs::read_to_string(&path)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;

                let loaded_config: Config = toml::from_str(&content)
                    .map_err(|e| anyhow::anyhow!("Failed to parse config file {:?}: {}", path, e))?;

                self.merge(loaded_config);
                Ok(())
            }
            .await;

            results.push(result);
        }

        results
    }

    /// Forget everything merged so far and read the standard locations again.
    ///
    /// On error the current settings are kept.
    pub async fn reload_async(&mut self) -> Result<()> {
        let mut fresh = Self::with_defaults();
        fresh.load().await?;
        *self = fresh;
        Ok(())
    }
}
