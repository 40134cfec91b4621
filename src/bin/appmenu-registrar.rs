//! Headless registrar: owns `com.canonical.AppMenu.Registrar` and keeps every announced menu
//! mirrored, without drawing anything.

use std::time::Duration;

use anyhow::Result;
use appmenu::prelude::*;
use smol::Timer;

const FRAME: Duration = Duration::from_millis(16);
const IDLE: Duration = Duration::from_millis(100);

/// No window manager to ask: only registrar announcements create entries.
struct HeadlessTracker;

impl WindowTracker for HeadlessTracker {
    fn windows(&self) -> Vec<WindowInfo> {
        Vec::new()
    }

    fn focused(&self) -> Option<WindowId> {
        None
    }

    fn icon_for(&self, _app: &AppInfo, _size: u32) -> Option<AppIcon> {
        None
    }
}

fn main() -> Result<()> {
    smol::block_on(run())
}

async fn run() -> Result<()> {
    let settings = SettingsRegistry::new().await?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level().unwrap_or("info")),
    )
    .init();

    let options = BridgeOptions { serve_registrar: true };
    let mut service = AppmenuService::start(&settings, Box::new(HeadlessTracker), options)?;
    if settings.integrate_system() {
        if let Err(err) = service.integrate_system().await {
            log::warn!("GTK menu export unavailable: {err:#}");
        }
    }
    if let Some(notice) = service.take_notice() {
        eprintln!("{notice}");
    }

    loop {
        let animating = service.pump();
        Timer::after(if animating { FRAME } else { IDLE }).await;
    }
}
