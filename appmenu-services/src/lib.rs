// SPDX-License-Identifier: LGPL-3.0-only
//! Settings and session integration for appmenu => See `appmenu` crate.

pub mod settings;
pub mod system;

pub use settings::SettingsRegistry;
pub use system::{Activation, SystemError, SystemProperties};
