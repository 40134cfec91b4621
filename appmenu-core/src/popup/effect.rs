//! Open and close transitions of floating popups.

use std::f32::consts::FRAC_PI_2;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Visual transition played when a popup opens or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Effect {
    /// Appear and disappear at once.
    #[default]
    None,
    /// Fade.
    Dispel,
    /// Grow and shrink horizontally.
    HideHorizontal,
    /// Grow and shrink vertically.
    HideVertical,
    /// Grow and shrink on both axes.
    Scale,
    /// Tilt around the horizontal axis.
    Windows,
}

impl Effect {
    /// All effects, in settings order.
    pub const ALL: [Effect; 6] = [
        Effect::None,
        Effect::Dispel,
        Effect::HideHorizontal,
        Effect::HideVertical,
        Effect::Scale,
        Effect::Windows,
    ];

    /// Settings name of the effect.
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Dispel => "dispel",
            Effect::HideHorizontal => "hideHorizontal",
            Effect::HideVertical => "hideVertical",
            Effect::Scale => "scale",
            Effect::Windows => "windows",
        }
    }

    /// Whether the effect takes time to play.
    pub fn is_animated(self) -> bool {
        self != Effect::None
    }

    /// Easing curve of the effect.
    pub fn easing(self) -> Easing {
        match self {
            Effect::None | Effect::Windows => Easing::Linear,
            Effect::Dispel => Easing::EaseInSine,
            Effect::HideHorizontal | Effect::HideVertical | Effect::Scale => Easing::EaseOutQuad,
        }
    }

    /// Visual state at `progress` (0 to 1) of an opening or closing transition.
    pub fn frame(self, progress: f32, opening: bool) -> EffectFrame {
        let eased = self.easing().apply(progress.clamp(0.0, 1.0));
        // Share of the fully shown state.
        let shown = if opening { eased } else { 1.0 - eased };

        let mut frame = EffectFrame::IDENTITY;
        match self {
            Effect::None => {},
            Effect::Dispel => frame.opacity = shown,
            Effect::HideHorizontal => frame.scale_x = shown,
            Effect::HideVertical => frame.scale_y = shown,
            Effect::Scale => {
                frame.scale_x = shown;
                frame.scale_y = shown;
            },
            Effect::Windows => frame.rotation_x = WINDOWS_TILT * (1.0 - shown),
        }
        frame
    }
}

const WINDOWS_TILT: f32 = -100.0;

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Effect::ALL
            .into_iter()
            .find(|effect| effect.as_str() == s)
            .ok_or_else(|| format!("unknown effect '{s}'"))
    }
}

/// Easing curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    /// Constant speed.
    Linear,
    /// Slow start.
    EaseInSine,
    /// Slow end.
    EaseOutQuad,
}

impl Easing {
    /// Map linear progress onto the curve.
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::EaseInSine => 1.0 - (t * FRAC_PI_2).cos(),
            Easing::EaseOutQuad => t * (2.0 - t),
        }
    }
}

/// Transform applied to a popup while it animates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectFrame {
    /// Opacity from 0 to 1.
    pub opacity: f32,
    /// Horizontal scale.
    pub scale_x: f32,
    /// Vertical scale.
    pub scale_y: f32,
    /// Rotation around the X axis, in degrees.
    pub rotation_x: f32,
}

impl EffectFrame {
    /// Fully shown.
    pub const IDENTITY: EffectFrame = EffectFrame {
        opacity: 1.0,
        scale_x: 1.0,
        scale_y: 1.0,
        rotation_x: 0.0,
    };

    /// Fully hidden.
    pub const HIDDEN: EffectFrame = EffectFrame {
        opacity: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        rotation_x: 0.0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_to(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_names_round_trip_through_settings() {
        assert_eq!("hideVertical".parse::<Effect>(), Ok(Effect::HideVertical));
        assert!("fancy".parse::<Effect>().is_err());
    }

    #[test]
    fn test_dispel_fades() {
        assert!(close_to(Effect::Dispel.frame(0.0, true).opacity, 0.0));
        assert!(close_to(Effect::Dispel.frame(1.0, true).opacity, 1.0));
        assert!(close_to(Effect::Dispel.frame(1.0, false).opacity, 0.0));
    }

    #[test]
    fn test_windows_tilts_linearly() {
        assert!(close_to(Effect::Windows.frame(0.0, true).rotation_x, -100.0));
        assert!(close_to(Effect::Windows.frame(0.5, true).rotation_x, -50.0));
        assert!(close_to(Effect::Windows.frame(0.5, false).rotation_x, -50.0));
    }

    #[test]
    fn test_ease_out_quad_front_loads() {
        let frame = Effect::Scale.frame(0.5, true);
        assert!(close_to(frame.scale_x, 0.75));
        assert!(close_to(frame.scale_y, 0.75));
        assert!(close_to(Effect::HideHorizontal.frame(0.5, true).scale_y, 1.0));
    }
}
