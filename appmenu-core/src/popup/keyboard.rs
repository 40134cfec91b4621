//! Direction keys relative to a popup's arrow side.

use super::geometry::Side;

/// Keys the menu engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Closes the innermost popup.
    Escape,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Enter or keypad enter.
    Return,
    /// Space bar.
    Space,
    /// Anything else, passed through.
    Other,
}

impl Key {
    /// Whether the key activates the focused item.
    pub fn is_activation(self) -> bool {
        matches!(self, Key::Return | Key::Space)
    }
}

/// The arrow key that leaves a popup back towards its source.
///
/// Side popups always leave on the key pointing at the source. Popups hanging from a panel only
/// leave when the active item is the one next to the panel (`at_border`).
pub fn escape_key(side: Side, at_border: bool) -> Option<Key> {
    match side {
        Side::Left => Some(Key::Left),
        Side::Right => Some(Key::Right),
        Side::Top if at_border => Some(Key::Up),
        Side::Bottom if at_border => Some(Key::Down),
        _ => None,
    }
}

/// Whether the border item of a popup with this arrow side is its first item. Popups hanging
/// below a panel border at their first item, popups above it at their last.
pub fn border_is_first(side: Side) -> bool {
    side != Side::Bottom
}

/// `(open, close)` keys of a submenu item whose submenu has the given arrow side.
pub fn submenu_keys(side: Side) -> (Key, Key) {
    if side == Side::Right {
        (Key::Left, Key::Right)
    } else {
        (Key::Right, Key::Left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_follows_arrow_side() {
        assert_eq!(escape_key(Side::Left, false), Some(Key::Left));
        assert_eq!(escape_key(Side::Right, false), Some(Key::Right));
        assert_eq!(escape_key(Side::Top, false), None);
        assert_eq!(escape_key(Side::Top, true), Some(Key::Up));
        assert_eq!(escape_key(Side::Bottom, true), Some(Key::Down));
    }

    #[test]
    fn test_right_side_inverts_submenu_keys() {
        assert_eq!(submenu_keys(Side::Right), (Key::Left, Key::Right));
        assert_eq!(submenu_keys(Side::Left), (Key::Right, Key::Left));
        assert_eq!(submenu_keys(Side::Top), (Key::Right, Key::Left));
    }
}
