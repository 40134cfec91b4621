//! Popup placement relative to its source and monitor.

/// Distance popups keep from the monitor edges.
pub const MONITOR_MARGIN: f32 = 10.0;

/// Extra room assumed around a parent popup when choosing where children open.
const CHILD_GAP: f32 = 20.0;

/// Side of the popup the arrow points out of. A popup with arrow side [Side::Top] opens below
/// its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// Arrow on top, popup below the source.
    Top,
    /// Arrow at the bottom, popup above the source.
    #[default]
    Bottom,
    /// Arrow on the left, popup to the right of the source.
    Left,
    /// Arrow on the right, popup to the left of the source.
    Right,
}

impl Side {
    /// Whether the arrow lies on a horizontal edge.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Side::Top | Side::Bottom)
    }
}

/// Axis-aligned rectangle in stage coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect {
    /// Creates a rectangle.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Whether the point lies inside.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Box pointer metrics normally taken from the theme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerStyle {
    /// Space between source and popup.
    pub gap: f32,
    /// Room reserved at both ends of the arrow axis.
    pub margin: f32,
}

impl Default for PointerStyle {
    fn default() -> Self {
        Self { gap: 0.0, margin: 0.0 }
    }
}

/// Result of [place_popup].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Where the popup goes.
    pub rect: Rect,
    /// Arrow tip offset along the popup edge.
    pub arrow_origin: f32,
}

/// Place a popup of `width` x `height` next to `source`.
///
/// `alignment` (0 to 1) chooses where along the source the arrow points. With `fix_to_corner`
/// the popup is aligned to the source edge nearest to the monitor edge instead.
#[allow(clippy::too_many_arguments)]
pub fn place_popup(
    source: Rect,
    width: f32,
    height: f32,
    side: Side,
    alignment: f32,
    fix_to_corner: bool,
    monitor: Rect,
    style: PointerStyle,
) -> Placement {
    let half_margin = style.margin / 2.0;
    let (mut x, mut y) = match side {
        Side::Top => (0.0, source.bottom() + style.gap),
        Side::Bottom => (0.0, source.y - height - style.gap),
        Side::Left => (source.right() + style.gap, 0.0),
        Side::Right => (source.x - width - style.gap, 0.0),
    };

    let arrow_origin;
    if side.is_horizontal() {
        let center = source.x + source.width * alignment;
        x = center - (half_margin + (width - style.margin) * alignment);
        if fix_to_corner {
            x = if source.center_x() > monitor.center_x() {
                source.right() - width
            } else {
                source.x
            };
        }
        x = x.max(monitor.x + MONITOR_MARGIN);
        x = x.min(monitor.right() - (MONITOR_MARGIN + width));
        arrow_origin = center - x;
    } else {
        let center = source.y + source.height * alignment;
        y = center - (half_margin + (height - style.margin) * alignment);
        if fix_to_corner {
            y = source.y;
        }
        y = y.max(monitor.y + MONITOR_MARGIN);
        y = y.min(monitor.bottom() - (MONITOR_MARGIN + height));
        arrow_origin = center - y;
    }

    Placement {
        rect: Rect::new(x, y, width, height),
        arrow_origin,
    }
}

/// Arrow sides for the child popups of a popup placed at `parent`.
///
/// Children open away from a parent whose arrow is on the right, and away from the nearer
/// monitor half for parents hanging from a panel. A child that would overflow flips, and the
/// flipped side carries over to the following children.
pub fn child_arrow_sides(parent_side: Side, parent: Rect, child_widths: &[f32], monitor: Rect) -> Vec<Side> {
    let left_menu = parent.x - CHILD_GAP;
    let right_menu = left_menu + parent.width + CHILD_GAP;

    let mut side = match parent_side {
        Side::Right => Side::Right,
        Side::Top | Side::Bottom if left_menu + parent.width / 2.0 > monitor.center_x() => Side::Right,
        _ => Side::Left,
    };

    child_widths
        .iter()
        .map(|width| {
            if side == Side::Left && right_menu + width > monitor.right() {
                side = Side::Right;
            } else if side == Side::Right && left_menu - width < monitor.x {
                side = Side::Left;
            }
            side
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONITOR: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1000.0,
        height: 800.0,
    };

    #[test]
    fn test_popup_below_top_panel_is_clamped() {
        let source = Rect::new(980.0, 0.0, 20.0, 24.0);
        let placement = place_popup(source, 200.0, 300.0, Side::Top, 0.5, false, MONITOR, PointerStyle::default());
        assert_eq!(placement.rect.y, 24.0);
        assert_eq!(placement.rect.x, 1000.0 - 10.0 - 200.0);
        assert_eq!(placement.arrow_origin, 990.0 - placement.rect.x);
    }

    #[test]
    fn test_popup_beside_source() {
        let source = Rect::new(100.0, 790.0, 150.0, 30.0);
        let placement = place_popup(source, 200.0, 100.0, Side::Left, 0.0, false, MONITOR, PointerStyle::default());
        assert_eq!(placement.rect.x, 250.0);
        assert_eq!(placement.rect.y, 800.0 - 10.0 - 100.0);
    }

    #[test]
    fn test_children_of_right_half_panel_menu_open_left() {
        let parent = Rect::new(700.0, 30.0, 200.0, 300.0);
        let sides = child_arrow_sides(Side::Top, parent, &[150.0, 150.0], MONITOR);
        assert_eq!(sides, vec![Side::Right, Side::Right]);
    }

    #[test]
    fn test_child_flips_on_overflow_and_carries_over() {
        let parent = Rect::new(50.0, 30.0, 300.0, 300.0);
        let sides = child_arrow_sides(Side::Left, parent, &[100.0, 800.0, 20.0], MONITOR);
        assert_eq!(sides, vec![Side::Left, Side::Right, Side::Right]);
    }
}
