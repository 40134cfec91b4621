use crate::popup::MenuId;
use crate::widget::WidgetId;

/// Holder of keyboard focus inside a menu view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusTarget {
    /// The panel actor that launches the root menu.
    Launcher,
    /// An item widget.
    Widget(WidgetId),
    /// The body of a popup.
    Menu(MenuId),
}
