use crate::settings::{Level, Rgb};

/// Commands the tool panel can issue to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    Undo,
    Redo,
    ToggleSettingsPanel,
    /// Declared but not implemented yet.
    StraightLineDrawing,
    ToggleEraseMode,
    Clear,
    /// Declared but not implemented yet.
    Save,
    ToggleSurfaceVisibility,

    SetColor(Rgb),
    SetWidth(Level),
    SetOpacity(Level),
}
