//! Keyboard side of the tool panel: maps bound keys to engine commands.

use std::collections::HashMap;

use winit::event::{ElementState, KeyEvent};

use crate::{
    cmd::Cmd,
    config::{CommandVerb, Key},
    engine::EngineState,
    settings::Rgb,
};

pub struct Panel {
    bindings: HashMap<Key, CommandVerb>,
    palette: Vec<Rgb>,
}

impl Panel {
    pub fn new(bindings: HashMap<Key, CommandVerb>, palette: Vec<Rgb>) -> Self {
        Self { bindings, palette }
    }

    #[cfg(test)]
    pub fn palette(&self) -> &[Rgb] {
        &self.palette
    }

    /// Translates a key press into a command, if the key is bound and the command applies in
    /// the current state.
    pub fn key_event(&self, event: &KeyEvent, state: &EngineState) -> Option<Cmd> {
        if event.state != ElementState::Pressed || event.repeat {
            return None;
        }
        let verb = *self.bindings.get(&Key::from_logical(&event.logical_key))?;
        self.translate(verb, state)
    }

    pub fn translate(&self, verb: CommandVerb, state: &EngineState) -> Option<Cmd> {
        let settings = &state.settings;
        let cmd = match verb {
            CommandVerb::Undo => Cmd::Undo,
            CommandVerb::Redo => Cmd::Redo,
            CommandVerb::Settings => Cmd::ToggleSettingsPanel,
            CommandVerb::StraightLine => Cmd::StraightLineDrawing,
            CommandVerb::Eraser => Cmd::ToggleEraseMode,
            CommandVerb::Clear => Cmd::Clear,
            CommandVerb::Save => Cmd::Save,
            CommandVerb::Switch => Cmd::ToggleSurfaceVisibility,

            // Sliders and palette only exist inside the settings panel.
            _ if !state.settings_open => return None,

            CommandVerb::WidthUp => Cmd::SetWidth(settings.width.step(1)),
            CommandVerb::WidthDown => Cmd::SetWidth(settings.width.step(-1)),
            CommandVerb::OpacityUp => Cmd::SetOpacity(settings.opacity.step(1)),
            CommandVerb::OpacityDown => Cmd::SetOpacity(settings.opacity.step(-1)),
            CommandVerb::NextColor | CommandVerb::PrevColor => {
                let len = self.palette.len();
                let current = self.palette.iter().position(|&c| c == settings.color);
                let i = match (verb, current) {
                    (CommandVerb::NextColor, Some(i)) => (i + 1) % len,
                    (CommandVerb::NextColor, None) => 0,
                    (_, Some(i)) => (i + len - 1) % len,
                    (_, None) => len.checked_sub(1)?,
                };
                Cmd::SetColor(*self.palette.get(i)?)
            }
            CommandVerb::Color(n) => {
                Cmd::SetColor(*self.palette.get(usize::from(n).checked_sub(1)?)?)
            }
        };
        Some(cmd)
    }
}
