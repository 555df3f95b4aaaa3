//! The drawing engine: pen state, pointer handling, history and the command surface.

use crate::{
    cmd::Cmd,
    history::{History, Restore},
    pointer::{self, Effect, PaintSession, PointerEvent},
    preview::Preview,
    settings::{Level, Rgb, ToolSettings},
    surface::{Path, RasterSurface},
};

/// Transient UI state of the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineState {
    pub settings: ToolSettings,
    pub settings_open: bool,
    pub surface_visible: bool,
    pub session: PaintSession,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            settings: ToolSettings::default(),
            settings_open: false,
            surface_visible: false,
            session: PaintSession::default(),
        }
    }
}

impl EngineState {
    pub fn with_settings(self, settings: ToolSettings) -> Self {
        Self { settings, ..self }
    }

    pub fn with_settings_open(self, settings_open: bool) -> Self {
        Self {
            settings_open,
            ..self
        }
    }

    pub fn with_surface_visible(self, surface_visible: bool) -> Self {
        Self {
            surface_visible,
            ..self
        }
    }

    pub fn with_session(self, session: PaintSession) -> Self {
        Self { session, ..self }
    }
}

pub struct Engine<S: RasterSurface> {
    state: EngineState,
    /// The drawing surface. `None` while unmounted; every surface operation is skipped then.
    surface: Option<S>,
    preview: Preview<S>,
    history: History<S::Snapshot>,
}

impl<S: RasterSurface> Engine<S> {
    pub fn new(state: EngineState) -> Self {
        Self {
            state,
            surface: None,
            preview: Preview::default(),
            history: History::new(),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    #[cfg(test)]
    pub fn settings(&self) -> &ToolSettings {
        &self.state.settings
    }

    #[cfg(test)]
    pub fn history(&self) -> &History<S::Snapshot> {
        &self.history
    }

    #[cfg(test)]
    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    #[cfg(test)]
    pub fn preview(&self) -> &Preview<S> {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut Preview<S> {
        &mut self.preview
    }

    pub fn attach(&mut self, surface: S) {
        self.surface = Some(surface);
    }

    pub fn attach_preview(&mut self, surface: S) {
        self.preview.attach(surface);
        self.refresh_preview();
    }

    /// Unmounts both surfaces. History is kept but has nothing to act on until the next attach.
    pub fn detach(&mut self) -> (Option<S>, Option<S>) {
        (self.surface.take(), self.preview.detach())
    }

    pub fn pointer(&mut self, event: PointerEvent) {
        if !self.state.surface_visible && !matches!(event, PointerEvent::Up) {
            return;
        }
        let (session, effects) = pointer::step(self.state.session, event, &self.state.settings);
        self.state = self.state.with_session(session);
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        let Some(surface) = &mut self.surface else { return };
        match effect {
            Effect::Stroke { from, to, style } => {
                let path = Path::new().move_to(from).line_to(to).close();
                surface.stroke(&path, &style);
            }
            Effect::Erase(rect) => surface.clear_rect(rect),
            Effect::Commit => {
                self.history.commit(surface.capture());
                log::debug!(
                    "committed stroke {} ({} snapshots)",
                    self.history.cursor(),
                    self.history.len()
                );
            }
        }
    }

    pub fn dispatch(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::Undo => self.undo(),
            Cmd::Redo => self.redo(),
            Cmd::ToggleSettingsPanel => self.toggle_settings_panel(),
            Cmd::StraightLineDrawing => self.straight_line_drawing(),
            Cmd::ToggleEraseMode => self.toggle_erase_mode(),
            Cmd::Clear => self.clear(),
            Cmd::Save => self.save(),
            Cmd::ToggleSurfaceVisibility => self.toggle_surface_visibility(),
            Cmd::SetColor(color) => self.set_color(color),
            Cmd::SetWidth(width) => self.set_width(width),
            Cmd::SetOpacity(opacity) => self.set_opacity(opacity),
        }
    }

    pub fn undo(&mut self) {
        let Some(surface) = &mut self.surface else { return };
        match self.history.undo() {
            Some(Restore::Blank) => surface.clear(),
            Some(Restore::Snapshot(snapshot)) => surface.restore(snapshot),
            None => return,
        }
        log::info!("undo (now at stroke {})", self.history.cursor());
    }

    pub fn redo(&mut self) {
        let Some(surface) = &mut self.surface else { return };
        let Some(snapshot) = self.history.redo() else { return };
        surface.restore(snapshot);
        log::info!("redo (now at stroke {})", self.history.cursor());
    }

    pub fn clear(&mut self) {
        let Some(surface) = &mut self.surface else { return };
        log::info!("clearing canvas");
        surface.clear();
        self.history.clear();
    }

    pub fn toggle_settings_panel(&mut self) {
        self.state = self.state.with_settings_open(!self.state.settings_open);
        if self.state.settings_open {
            self.refresh_preview();
        } else {
            self.preview.clear();
        }
    }

    pub fn toggle_erase_mode(&mut self) {
        let erase = !self.state.settings.erase;
        log::info!("eraser {}", if erase { "on" } else { "off" });
        self.update_settings(self.state.settings.with_erase(erase));
    }

    pub fn toggle_surface_visibility(&mut self) {
        self.state = self.state.with_surface_visible(!self.state.surface_visible);
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.update_settings(self.state.settings.with_color(color));
        self.refresh_preview();
    }

    pub fn set_width(&mut self, width: Level) {
        self.update_settings(self.state.settings.with_width(width));
        self.refresh_preview();
    }

    pub fn set_opacity(&mut self, opacity: Level) {
        self.update_settings(self.state.settings.with_opacity(opacity));
        self.refresh_preview();
    }

    /// Hook for exporting the drawing. Does nothing yet.
    pub fn save(&mut self) {
        log::debug!("save is not implemented");
    }

    /// Hook for a straight-line tool. Does nothing yet.
    pub fn straight_line_drawing(&mut self) {
        log::debug!("straight-line drawing is not implemented");
    }

    fn update_settings(&mut self, settings: ToolSettings) {
        self.state = self.state.with_settings(settings);
    }

    fn refresh_preview(&mut self) {
        if !self.state.settings_open {
            return;
        }
        self.preview.render(&self.state.settings);
        if let Some(style) = self.preview.last_style() {
            log::debug!("pen preview: {} at {}px", style.color, style.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        math::{vec2, Vec2u},
        pointer::ERASE_SIZE,
        preview::PREVIEW_SIZE,
        settings::OPACITY_TABLE,
        surface::{Pixmap, Rect, StrokeStyle},
    };

    fn visible() -> EngineState {
        EngineState::default().with_surface_visible(true)
    }

    fn mounted() -> Engine<Pixmap> {
        let mut engine = Engine::new(visible());
        engine.attach(Pixmap::new(vec2(64, 64)));
        engine.attach_preview(Pixmap::new(PREVIEW_SIZE));
        engine
    }

    fn stroke<S: RasterSurface>(engine: &mut Engine<S>, from: (f32, f32), to: (f32, f32)) {
        engine.pointer(PointerEvent::Down(vec2(from.0, from.1)));
        engine.pointer(PointerEvent::Move(vec2(to.0, to.1)));
        engine.pointer(PointerEvent::Up);
    }

    fn pixels(engine: &Engine<Pixmap>) -> Vec<u8> {
        engine.surface().unwrap().data().to_vec()
    }

    #[test]
    fn undo_redo_scenario() {
        let mut engine = mounted();
        stroke(&mut engine, (0.0, 0.0), (10.0, 10.0));
        assert_eq!((engine.history().cursor(), engine.history().len()), (1, 1));
        let after_a = pixels(&engine);
        assert!(!engine.surface().unwrap().is_blank());

        stroke(&mut engine, (40.0, 40.0), (50.0, 50.0));
        assert_eq!(engine.history().cursor(), 2);
        assert_ne!(pixels(&engine), after_a);

        engine.undo();
        assert_eq!(pixels(&engine), after_a);
        assert_eq!(engine.history().cursor(), 1);

        engine.undo();
        assert!(engine.surface().unwrap().is_blank());
        assert_eq!(engine.history().cursor(), 0);

        engine.redo();
        assert_eq!(pixels(&engine), after_a);
        assert_eq!(engine.history().cursor(), 1);
    }

    #[test]
    fn undoing_every_stroke_blanks_the_surface() {
        let mut engine = mounted();
        for i in 0..5 {
            let o = i as f32 * 10.0;
            stroke(&mut engine, (o, 2.0), (o + 5.0, 60.0));
        }
        for _ in 0..5 {
            engine.undo();
        }
        assert!(engine.surface().unwrap().is_blank());
        assert_eq!(engine.history().cursor(), 0);

        // further undos are no-ops
        engine.undo();
        assert_eq!(engine.history().cursor(), 0);
    }

    #[test]
    fn undo_then_redo_is_pixel_identical() {
        let mut engine = mounted();
        stroke(&mut engine, (5.0, 5.0), (30.0, 8.0));
        stroke(&mut engine, (5.0, 20.0), (30.0, 40.0));
        let before = pixels(&engine);
        engine.undo();
        engine.redo();
        assert_eq!(pixels(&engine), before);

        // redo at the end of history changes nothing
        engine.redo();
        assert_eq!(pixels(&engine), before);
        assert_eq!(engine.history().cursor(), 2);
    }

    #[test]
    fn new_stroke_after_undo_drops_redo() {
        let mut engine = mounted();
        stroke(&mut engine, (5.0, 5.0), (30.0, 8.0));
        stroke(&mut engine, (5.0, 20.0), (30.0, 40.0));
        stroke(&mut engine, (50.0, 5.0), (50.0, 60.0));
        engine.undo();
        engine.undo();
        stroke(&mut engine, (0.0, 60.0), (60.0, 60.0));
        let current = pixels(&engine);
        assert_eq!((engine.history().cursor(), engine.history().len()), (2, 2));

        engine.redo();
        assert_eq!(pixels(&engine), current);
        assert_eq!(engine.history().cursor(), 2);
    }

    #[test]
    fn clear_resets_history() {
        let mut engine = mounted();
        for _ in 0..3 {
            stroke(&mut engine, (5.0, 5.0), (30.0, 8.0));
        }
        engine.undo();
        engine.dispatch(Cmd::Clear);
        assert_eq!((engine.history().cursor(), engine.history().len()), (0, 0));
        assert!(engine.surface().unwrap().is_blank());
        engine.redo();
        assert!(engine.surface().unwrap().is_blank());
    }

    #[test]
    fn erasing_clears_fixed_square_at_pointer() {
        let mut engine = mounted();
        engine.set_width(Level::MAX);
        for y in (0..64).step_by(8) {
            let y = y as f32 + 4.0;
            stroke(&mut engine, (0.0, y), (64.0, y));
        }
        assert_eq!(engine.surface().unwrap().pixel(30, 30)[3], 255);

        engine.dispatch(Cmd::ToggleEraseMode);
        assert!(engine.settings().erase);
        stroke(&mut engine, (0.0, 0.0), (20.0, 20.0));

        let surface = engine.surface().unwrap();
        assert_eq!(surface.pixel(20, 20), [0; 4]);
        assert_eq!(surface.pixel(39, 39), [0; 4]);
        assert_eq!(surface.pixel(40, 40)[3], 255);
        assert_eq!(surface.pixel(19, 19)[3], 255);
        // the starting corner is left alone: erasing does not sweep the path
        assert_eq!(surface.pixel(5, 5)[3], 255);
        assert_eq!(engine.history().cursor(), 9);
    }

    #[derive(Default)]
    struct Recorder {
        strokes: Vec<StrokeStyle>,
        cleared: Vec<Rect>,
    }

    impl RasterSurface for Recorder {
        type Snapshot = usize;

        fn size(&self) -> Vec2u {
            vec2(100, 100)
        }

        fn stroke(&mut self, _path: &Path, style: &StrokeStyle) {
            self.strokes.push(style.clone());
        }

        fn clear_rect(&mut self, rect: Rect) {
            self.cleared.push(rect);
        }

        fn capture(&self) -> usize {
            self.strokes.len()
        }

        fn restore(&mut self, _snapshot: &usize) {}
    }

    #[test]
    fn erase_mode_never_strokes() {
        let mut engine = Engine::new(visible());
        engine.attach(Recorder::default());
        engine.toggle_erase_mode();
        engine.pointer(PointerEvent::Down(vec2(0.0, 0.0)));
        for i in 1..10 {
            engine.pointer(PointerEvent::Move(vec2(i as f32 * 7.0, 3.0)));
        }
        engine.pointer(PointerEvent::Up);

        let surface = engine.surface().unwrap();
        assert!(surface.strokes.is_empty());
        assert_eq!(surface.cleared.len(), 9);
        assert_eq!(
            surface.cleared[8],
            Rect::new(63.0, 3.0, ERASE_SIZE, ERASE_SIZE)
        );
    }

    #[test]
    fn strokes_use_current_settings() {
        let mut engine = Engine::new(visible());
        engine.attach(Recorder::default());
        engine.set_color("#0000ff".parse().unwrap());
        engine.set_opacity(Level::new(5).unwrap());
        stroke(&mut engine, (0.0, 0.0), (1.0, 1.0));
        let style = &engine.surface().unwrap().strokes[0];
        assert_eq!(style.color, format!("#0000ff{}", OPACITY_TABLE[4].0));
        assert_eq!(style.width, 10.0);
    }

    #[test]
    fn unmounted_engine_is_inert() {
        let mut engine: Engine<Pixmap> = Engine::new(visible());
        stroke(&mut engine, (0.0, 0.0), (10.0, 10.0));
        engine.undo();
        engine.redo();
        engine.clear();
        assert_eq!((engine.history().cursor(), engine.history().len()), (0, 0));

        engine.attach(Pixmap::new(vec2(16, 16)));
        stroke(&mut engine, (0.0, 0.0), (10.0, 10.0));
        let (surface, _) = engine.detach();
        assert!(!surface.unwrap().is_blank());
        engine.undo();
        assert_eq!(engine.history().cursor(), 1);
    }

    #[test]
    fn surface_starts_hidden_and_ignores_pointer() {
        let mut engine = Engine::new(EngineState::default());
        engine.attach(Pixmap::new(vec2(64, 64)));
        assert!(!engine.state().surface_visible);
        stroke(&mut engine, (0.0, 0.0), (10.0, 10.0));
        assert!(engine.surface().unwrap().is_blank());
        assert_eq!(engine.history().cursor(), 0);

        engine.dispatch(Cmd::ToggleSurfaceVisibility);
        assert!(engine.state().surface_visible);
        stroke(&mut engine, (0.0, 0.0), (10.0, 10.0));
        assert!(!engine.surface().unwrap().is_blank());
        assert_eq!(engine.history().cursor(), 1);

        // a gesture started while visible still commits after hiding
        engine.pointer(PointerEvent::Down(vec2(20.0, 20.0)));
        engine.pointer(PointerEvent::Move(vec2(30.0, 30.0)));
        engine.dispatch(Cmd::ToggleSurfaceVisibility);
        engine.pointer(PointerEvent::Move(vec2(60.0, 60.0)));
        engine.pointer(PointerEvent::Up);
        assert_eq!(engine.history().cursor(), 2);
        assert_eq!(engine.surface().unwrap().pixel(60, 60), [0; 4]);
    }

    #[test]
    fn preview_follows_settings_while_open() {
        let mut engine = mounted();
        assert!(engine.preview().last_style().is_none());

        engine.dispatch(Cmd::ToggleSettingsPanel);
        assert_eq!(engine.preview().last_style().unwrap().color, "#f80000ff");

        engine.dispatch(Cmd::SetOpacity(Level::MIN));
        engine.dispatch(Cmd::SetColor("#00ff00".parse().unwrap()));
        engine.dispatch(Cmd::SetWidth(Level::new(3).unwrap()));
        let style = engine.preview().last_style().unwrap();
        assert_eq!(style.color, format!("#00ff00{}", OPACITY_TABLE[0].0));
        assert_eq!(style.width, 3.0);

        // the preview never enters the drawing history
        assert_eq!(engine.history().len(), 0);

        engine.dispatch(Cmd::ToggleSettingsPanel);
        assert!(engine.preview().last_style().is_none());
        assert!(engine.preview().surface().unwrap().is_blank());
    }

    #[test]
    fn stub_commands_do_nothing() {
        let mut engine = mounted();
        stroke(&mut engine, (0.0, 0.0), (10.0, 10.0));
        let before = pixels(&engine);
        let state = *engine.state();
        engine.dispatch(Cmd::Save);
        engine.dispatch(Cmd::StraightLineDrawing);
        assert_eq!(pixels(&engine), before);
        assert_eq!(*engine.state(), state);
        assert_eq!(engine.history().cursor(), 1);
    }
}
