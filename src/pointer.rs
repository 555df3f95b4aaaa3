//! Turns raw pointer events into drawing effects.

use crate::{
    math::{vec2, Vec2f},
    settings::ToolSettings,
    surface::{Rect, StrokeStyle},
};

/// Side length of the square cleared by the eraser, in pixels.
pub const ERASE_SIZE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Vec2f),
    Move(Vec2f),
    Up,
}

/// State of the gesture in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PaintSession {
    pub active: bool,
    /// `None` until the first pointer-down.
    pub last: Option<Vec2f>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Stroke {
        from: Vec2f,
        to: Vec2f,
        style: StrokeStyle,
    },
    Erase(Rect),
    /// The gesture ended; the surface should be snapshotted into the history.
    Commit,
}

/// The eraser footprint at `at` (anchored at its top-left corner).
pub fn erase_rect(at: Vec2f) -> Rect {
    Rect {
        pos: at,
        size: vec2(ERASE_SIZE, ERASE_SIZE),
    }
}

/// Advances the paint state machine by one event.
pub fn step(
    session: PaintSession,
    event: PointerEvent,
    settings: &ToolSettings,
) -> (PaintSession, Vec<Effect>) {
    match event {
        PointerEvent::Down(pos) => (
            PaintSession {
                active: true,
                last: Some(pos),
            },
            Vec::new(),
        ),
        PointerEvent::Move(pos) => {
            let Some(last) = session.last.filter(|_| session.active) else {
                return (session, Vec::new());
            };
            // Erasing only touches the new position, it does not sweep the path in between.
            let effect = if settings.erase {
                Effect::Erase(erase_rect(pos))
            } else {
                Effect::Stroke {
                    from: last,
                    to: pos,
                    style: settings.stroke_style(),
                }
            };
            (
                PaintSession {
                    active: true,
                    last: Some(pos),
                },
                vec![effect],
            )
        }
        PointerEvent::Up if session.active => (
            PaintSession {
                active: false,
                ..session
            },
            vec![Effect::Commit],
        ),
        PointerEvent::Up => (session, Vec::new()),
    }
}
