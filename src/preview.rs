//! Live sample of the current pen, drawn on a small surface of its own.

use std::f32::consts::PI;

use crate::{
    math::{vec2, Vec2f, Vec2u},
    settings::ToolSettings,
    surface::{Path, RasterSurface, StrokeStyle},
};

pub const PREVIEW_SIZE: Vec2u = vec2(300, 150);

const ARC_CENTER: Vec2f = vec2(150.0, 75.0);
const ARC_RADIUS: f32 = 25.0;
const ARC_START: f32 = 45.0;
const ARC_END: f32 = PI + 45.0;

pub struct Preview<S> {
    surface: Option<S>,
    last_style: Option<StrokeStyle>,
}

impl<S> Default for Preview<S> {
    fn default() -> Self {
        Self {
            surface: None,
            last_style: None,
        }
    }
}

impl<S: RasterSurface> Preview<S> {
    pub fn attach(&mut self, surface: S) {
        self.surface = Some(surface);
    }

    /// Clears and hands back the preview surface.
    pub fn detach(&mut self) -> Option<S> {
        self.clear();
        self.surface.take()
    }

    #[cfg(test)]
    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// Style of the most recently drawn sample, if it is still on the surface.
    pub fn last_style(&self) -> Option<&StrokeStyle> {
        self.last_style.as_ref()
    }

    /// Replaces the sample with one drawn in the style `settings` produce.
    pub fn render(&mut self, settings: &ToolSettings) {
        let Some(surface) = &mut self.surface else { return };
        surface.clear();
        let style = settings.stroke_style();
        let path = Path::new().arc(ARC_CENTER, ARC_RADIUS, ARC_START, ARC_END, false);
        surface.stroke(&path, &style);
        self.last_style = Some(style);
    }

    pub fn clear(&mut self) {
        if let Some(surface) = &mut self.surface {
            surface.clear();
        }
        self.last_style = None;
    }
}
