//! The raster surface abstraction and its CPU implementation.

use std::f32::consts::TAU;

use crate::math::{segment_dist, vec2, Vec2f, Vec2u};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Round,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    /// Hex colour string with alpha suffix, as it was derived from the pen settings.
    pub color: String,
    /// Straight (non-premultiplied) RGBA.
    pub rgba: [u8; 4],
    pub join: LineJoin,
    /// Line width in pixels.
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub pos: Vec2f,
    pub size: Vec2f,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            pos: vec2(x, y),
            size: vec2(w, h),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PathCmd {
    MoveTo(Vec2f),
    LineTo(Vec2f),
    Arc {
        center: Vec2f,
        radius: f32,
        start: f32,
        end: f32,
        anticlockwise: bool,
    },
    Close,
}

/// A path under construction. Creating one is the equivalent of starting a new path; nothing
/// is drawn until it is passed to [`RasterSurface::stroke`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    cmds: Vec<PathCmd>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(mut self, p: Vec2f) -> Self {
        self.cmds.push(PathCmd::MoveTo(p));
        self
    }

    pub fn line_to(mut self, p: Vec2f) -> Self {
        self.cmds.push(PathCmd::LineTo(p));
        self
    }

    /// Adds a circular arc. Angles are in radians, measured clockwise from the +X axis (screen
    /// coordinates, Y pointing down).
    pub fn arc(mut self, center: Vec2f, radius: f32, start: f32, end: f32, anticlockwise: bool) -> Self {
        self.cmds.push(PathCmd::Arc {
            center,
            radius,
            start,
            end,
            anticlockwise,
        });
        self
    }

    pub fn close(mut self) -> Self {
        self.cmds.push(PathCmd::Close);
        self
    }

    /// Flattens the path into polylines, one per subpath.
    fn flatten(&self) -> Vec<Vec<Vec2f>> {
        let mut subpaths = Vec::new();
        let mut current: Vec<Vec2f> = Vec::new();
        for cmd in &self.cmds {
            match *cmd {
                PathCmd::MoveTo(p) => {
                    if !current.is_empty() {
                        subpaths.push(std::mem::take(&mut current));
                    }
                    current.push(p);
                }
                PathCmd::LineTo(p) => current.push(p),
                PathCmd::Arc {
                    center,
                    radius,
                    start,
                    end,
                    anticlockwise,
                } => {
                    let sweep = arc_sweep(start, end, anticlockwise);
                    let steps = ((sweep.abs() * radius) / 2.0).ceil().max(4.0) as usize;
                    for i in 0..=steps {
                        let angle = start + sweep * (i as f32 / steps as f32);
                        current.push(center + vec2(angle.cos(), angle.sin()) * radius);
                    }
                }
                PathCmd::Close => {
                    if let Some(&first) = current.first() {
                        current.push(first);
                        subpaths.push(std::mem::take(&mut current));
                        current.push(first);
                    }
                }
            }
        }
        if !current.is_empty() {
            subpaths.push(current);
        }
        subpaths
    }
}

/// Signed angle swept by an arc, following the canvas conventions: a sweep of a full turn or
/// more draws a full circle, anything else is reduced modulo a full turn in the arc direction.
fn arc_sweep(start: f32, end: f32, anticlockwise: bool) -> f32 {
    if anticlockwise {
        let d = start - end;
        if d >= TAU {
            -TAU
        } else {
            -d.rem_euclid(TAU)
        }
    } else {
        let d = end - start;
        if d >= TAU {
            TAU
        } else {
            d.rem_euclid(TAU)
        }
    }
}

/// A pixel buffer that can be stroked, cleared and snapshotted.
pub trait RasterSurface {
    type Snapshot;

    fn size(&self) -> Vec2u;

    fn stroke(&mut self, path: &Path, style: &StrokeStyle);

    fn clear_rect(&mut self, rect: Rect);

    /// Captures every pixel of the surface.
    fn capture(&self) -> Self::Snapshot;

    /// Overwrites every pixel of the surface with `snapshot`.
    fn restore(&mut self, snapshot: &Self::Snapshot);

    fn clear(&mut self) {
        let size = self.size();
        self.clear_rect(Rect::new(0.0, 0.0, size.x() as f32, size.y() as f32));
    }
}

/// Premultiplied RGBA8 pixel buffer, initially fully transparent.
#[derive(Clone)]
pub struct Pixmap {
    size: Vec2u,
    data: Vec<u8>,
    dirty: bool,
}

/// An immutable capture of a [`Pixmap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    size: Vec2u,
    data: Box<[u8]>,
}

impl Pixmap {
    pub fn new(size: Vec2u) -> Self {
        Self {
            size,
            data: vec![0; size.x() as usize * size.y() as usize * 4],
            dirty: true,
        }
    }

    /// Raw premultiplied RGBA8 rows, tightly packed.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Returns whether the pixels changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.size.x() as usize + x as usize) * 4
    }

    /// Pixel range covering `lo..hi` along an axis of length `len` (pixel centres inside).
    fn span(lo: f32, hi: f32, len: u32) -> (u32, u32) {
        let clamp = |v: f32| (v - 0.5).ceil().clamp(0.0, len as f32) as u32;
        (clamp(lo), clamp(hi))
    }

    fn blend(&mut self, x: u32, y: u32, rgba: [u8; 4], coverage: f32) {
        let a = f32::from(rgba[3]) / 255.0 * coverage;
        if a <= 0.0 {
            return;
        }
        let i = self.index(x, y);
        let src = [
            f32::from(rgba[0]) / 255.0 * a,
            f32::from(rgba[1]) / 255.0 * a,
            f32::from(rgba[2]) / 255.0 * a,
            a,
        ];
        for (c, s) in src.into_iter().enumerate() {
            let dst = f32::from(self.data[i + c]) / 255.0;
            let out = s + dst * (1.0 - a);
            self.data[i + c] = (out * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}

impl RasterSurface for Pixmap {
    type Snapshot = Snapshot;

    fn size(&self) -> Vec2u {
        self.size
    }

    fn stroke(&mut self, path: &Path, style: &StrokeStyle) {
        let segments: Vec<(Vec2f, Vec2f)> = path
            .flatten()
            .iter()
            .flat_map(|line| line.windows(2).map(|w| (w[0], w[1])))
            .filter(|(a, b)| a != b)
            .collect();
        if segments.is_empty() || style.width <= 0.0 {
            return;
        }

        let half = style.width / 2.0;
        let pad = half + 1.0;
        let (mut min, mut max) = (vec2(f32::MAX, f32::MAX), vec2(f32::MIN, f32::MIN));
        for &(a, b) in &segments {
            for p in [a, b] {
                min = vec2(min.x().min(p.x()), min.y().min(p.y()));
                max = vec2(max.x().max(p.x()), max.y().max(p.y()));
            }
        }
        let (x0, x1) = Self::span(min.x() - pad, max.x() + pad, self.size.x());
        let (y0, y1) = Self::span(min.y() - pad, max.y() + pad, self.size.y());

        // Coverage is taken from the distance to the whole path, so overlapping segments of a
        // single stroke are blended once.
        for y in y0..y1 {
            for x in x0..x1 {
                let p = vec2(x as f32 + 0.5, y as f32 + 0.5);
                let d = segments
                    .iter()
                    .map(|&(a, b)| segment_dist(p, a, b))
                    .fold(f32::MAX, f32::min);
                let coverage = (half + 0.5 - d).clamp(0.0, 1.0);
                self.blend(x, y, style.rgba, coverage);
            }
        }
        self.dirty = true;
    }

    fn clear_rect(&mut self, rect: Rect) {
        let (ax, bx) = (rect.pos.x(), rect.pos.x() + rect.size.x());
        let (ay, by) = (rect.pos.y(), rect.pos.y() + rect.size.y());
        let (x0, x1) = Self::span(ax.min(bx), ax.max(bx), self.size.x());
        let (y0, y1) = Self::span(ay.min(by), ay.max(by), self.size.y());
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        for y in y0..y1 {
            let (start, end) = (self.index(x0, y), self.index(x1, y));
            self.data[start..end].fill(0);
        }
        self.dirty = true;
    }

    fn capture(&self) -> Snapshot {
        Snapshot {
            size: self.size,
            data: self.data.clone().into_boxed_slice(),
        }
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        if snapshot.size != self.size {
            log::warn!(
                "ignoring {}x{} snapshot for {}x{} surface",
                snapshot.size.x(),
                snapshot.size.y(),
                self.size.x(),
                self.size.y()
            );
            return;
        }
        self.data.copy_from_slice(&snapshot.data);
        self.dirty = true;
    }
}
