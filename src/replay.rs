//! Deterministic replay of the stroke log onto a pixel canvas.
//!
//! Two modes, matching how events arrive:
//! - **full replay** — wipe the surface and redraw every stroke in log
//!   order; required after a `clear` or a `room_snapshot`.
//! - **incremental append** — rasterize only the newest stroke, leaving
//!   existing pixels untouched; used for ordinary `draw` events so the
//!   cost tracks new input, not total history.
//!
//! Determinism is the contract: for the same ordered log, two
//! independent replays produce pixel-identical output. Everything here
//! is pure integer arithmetic over the stroke data — no wall clock, no
//! randomness, no float accumulation across strokes.
//!
//! The canvas surface is owned exclusively by this engine; no other
//! component touches pixels.

use crate::model::{DrawingStroke, StrokePoint};

/// Packed RGBA pixel, `0xRRGGBBAA`.
pub type Pixel = u32;

/// Opaque white, the empty-surface color.
pub const BACKGROUND: Pixel = 0xFFFF_FFFF;

/// Opaque black, the fallback for unparseable stroke colors.
pub const FALLBACK_COLOR: Pixel = 0x0000_00FF;

/// Parse a `#rrggbb` hex color into a packed pixel.
pub fn parse_color(color: &str) -> Option<Pixel> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | 0xFF)
}

/// An offscreen drawing surface.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl Canvas {
    /// Create a blank canvas filled with [`BACKGROUND`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![BACKGROUND; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw pixel data, row-major.
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Read one pixel; out-of-bounds reads return [`BACKGROUND`].
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        if x >= self.width || y >= self.height {
            return BACKGROUND;
        }
        self.pixels[(y as usize) * (self.width as usize) + (x as usize)]
    }

    /// Wipe the surface back to the background color.
    pub fn clear(&mut self) {
        self.pixels.fill(BACKGROUND);
    }

    /// Whether every pixel is the background color.
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&p| p == BACKGROUND)
    }

    /// Full replay: clear, then redraw the whole log in order.
    pub fn render_full(&mut self, strokes: &[DrawingStroke]) {
        self.clear();
        for stroke in strokes {
            self.render_stroke(stroke);
        }
    }

    /// Incremental append: rasterize one stroke on top of the current
    /// surface.
    pub fn render_stroke(&mut self, stroke: &DrawingStroke) {
        if stroke.points.is_empty() {
            return;
        }
        let color = parse_color(&stroke.color).unwrap_or_else(|| {
            log::debug!("unparseable stroke color {:?}, using fallback", stroke.color);
            FALLBACK_COLOR
        });
        // Round caps and joins: a disc stamped at every rasterized
        // position, like the source canvas renderer.
        let radius = ((stroke.width_px / 2.0).round() as i64).max(0);

        let first = grid(&stroke.points[0]);
        self.stamp(first.0, first.1, radius, color);
        for pair in stroke.points.windows(2) {
            let (x0, y0) = grid(&pair[0]);
            let (x1, y1) = grid(&pair[1]);
            self.line(x0, y0, x1, y1, radius, color);
        }
    }

    /// Bresenham line, stamping a disc at every step.
    fn line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, radius: i64, color: Pixel) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            self.stamp(x, y, radius, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Stamp a filled disc; pixels outside the surface are clipped.
    fn stamp(&mut self, cx: i64, cy: i64, radius: i64, color: Pixel) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let x = cx + dx;
                let y = cy + dy;
                if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
                    continue;
                }
                self.pixels[(y as usize) * (self.width as usize) + (x as usize)] = color;
            }
        }
    }
}

/// Snap a sampled point to the pixel grid. Rounding here is the single
/// place float coordinates meet integers, so replays cannot drift.
fn grid(point: &StrokePoint) -> (i64, i64) {
    (point.x.round() as i64, point.y.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActiveStroke;

    fn stroke(points: &[(f32, f32)], color: &str, width: f32) -> DrawingStroke {
        let mut active = ActiveStroke::begin("a", color, width);
        for &(x, y) in points {
            active.push(StrokePoint::new(x, y));
        }
        active.finish().unwrap()
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#000000"), Some(0x0000_00FF));
        assert_eq!(parse_color("#ffffff"), Some(0xFFFF_FFFF));
        assert_eq!(parse_color("#ff8000"), Some(0xFF80_00FF));
        assert_eq!(parse_color("red"), None);
        assert_eq!(parse_color("#fff"), None);
        assert_eq!(parse_color("#zzzzzz"), None);
    }

    #[test]
    fn test_new_canvas_blank() {
        let canvas = Canvas::new(32, 32);
        assert!(canvas.is_blank());
        assert_eq!(canvas.pixel(0, 0), BACKGROUND);
        assert_eq!(canvas.pixels().len(), 32 * 32);
    }

    #[test]
    fn test_single_point_stroke_stamps() {
        let mut canvas = Canvas::new(32, 32);
        canvas.render_stroke(&stroke(&[(16.0, 16.0)], "#000000", 2.0));
        assert_eq!(canvas.pixel(16, 16), 0x0000_00FF);
        assert!(!canvas.is_blank());
    }

    #[test]
    fn test_line_connects_points() {
        let mut canvas = Canvas::new(32, 32);
        canvas.render_stroke(&stroke(&[(4.0, 16.0), (28.0, 16.0)], "#ff0000", 1.0));
        // Every column along the segment is painted.
        for x in 4..=28 {
            assert_eq!(canvas.pixel(x, 16), 0xFF00_00FF, "column {x}");
        }
        // Rows far from the segment are untouched.
        assert_eq!(canvas.pixel(16, 4), BACKGROUND);
    }

    #[test]
    fn test_replay_determinism() {
        let log = vec![
            stroke(&[(2.0, 2.0), (20.0, 14.0), (9.0, 30.0)], "#336699", 3.0),
            stroke(&[(30.0, 1.0), (1.0, 29.0)], "#cc2200", 5.0),
            stroke(&[(12.0, 12.0)], "#000000", 8.0),
        ];

        let mut a = Canvas::new(48, 48);
        let mut b = Canvas::new(48, 48);
        a.render_full(&log);
        b.render_full(&log);

        assert_eq!(a.pixels(), b.pixels());
    }

    #[test]
    fn test_incremental_matches_full() {
        let log = vec![
            stroke(&[(2.0, 2.0), (40.0, 20.0)], "#00aa00", 2.0),
            stroke(&[(10.0, 40.0), (40.0, 10.0)], "#aa0000", 4.0),
        ];

        let mut full = Canvas::new(48, 48);
        full.render_full(&log);

        let mut incremental = Canvas::new(48, 48);
        incremental.render_full(&log[..1]);
        incremental.render_stroke(&log[1]);

        assert_eq!(full.pixels(), incremental.pixels());
    }

    #[test]
    fn test_full_replay_of_empty_log_is_blank() {
        let mut canvas = Canvas::new(16, 16);
        canvas.render_stroke(&stroke(&[(1.0, 1.0), (14.0, 14.0)], "#000000", 2.0));
        assert!(!canvas.is_blank());

        canvas.render_full(&[]);
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_out_of_bounds_points_clipped() {
        let mut canvas = Canvas::new(16, 16);
        canvas.render_stroke(&stroke(&[(-10.0, 8.0), (30.0, 8.0)], "#000000", 3.0));
        // In-bounds part of the segment is painted; no panic on the rest.
        assert_eq!(canvas.pixel(8, 8), 0x0000_00FF);
    }

    #[test]
    fn test_unparseable_color_falls_back_deterministically() {
        let bad = stroke(&[(4.0, 4.0), (12.0, 4.0)], "chartreuse", 1.0);
        let mut a = Canvas::new(16, 16);
        let mut b = Canvas::new(16, 16);
        a.render_stroke(&bad);
        b.render_stroke(&bad);
        assert_eq!(a.pixels(), b.pixels());
        assert_eq!(a.pixel(8, 4), FALLBACK_COLOR);
    }

    #[test]
    fn test_stroke_width_paints_disc() {
        let mut canvas = Canvas::new(32, 32);
        canvas.render_stroke(&stroke(&[(16.0, 16.0)], "#000000", 8.0));
        // Radius 4 disc: points within the radius painted, corners not.
        assert_eq!(canvas.pixel(16, 12), 0x0000_00FF);
        assert_eq!(canvas.pixel(12, 16), 0x0000_00FF);
        assert_eq!(canvas.pixel(12, 12), BACKGROUND);
    }
}
