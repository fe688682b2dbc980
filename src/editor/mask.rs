use std::io::Cursor;

use image::{Rgba, RgbaImage};

use crate::editor::EditorError;

/// Paint color for marked regions: semi-transparent red, matching the
/// overlay the user sees on screen.
const MASK_COLOR: Rgba<u8> = Rgba([255, 0, 0, 178]);

/// A point in mask-surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Transparent RGBA raster the brush paints into. Its dimensions always
/// track the displayed image's rendered bounding box.
#[derive(Debug, Clone)]
pub struct MaskSurface {
    pixels: RgbaImage,
}

impl MaskSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Reallocates the raster at new dimensions. Existing strokes are
    /// discarded; callers resynchronize on viewport changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
    }

    /// Erases all strokes, leaving the surface fully transparent.
    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Paints a single dot of the given diameter. A click with no movement
    /// still marks a point.
    pub fn paint_dot(&mut self, center: Point, diameter: u32) {
        self.paint_segment(center, center, diameter);
    }

    /// Paints a line segment with round caps: every pixel whose center lies
    /// within brush radius of the segment is filled. Consecutive segments
    /// therefore join without corner artifacts regardless of sample spacing.
    pub fn paint_segment(&mut self, from: Point, to: Point, diameter: u32) {
        let (width, height) = (self.pixels.width(), self.pixels.height());
        if width == 0 || height == 0 {
            return;
        }

        let radius = diameter as f32 / 2.0;
        let radius_sq = radius * radius;

        let min_x = ((from.x.min(to.x) - radius).floor().max(0.0)) as u32;
        let min_y = ((from.y.min(to.y) - radius).floor().max(0.0)) as u32;
        let max_x = (from.x.max(to.x) + radius).ceil().min((width - 1) as f32) as u32;
        let max_y = (from.y.max(to.y) + radius).ceil().min((height - 1) as f32) as u32;

        if (from.x.max(to.x) + radius) < 0.0 || (from.y.max(to.y) + radius) < 0.0 {
            return;
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                if dist_sq_to_segment(center, from, to) < radius_sq {
                    self.pixels.put_pixel(x, y, MASK_COLOR);
                }
            }
        }
    }

    /// Number of painted (non-transparent) pixels.
    pub fn painted_pixels(&self) -> usize {
        self.pixels.pixels().filter(|p| p.0[3] > 0).count()
    }

    pub fn is_clear(&self) -> bool {
        self.painted_pixels() == 0
    }

    /// Serializes the surface to PNG, preserving transparency.
    pub fn to_png(&self) -> Result<Vec<u8>, EditorError> {
        let mut buf = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| EditorError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// Squared distance from `p` to the segment `a`..`b`.
fn dist_sq_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let (apx, apy) = (p.x - a.x, p.y - a.y);

    let len_sq = abx * abx + aby * aby;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0)
    };

    let (dx, dy) = (apx - t * abx, apy - t * aby);
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_is_fully_transparent() {
        let mask = MaskSurface::new(64, 48);
        assert!(mask.is_clear());
        assert_eq!(mask.width(), 64);
        assert_eq!(mask.height(), 48);
    }

    #[test]
    fn single_dot_has_brush_size_diameter() {
        let mut mask = MaskSurface::new(100, 100);
        mask.paint_dot(Point::new(50.0, 50.0), 30);

        let mut min_x = u32::MAX;
        let mut max_x = 0;
        let mut min_y = u32::MAX;
        let mut max_y = 0;
        for (x, y, p) in mask.pixels.enumerate_pixels() {
            if p.0[3] > 0 {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }

        assert_eq!(max_x - min_x + 1, 30);
        assert_eq!(max_y - min_y + 1, 30);
    }

    #[test]
    fn segment_paints_a_gap_free_stroke() {
        let mut mask = MaskSurface::new(200, 100);
        let from = Point::new(20.0, 50.0);
        let to = Point::new(180.0, 50.0);
        mask.paint_segment(from, to, 10);

        // Every sample along the center line must be painted.
        for i in 0..=160 {
            let x = 20 + i;
            assert!(
                mask.pixels.get_pixel(x, 50).0[3] > 0,
                "gap at x={}",
                x
            );
        }
    }

    #[test]
    fn diagonal_segment_has_round_caps() {
        let mut mask = MaskSurface::new(100, 100);
        mask.paint_segment(Point::new(30.0, 30.0), Point::new(70.0, 70.0), 20);

        // Cap extends behind the start point along the segment direction.
        assert!(mask.pixels.get_pixel(25, 25).0[3] > 0);
        assert!(mask.pixels.get_pixel(75, 75).0[3] > 0);
        // Well outside the capsule stays transparent.
        assert_eq!(mask.pixels.get_pixel(90, 10).0[3], 0);
    }

    #[test]
    fn painting_off_canvas_clamps_without_panicking() {
        let mut mask = MaskSurface::new(50, 50);
        mask.paint_segment(Point::new(-20.0, 25.0), Point::new(20.0, 25.0), 8);
        assert!(mask.painted_pixels() > 0);

        mask.paint_segment(Point::new(-50.0, -50.0), Point::new(-30.0, -30.0), 8);
        // Entirely off-canvas segment paints nothing extra on row 0.
        assert_eq!(mask.pixels.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn clear_removes_all_paint() {
        let mut mask = MaskSurface::new(50, 50);
        mask.paint_dot(Point::new(25.0, 25.0), 20);
        assert!(!mask.is_clear());
        mask.clear();
        assert!(mask.is_clear());
    }

    #[test]
    fn resize_discards_strokes_and_updates_dimensions() {
        let mut mask = MaskSurface::new(50, 50);
        mask.paint_dot(Point::new(25.0, 25.0), 20);
        mask.resize(80, 60);
        assert_eq!((mask.width(), mask.height()), (80, 60));
        assert!(mask.is_clear());
    }

    #[test]
    fn png_round_trip_preserves_transparency() {
        let mut mask = MaskSurface::new(32, 32);
        mask.paint_dot(Point::new(16.0, 16.0), 8);
        let png = mask.to_png().unwrap();

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (32, 32));
        assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
        assert_eq!(decoded.get_pixel(16, 16).0[3], 178);
    }
}
