/// An axis-aligned rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Snap to whole pixels: `(x, y, width, height)` with the origin and size
    /// rounded independently. Negative sizes collapse to zero.
    pub fn to_pixels(&self) -> (i64, i64, u32, u32) {
        let w = self.width.round().max(0.0);
        let h = self.height.round().max(0.0);
        (
            self.x.round() as i64,
            self.y.round() as i64,
            w.min(u32::MAX as f64) as u32,
            h.min(u32::MAX as f64) as u32,
        )
    }

    pub fn is_empty(&self) -> bool {
        let (_, _, w, h) = self.to_pixels();
        w == 0 || h == 0
    }
}

/// A circle used as a clip region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

impl Circle {
    pub fn new(cx: f64, cy: f64, radius: f64) -> Self {
        Self { cx, cy, radius }
    }

    /// The circle inscribed in the square of side `2 * radius` whose top-left
    /// corner is `(x, y)`.
    pub fn inscribed_at(x: f64, y: f64, radius: f64) -> Self {
        Self::new(x + radius, y + radius, radius)
    }

    /// Bounding square of the circle.
    pub fn bounds(&self) -> Rect {
        let d = 2.0 * self.radius;
        Rect::new(self.cx - self.radius, self.cy - self.radius, d, d)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        let dx = x - self.cx;
        let dy = y - self.cy;
        dx * dx + dy * dy <= self.radius * self.radius
    }

    /// Whether the center of pixel `(px, py)` lies inside the circle.
    pub fn covers_pixel(&self, px: i64, py: i64) -> bool {
        self.contains(px as f64 + 0.5, py as f64 + 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_to_pixels_rounds() {
        let r = Rect::new(79.6, 80.2, 160.4, 79.5);
        assert_eq!(r.to_pixels(), (80, 80, 160, 80));
    }

    #[test]
    fn test_rect_negative_size_is_empty() {
        let r = Rect::new(10.0, 10.0, -4.0, 20.0);
        assert!(r.is_empty());
    }

    #[test]
    fn test_circle_inscribed_bounds() {
        let c = Circle::inscribed_at(100.0, 50.0, 20.0);
        assert_eq!(c.cx, 120.0);
        assert_eq!(c.cy, 70.0);
        assert_eq!(c.bounds(), Rect::new(100.0, 50.0, 40.0, 40.0));
    }

    #[test]
    fn test_circle_covers_pixel() {
        let c = Circle::inscribed_at(0.0, 0.0, 10.0);
        assert!(c.covers_pixel(10, 10));
        assert!(!c.covers_pixel(0, 0));
        assert!(!c.covers_pixel(19, 19));
    }
}
