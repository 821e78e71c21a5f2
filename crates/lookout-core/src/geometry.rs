/// Axis-aligned bounding box in integer pixel coordinates.
///
/// `x`/`y` is the top-left corner. Detector output arrives in corner form
/// and is converted with [`Rect::from_corners`]; everything downstream
/// works in (x, y, w, h).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from corner form (x1, y1, x2, y2).
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Center point of the box.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// A box with non-positive width or height carries no pixels.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Euclidean distance between the centers of two boxes.
    pub fn center_distance(&self, other: &Rect) -> f32 {
        let (cx1, cy1) = self.center();
        let (cx2, cy2) = other.center();
        let dx = (cx1 - cx2) as f32;
        let dy = (cy1 - cy2) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Compute Intersection-over-Union with another box.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_w = (x2 - x1).max(0) as i64;
        let inter_h = (y2 - y1).max(0) as i64;
        let inter_area = inter_w * inter_h;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0 {
            inter_area as f32 / union_area as f32
        } else {
            0.0
        }
    }

    /// Clamp the box to frame bounds.
    ///
    /// Returns `None` when the clamped box collapses to nothing, which is
    /// how a drifted tracker region gets discarded.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Rect> {
        let x = self.x.max(0);
        let y = self.y.max(0);
        let width = (self.x + self.width).min(frame_width as i32) - x;
        let height = (self.y + self.height).min(frame_height as i32) - y;

        if width <= 0 || height <= 0 {
            None
        } else {
            Some(Rect {
                x,
                y,
                width,
                height,
            })
        }
    }

    /// (x, y, w, h) as a fixed-size array, the wire form used in headers.
    pub fn to_array(&self) -> [i32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}
