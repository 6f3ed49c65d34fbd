//! External regions of a binary mask.
//!
//! Foreground is 8-connected and background 4-connected, so every bounded
//! background pocket belongs to exactly one surrounding foreground shape.
//! A region is an outermost shape together with everything it encloses: its
//! holes, and any shapes nested inside those holes, which therefore never
//! show up as regions of their own.

use std::collections::VecDeque;

use image::GrayImage;

/// Pixel coordinate in frame space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Axis-aligned bounding box, inclusive of its first row and column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn centroid(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub bbox: BoundingBox,
    /// Pixels enclosed by the outer boundary, holes included.
    pub area: u32,
}

const NEIGHBOURS_4: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const NEIGHBOURS_8: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// External regions of `mask` (non-zero = foreground), in raster order of
/// their first pixel.
pub fn external_regions(mask: &GrayImage) -> Vec<Region> {
    let (width, height) = mask.dimensions();
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let foreground: Vec<bool> = mask.as_raw().iter().map(|&v| v > 0).collect();
    let neighbour = |index: usize, (dx, dy): (i64, i64)| -> Option<usize> {
        let x = (index % w) as i64 + dx;
        let y = (index / w) as i64 + dy;
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            None
        } else {
            Some(y as usize * w + x as usize)
        }
    };

    // Background reachable from outside the frame.
    let mut outside = vec![false; w * h];
    let mut queue = VecDeque::new();
    for index in 0..w * h {
        let (x, y) = (index % w, index / w);
        let on_border = x == 0 || y == 0 || x == w - 1 || y == h - 1;
        if on_border && !foreground[index] {
            outside[index] = true;
            queue.push_back(index);
        }
    }
    while let Some(index) = queue.pop_front() {
        for offset in NEIGHBOURS_4 {
            if let Some(next) = neighbour(index, offset) {
                if !foreground[next] && !outside[next] {
                    outside[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }

    // Everything else groups into one filled region per outermost shape.
    let mut visited = outside;
    let mut regions = Vec::new();
    for start in 0..w * h {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let (mut min_x, mut min_y) = (start % w, start / w);
        let (mut max_x, mut max_y) = (min_x, min_y);
        let mut area = 0u32;
        while let Some(index) = queue.pop_front() {
            area += 1;
            let (x, y) = (index % w, index / w);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            for offset in NEIGHBOURS_8 {
                if let Some(next) = neighbour(index, offset) {
                    if !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }
        }
        regions.push(Region {
            bbox: BoundingBox {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            },
            area,
        });
    }
    regions
}
