//! Basic geometry types for button/LED grids.
//!
//! Grid coordinates are integers: column `x` grows rightwards, row `y`
//! grows downwards, and all containment checks are half-open
//! (`origin <= p < origin + size`).

use std::fmt;
use std::ops::{Add, Sub};

/// A point on a button/LED grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The origin point (0, 0).
    pub const ZERO: Self = Self { x: 0, y: 0 };
}

impl Add for Point {
    type Output = Point;

    #[inline]
    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Point;

    #[inline]
    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A grid size in columns and rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub num_cols: i32,
    pub num_rows: i32,
}

impl Size {
    /// Create a new size.
    #[inline]
    pub const fn new(num_cols: i32, num_rows: i32) -> Self {
        Self { num_cols, num_rows }
    }

    /// Create a square size.
    #[inline]
    pub const fn square(side: i32) -> Self {
        Self {
            num_cols: side,
            num_rows: side,
        }
    }

    /// Total number of buttons covered by this size.
    #[inline]
    pub const fn area(&self) -> i32 {
        self.num_cols * self.num_rows
    }
}

impl From<(i32, i32)> for Size {
    fn from((num_cols, num_rows): (i32, i32)) -> Self {
        Self { num_cols, num_rows }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.num_cols, self.num_rows)
    }
}

/// A rectangle on a grid, defined by origin and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub origin: Point,
    pub size: Size,
}

impl Bounds {
    /// Create a new rectangle from origin and size.
    #[inline]
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Create a rectangle of the given size anchored at (0, 0).
    #[inline]
    pub const fn from_size(size: Size) -> Self {
        Self {
            origin: Point::ZERO,
            size,
        }
    }

    /// Check if a point lies within this rectangle (half-open).
    #[inline]
    pub fn contains_point(&self, point: Point) -> bool {
        self.origin.x <= point.x
            && self.origin.y <= point.y
            && point.x < self.origin.x + self.size.num_cols
            && point.y < self.origin.y + self.size.num_rows
    }

    /// Check if another rectangle lies entirely within this one.
    pub fn contains_bounds(&self, other: Bounds) -> bool {
        self.origin.x <= other.origin.x
            && self.origin.y <= other.origin.y
            && other.origin.x + other.size.num_cols <= self.origin.x + self.size.num_cols
            && other.origin.y + other.size.num_rows <= self.origin.y + self.size.num_rows
    }

    /// Iterate over all points in this rectangle, row by row.
    pub fn points(self) -> impl Iterator<Item = Point> {
        let Bounds { origin, size } = self;
        (0..size.num_rows)
            .flat_map(move |y| (0..size.num_cols).map(move |x| Point::new(origin.x + x, origin.y + y)))
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.size, self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(2, 3);
        let b = Point::new(1, 1);
        assert_eq!(a + b, Point::new(3, 4));
        assert_eq!(a - b, Point::new(1, 2));
        assert_eq!(Point::ZERO + a, a);
    }

    #[test]
    fn test_point_equality_is_by_coordinate() {
        assert_eq!(Point::new(5, 7), Point::new(5, 7));
        assert_ne!(Point::new(5, 7), Point::new(7, 5));
    }

    #[test]
    fn test_bounds_contains_point_is_half_open() {
        let bounds = Bounds::new(Point::new(1, 1), Size::new(3, 2));
        assert!(bounds.contains_point(Point::new(1, 1)));
        assert!(bounds.contains_point(Point::new(3, 2)));
        assert!(!bounds.contains_point(Point::new(4, 1)));
        assert!(!bounds.contains_point(Point::new(1, 3)));
        assert!(!bounds.contains_point(Point::new(0, 1)));
    }

    #[test]
    fn test_bounds_contains_bounds() {
        let outer = Bounds::from_size(Size::new(4, 4));
        assert!(outer.contains_bounds(Bounds::new(Point::new(1, 1), Size::new(3, 3))));
        assert!(outer.contains_bounds(outer));
        assert!(!outer.contains_bounds(Bounds::new(Point::new(2, 2), Size::new(3, 3))));
        assert!(!outer.contains_bounds(Bounds::new(Point::new(-1, 0), Size::new(2, 2))));
    }

    #[test]
    fn test_points_iterates_row_major() {
        let bounds = Bounds::new(Point::new(1, 2), Size::new(2, 2));
        let points: Vec<Point> = bounds.points().collect();
        assert_eq!(
            points,
            vec![
                Point::new(1, 2),
                Point::new(2, 2),
                Point::new(1, 3),
                Point::new(2, 3),
            ]
        );
    }

    #[test]
    fn test_size_area() {
        assert_eq!(Size::new(8, 8).area(), 64);
        assert_eq!(Size::square(4).area(), 16);
    }
}
