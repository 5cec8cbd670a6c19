//! Vector shape element.

use super::{ElementBase, ElementTrait, SerializableColor};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Outline of a vector shape, fitted into its width/height box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Ellipse,
    Star,
    Polygon,
    Line,
    Arrow,
}

/// A filled and/or stroked vector shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    #[serde(flatten)]
    pub base: ElementBase,
    pub kind: ShapeKind,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub fill: Option<SerializableColor>,
    #[serde(default)]
    pub stroke: Option<SerializableColor>,
    #[serde(default)]
    pub stroke_width: f64,
    /// Corner radius (0 = sharp corners). Only meaningful for rectangles.
    #[serde(default)]
    pub corner_radius: f64,
}

impl Shape {
    /// Default stroke width for new shapes.
    pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

    pub fn new(kind: ShapeKind, position: Point, width: f64, height: f64) -> Self {
        Self {
            base: ElementBase::new(position),
            kind,
            width,
            height,
            fill: None,
            stroke: Some(SerializableColor::black()),
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
            corner_radius: 0.0,
        }
    }

    /// Create a rectangle from two corner points.
    pub fn rectangle_from_corners(p1: Point, p2: Point) -> Self {
        let min = Point::new(p1.x.min(p2.x), p1.y.min(p2.y));
        Self::new(
            ShapeKind::Rectangle,
            min,
            (p2.x - p1.x).abs(),
            (p2.y - p1.y).abs(),
        )
    }

    pub fn with_fill(mut self, fill: SerializableColor) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_stroke(mut self, stroke: SerializableColor, width: f64) -> Self {
        self.stroke = Some(stroke);
        self.stroke_width = width;
        self
    }
}

impl ElementTrait for Shape {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn intrinsic_size(&self) -> Option<Size> {
        Some(Size::new(self.width, self.height))
    }

    fn set_intrinsic_size(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }
}
