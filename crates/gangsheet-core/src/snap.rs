//! Guide snapping for dragged elements.
//!
//! Stops are the coordinates a dragged box may lock onto: the canvas edges and
//! center, and the edges and centers of other elements. The dragged box offers
//! three anchors per axis. A guide is the closest stop/anchor pair within the
//! snap distance; at most one vertical and one horizontal guide apply.

use crate::config::SNAP_DISTANCE;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Distance threshold for guide snapping (in canvas units).
pub const SHAPE_SNAP_THRESHOLD: f64 = SNAP_DISTANCE;

/// Direction of a guide line. A vertical guide constrains x, a horizontal
/// guide constrains y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// Which part of the dragged box matched a guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapAnchor {
    Start,
    Center,
    End,
}

/// Candidate stop coordinates per axis, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuideStops {
    /// x coordinates of vertical stops.
    pub vertical: Vec<f64>,
    /// y coordinates of horizontal stops.
    pub horizontal: Vec<f64>,
}

/// An anchor of the dragged box on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapEdge {
    /// Coordinate of the anchor.
    pub guide: f64,
    /// Node position minus the anchor coordinate.
    pub offset: f64,
    pub anchor: SnapAnchor,
}

/// The three anchors of the dragged box on each axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapEdges {
    pub vertical: [SnapEdge; 3],
    pub horizontal: [SnapEdge; 3],
}

/// A matched guide line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapGuide {
    /// Coordinate of the stop that captured the box.
    pub line: f64,
    /// Node position minus the matched anchor.
    pub offset: f64,
    pub orientation: Orientation,
    pub anchor: SnapAnchor,
}

impl SnapGuide {
    /// Node coordinate that puts the anchor exactly on the line.
    pub fn forced_position(&self) -> f64 {
        self.line + self.offset
    }
}

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped node position.
    pub point: Point,
    pub vertical: Option<SnapGuide>,
    pub horizontal: Option<SnapGuide>,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            vertical: None,
            horizontal: None,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        self.vertical.is_some() || self.horizontal.is_some()
    }

    /// Active guides, vertical first.
    pub fn guides(&self) -> Vec<SnapGuide> {
        self.vertical.into_iter().chain(self.horizontal).collect()
    }
}

/// Collect stops from the canvas rectangle and sibling boxes.
///
/// Canvas stops come first (start, center, end). Each sibling contributes its
/// start, end and center. Siblings sticking out of the canvas by more than one
/// unit are not used as stops.
pub fn line_guide_stops(canvas: Rect, siblings: impl IntoIterator<Item = Rect>) -> GuideStops {
    let mut stops = GuideStops::default();
    stops
        .vertical
        .extend([canvas.x0, canvas.x0 + canvas.width() / 2.0, canvas.x1]);
    stops
        .horizontal
        .extend([canvas.y0, canvas.y0 + canvas.height() / 2.0, canvas.y1]);

    let allowed = canvas.inflate(1.0, 1.0);
    for rect in siblings {
        let outside = rect.x0 < allowed.x0
            || rect.y0 < allowed.y0
            || rect.x1 > allowed.x1
            || rect.y1 > allowed.y1;
        if outside {
            continue;
        }
        stops
            .vertical
            .extend([rect.x0, rect.x1, rect.x0 + rect.width() / 2.0]);
        stops
            .horizontal
            .extend([rect.y0, rect.y1, rect.y0 + rect.height() / 2.0]);
    }
    stops
}

/// Anchors of a dragged box. `position` is the node's own origin, which
/// differs from the box corner when the node is rotated or scaled.
pub fn object_snapping_edges(bounds: Rect, position: Point) -> SnapEdges {
    let edge = |guide: f64, origin: f64, anchor| SnapEdge {
        guide,
        offset: origin - guide,
        anchor,
    };
    let cx = bounds.x0 + bounds.width() / 2.0;
    let cy = bounds.y0 + bounds.height() / 2.0;
    SnapEdges {
        vertical: [
            edge(bounds.x0, position.x, SnapAnchor::Start),
            edge(cx, position.x, SnapAnchor::Center),
            edge(bounds.x1, position.x, SnapAnchor::End),
        ],
        horizontal: [
            edge(bounds.y0, position.y, SnapAnchor::Start),
            edge(cy, position.y, SnapAnchor::Center),
            edge(bounds.y1, position.y, SnapAnchor::End),
        ],
    }
}

fn closest(
    stops: &[f64],
    edges: &[SnapEdge; 3],
    distance: f64,
    orientation: Orientation,
) -> Option<SnapGuide> {
    let mut best: Option<(f64, SnapGuide)> = None;
    for &line in stops {
        for edge in edges {
            let diff = (line - edge.guide).abs();
            if diff >= distance {
                continue;
            }
            // Strictly closer only, so the first candidate wins ties.
            if best.map(|(d, _)| diff < d).unwrap_or(true) {
                best = Some((
                    diff,
                    SnapGuide {
                        line,
                        offset: edge.offset,
                        orientation,
                        anchor: edge.anchor,
                    },
                ));
            }
        }
    }
    best.map(|(_, guide)| guide)
}

/// Pick the closest guide per axis within `distance`.
pub fn find_guides(stops: &GuideStops, edges: &SnapEdges, distance: f64) -> Vec<SnapGuide> {
    closest(&stops.vertical, &edges.vertical, distance, Orientation::Vertical)
        .into_iter()
        .chain(closest(
            &stops.horizontal,
            &edges.horizontal,
            distance,
            Orientation::Horizontal,
        ))
        .collect()
}

/// Force a node position onto the given guides.
pub fn apply_guides(position: Point, guides: &[SnapGuide]) -> SnapResult {
    let mut result = SnapResult::none(position);
    for guide in guides {
        match guide.orientation {
            Orientation::Vertical => {
                result.point.x = guide.forced_position();
                result.vertical = Some(*guide);
            }
            Orientation::Horizontal => {
                result.point.y = guide.forced_position();
                result.horizontal = Some(*guide);
            }
        }
    }
    result
}

/// One-shot snap of a dragged box against stops.
pub fn snap_box(bounds: Rect, position: Point, stops: &GuideStops, distance: f64) -> SnapResult {
    let edges = object_snapping_edges(bounds, position);
    let guides = find_guides(stops, &edges, distance);
    apply_guides(position, &guides)
}
