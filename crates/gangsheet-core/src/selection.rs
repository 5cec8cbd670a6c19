//! Selection set, multi-member drag sessions and transform baking.

use crate::elements::{Element, ElementId, ElementPatch, ElementUpdate};
use crate::snap::{GuideStops, Orientation, SnapGuide, line_guide_stops, snap_box};
use crate::surface::RenderSurface;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Ordered, duplicate-free set of selected ids. The first id is the primary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection {
    ids: Vec<ElementId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = ElementId>) -> Self {
        let mut selection = Self::new();
        for id in ids {
            selection.add(id);
        }
        selection
    }

    pub fn ids(&self) -> &[ElementId] {
        &self.ids
    }

    /// The element handles and panels act on.
    pub fn primary(&self) -> Option<ElementId> {
        self.ids.first().copied()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Replace the selection with a single id.
    pub fn select(&mut self, id: ElementId) {
        self.ids.clear();
        self.ids.push(id);
    }

    /// Append an id if it is not already selected.
    pub fn add(&mut self, id: ElementId) {
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    /// Shift-click behaviour: add if absent, remove if present.
    pub fn toggle(&mut self, id: ElementId) {
        if self.ids.contains(&id) {
            self.remove(id);
        } else {
            self.ids.push(id);
        }
    }

    pub fn remove(&mut self, id: ElementId) {
        self.ids.retain(|&i| i != id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Replace the selection, dropping duplicates while keeping order.
    pub fn set(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        *self = Self::from_ids(ids);
    }

    /// Drop ids for which `exists` returns false.
    pub fn retain(&mut self, mut exists: impl FnMut(ElementId) -> bool) {
        self.ids.retain(|&id| exists(id));
    }
}

/// Modifier state for a drag move event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragModifiers {
    /// Constrain the leader to the dominant axis (shift held).
    pub axis_lock: bool,
    /// Snap the leader to guides.
    pub snap: bool,
}

impl Default for DragModifiers {
    fn default() -> Self {
        Self {
            axis_lock: false,
            snap: true,
        }
    }
}

/// State for moving one or more nodes at once.
///
/// Followers are placed at their recorded start plus the leader's delta on
/// every event, so they never drift from accumulated increments.
#[derive(Debug, Clone)]
pub struct DragSession {
    leader: ElementId,
    /// Start position of every member, leader first.
    starts: Vec<(ElementId, Point)>,
    stops: GuideStops,
    snap_distance: f64,
    travelled: f64,
    guides: Vec<SnapGuide>,
}

impl DragSession {
    /// Start dragging `leader`. When the leader is part of a multi-selection
    /// every selected node moves with it.
    pub fn begin(
        surface: &dyn RenderSurface,
        leader: ElementId,
        selection: &Selection,
        canvas: Rect,
        snap_distance: f64,
    ) -> Option<Self> {
        let members: Vec<ElementId> = if selection.len() > 1 && selection.contains(leader) {
            selection.ids().to_vec()
        } else {
            vec![leader]
        };
        Self::with_members(surface, leader, &members, canvas, snap_distance)
    }

    /// Start dragging an explicit set of nodes. Nodes missing from the surface
    /// are left out; a missing leader aborts the session.
    pub fn with_members(
        surface: &dyn RenderSurface,
        leader: ElementId,
        members: &[ElementId],
        canvas: Rect,
        snap_distance: f64,
    ) -> Option<Self> {
        let leader_start = surface.node_position(leader)?;
        let mut starts = vec![(leader, leader_start)];
        for &id in members {
            if id == leader || starts.iter().any(|(m, _)| *m == id) {
                continue;
            }
            if let Some(position) = surface.node_position(id) {
                starts.push((id, position));
            }
        }

        // Moving nodes never act as their own guides.
        let siblings: Vec<Rect> = surface
            .node_ids()
            .into_iter()
            .filter(|id| !starts.iter().any(|(m, _)| m == id))
            .filter_map(|id| surface.client_rect(id))
            .collect();

        Some(Self {
            leader,
            starts,
            stops: line_guide_stops(canvas, siblings),
            snap_distance,
            travelled: 0.0,
            guides: Vec::new(),
        })
    }

    pub fn leader(&self) -> ElementId {
        self.leader
    }

    /// Member ids, leader first.
    pub fn member_ids(&self) -> Vec<ElementId> {
        self.starts.iter().map(|(id, _)| *id).collect()
    }

    pub fn start_of(&self, id: ElementId) -> Option<Point> {
        self.starts.iter().find(|(m, _)| *m == id).map(|(_, p)| *p)
    }

    /// Guides active after the last move.
    pub fn guides(&self) -> &[SnapGuide] {
        &self.guides
    }

    /// Largest leader displacement seen so far.
    pub fn travelled(&self) -> f64 {
        self.travelled
    }

    /// Handle a move event where the leader was dragged to `proposed`.
    /// Returns the leader's settled position for this frame.
    pub fn update(
        &mut self,
        surface: &mut dyn RenderSurface,
        proposed: Point,
        modifiers: DragModifiers,
    ) -> Point {
        let start = self.starts[0].1;
        let mut position = proposed;

        let mut locked = None;
        if modifiers.axis_lock {
            let delta = proposed - start;
            if delta.x.abs() > delta.y.abs() {
                position.y = start.y;
                locked = Some(Orientation::Horizontal);
            } else {
                position.x = start.x;
                locked = Some(Orientation::Vertical);
            }
        }
        surface.set_node_position(self.leader, position);

        self.guides.clear();
        if modifiers.snap {
            if let Some(bounds) = surface.client_rect(self.leader) {
                let result = snap_box(bounds, position, &self.stops, self.snap_distance);
                // A locked axis stays at its start coordinate.
                for guide in result.guides() {
                    if Some(guide.orientation) == locked {
                        continue;
                    }
                    match guide.orientation {
                        Orientation::Vertical => position.x = guide.forced_position(),
                        Orientation::Horizontal => position.y = guide.forced_position(),
                    }
                    self.guides.push(guide);
                }
                surface.set_node_position(self.leader, position);
            }
        }

        let delta = position - start;
        self.travelled = self.travelled.max(delta.hypot());
        for &(id, member_start) in &self.starts[1..] {
            surface.set_node_position(id, member_start + delta);
        }
        position
    }

    /// Current leader delta from its start, read from the surface.
    pub fn delta(&self, surface: &dyn RenderSurface) -> Vec2 {
        surface
            .node_position(self.leader)
            .map(|p| p - self.starts[0].1)
            .unwrap_or(Vec2::ZERO)
    }

    /// End the drag. Returns position updates for every member, or nothing
    /// when the leader never moved past `threshold`.
    pub fn finish(self, surface: &dyn RenderSurface, threshold: f64) -> Vec<ElementUpdate> {
        if self.travelled <= threshold {
            return Vec::new();
        }
        self.starts
            .iter()
            .filter_map(|&(id, _)| {
                surface
                    .node_position(id)
                    .map(|p| ElementUpdate::new(id, ElementPatch::position(p.x, p.y)))
            })
            .collect()
    }

    /// Abort the drag and put every member back where it started.
    pub fn cancel(self, surface: &mut dyn RenderSurface) {
        for (id, start) in self.starts {
            surface.set_node_position(id, start);
        }
    }
}

/// Live transform of a node at the end of a resize/rotate gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveTransform {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

/// Fold a gesture's scale into intrinsic size.
///
/// Leaves get `width = max(min_dimension, width * scale_x)` (likewise for
/// height) and unit scale. Groups have no intrinsic size and keep the scale.
/// Position and rotation always come from the live transform.
pub fn bake_transform(element: &Element, live: &LiveTransform, min_dimension: f64) -> ElementPatch {
    let mut patch = ElementPatch {
        x: Some(live.x),
        y: Some(live.y),
        rotation: Some(live.rotation),
        ..Default::default()
    };
    match element.intrinsic_size() {
        Some(size) => {
            patch.width = Some((size.width * live.scale_x.abs()).max(min_dimension));
            patch.height = Some((size.height * live.scale_y.abs()).max(min_dimension));
            patch.scale_x = Some(1.0);
            patch.scale_y = Some(1.0);
        }
        None => {
            patch.scale_x = Some(live.scale_x);
            patch.scale_y = Some(live.scale_y);
        }
    }
    patch
}
