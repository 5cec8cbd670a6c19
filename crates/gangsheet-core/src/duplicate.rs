//! Alt-drag duplication and structural copies.
//!
//! Holding the duplicate modifier while pressing an element leaves the
//! original in place and drags a translucent clone instead. The clone lives
//! only on the render surface until the pointer is released; the scene and
//! history see a single duplication at the drop position.

use crate::cache::ByteCache;
use crate::config::EngineConfig;
use crate::elements::{Element, ElementId};
use crate::selection::{DragModifiers, DragSession, Selection};
use crate::snap::SnapGuide;
use crate::surface::{NodeId, RenderSurface};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the duplicate-drag protocol.
#[derive(Debug, Error, PartialEq)]
pub enum DuplicateDragError {
    #[error("No render layer is available for transient clones")]
    NoRenderLayer,
    #[error("Node {0} is not on the render surface")]
    MissingNode(ElementId),
    #[error("Duplicate drag is no longer active")]
    NotActive,
}

/// Protocol phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateDragState {
    Idle,
    CloneSpawned,
    CloneDragging,
    Committed,
}

/// Where a copy of `source_id` should land.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePlacement {
    pub source_id: ElementId,
    pub x: f64,
    pub y: f64,
}

impl DuplicatePlacement {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// An alt-drag in progress.
#[derive(Debug)]
pub struct DuplicateDrag {
    state: DuplicateDragState,
    /// (source element, transient clone), leader first.
    clones: Vec<(ElementId, NodeId)>,
    session: Option<DragSession>,
    drag_threshold: f64,
}

impl DuplicateDrag {
    /// Start an alt-drag on `pressed`.
    ///
    /// Cancels the original's own drag, spawns a translucent clone for the
    /// pressed element (and for every other selected element when it belongs
    /// to a multi-selection) and starts dragging the leader clone. Fails with
    /// [`DuplicateDragError::NoRenderLayer`] when the surface cannot host
    /// clones; callers fall back to plain selection.
    pub fn begin(
        surface: &mut dyn RenderSurface,
        pressed: ElementId,
        selection: &Selection,
        canvas: Rect,
        config: &EngineConfig,
    ) -> Result<Self, DuplicateDragError> {
        if !surface.has_layer() {
            return Err(DuplicateDragError::NoRenderLayer);
        }
        if surface.node_position(pressed).is_none() {
            return Err(DuplicateDragError::MissingNode(pressed));
        }
        surface.cancel_drag(pressed);

        let mut sources = vec![pressed];
        if selection.len() > 1 && selection.contains(pressed) {
            sources.extend(selection.ids().iter().copied().filter(|&id| id != pressed));
        }

        let mut clones = Vec::with_capacity(sources.len());
        for source in sources {
            match surface.spawn_clone(source, config.clone_opacity) {
                Some(clone) => clones.push((source, clone)),
                None => {
                    for (_, clone) in clones {
                        surface.destroy_node(clone);
                    }
                    return Err(DuplicateDragError::MissingNode(source));
                }
            }
        }

        let leader = clones[0].1;
        surface.start_drag(leader);
        let members: Vec<NodeId> = clones.iter().map(|(_, c)| *c).collect();
        let session =
            DragSession::with_members(&*surface, leader, &members, canvas, config.snap_distance);
        log::debug!("duplicate drag started with {} clone(s)", clones.len());

        Ok(Self {
            state: DuplicateDragState::CloneSpawned,
            clones,
            session,
            drag_threshold: config.drag_threshold,
        })
    }

    pub fn state(&self) -> DuplicateDragState {
        self.state
    }

    /// Transient node that follows the pointer.
    pub fn leader_clone(&self) -> Option<NodeId> {
        self.clones.first().map(|(_, c)| *c)
    }

    pub fn clone_ids(&self) -> Vec<NodeId> {
        self.clones.iter().map(|(_, c)| *c).collect()
    }

    pub fn source_ids(&self) -> Vec<ElementId> {
        self.clones.iter().map(|(s, _)| *s).collect()
    }

    /// Guides active on the leader clone.
    pub fn guides(&self) -> &[SnapGuide] {
        self.session.as_ref().map(|s| s.guides()).unwrap_or(&[])
    }

    /// Move the leader clone. Axis lock and snapping act on the surface only.
    pub fn update(
        &mut self,
        surface: &mut dyn RenderSurface,
        proposed: Point,
        modifiers: DragModifiers,
    ) -> Result<Point, DuplicateDragError> {
        match self.state {
            DuplicateDragState::CloneSpawned | DuplicateDragState::CloneDragging => {}
            _ => return Err(DuplicateDragError::NotActive),
        }
        let session = self.session.as_mut().ok_or(DuplicateDragError::NotActive)?;
        self.state = DuplicateDragState::CloneDragging;
        Ok(session.update(surface, proposed, modifiers))
    }

    /// Release the pointer: read the clones' final positions, destroy them and
    /// return where copies should be created. A drag that never left the
    /// threshold yields no placements.
    pub fn finish(
        &mut self,
        surface: &mut dyn RenderSurface,
    ) -> Result<Vec<DuplicatePlacement>, DuplicateDragError> {
        match self.state {
            DuplicateDragState::CloneSpawned | DuplicateDragState::CloneDragging => {}
            _ => return Err(DuplicateDragError::NotActive),
        }
        let moved = self
            .session
            .take()
            .map(|s| s.travelled() > self.drag_threshold)
            .unwrap_or(false);

        let mut placements = Vec::with_capacity(self.clones.len());
        for &(source_id, clone) in &self.clones {
            if let Some(p) = surface.node_position(clone) {
                placements.push(DuplicatePlacement {
                    source_id,
                    x: p.x,
                    y: p.y,
                });
            }
            surface.destroy_node(clone);
        }
        self.state = DuplicateDragState::Committed;

        if !moved {
            log::debug!("duplicate drag released without movement");
            return Ok(Vec::new());
        }
        Ok(placements)
    }

    /// Abort: destroy the clones and leave the scene untouched.
    pub fn cancel(mut self, surface: &mut dyn RenderSurface) {
        for (_, clone) in self.clones.drain(..) {
            surface.destroy_node(clone);
        }
        self.state = DuplicateDragState::Idle;
    }
}

/// Move inline image bytes of an element tree into the cache so copies can
/// reference them by key.
pub fn share_image_sources(element: &mut Element, cache: &dyn ByteCache) {
    match element {
        Element::Image(image) => {
            image.share_source(cache);
        }
        Element::Group(group) => {
            for child in &mut group.children {
                share_image_sources(child, cache);
            }
        }
        _ => {}
    }
}

/// Deep-copy an element with fresh ids throughout. Image bytes end up shared
/// through the cache rather than copied.
pub fn duplicate_element(source: &mut Element, cache: &dyn ByteCache) -> Element {
    share_image_sources(source, cache);
    let mut copy = source.clone();
    copy.regenerate_ids();
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryByteCache;
    use crate::elements::{Group, Image, ImageFormat, Shape, ShapeKind};
    use crate::scene::SceneStore;
    use crate::surface::HeadlessSurface;

    fn rect(x: f64, y: f64) -> Element {
        Element::Shape(Shape::new(ShapeKind::Rectangle, Point::new(x, y), 40.0, 40.0))
    }

    fn canvas() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 1000.0)
    }

    const FREE: DragModifiers = DragModifiers {
        axis_lock: false,
        snap: false,
    };

    #[test]
    fn test_protocol_phases() {
        let element = rect(100.0, 100.0);
        let id = element.id();
        let scene = SceneStore::from_elements(vec![element]);
        let mut surface = HeadlessSurface::from_scene(&scene);
        let config = EngineConfig::default();

        let mut drag =
            DuplicateDrag::begin(&mut surface, id, &Selection::new(), canvas(), &config).unwrap();
        assert_eq!(drag.state(), DuplicateDragState::CloneSpawned);
        let clone = drag.leader_clone().unwrap();
        assert_eq!(surface.dragging(), Some(clone));
        assert_eq!(surface.opacity(clone), Some(0.6));

        drag.update(&mut surface, Point::new(300.0, 250.0), FREE).unwrap();
        assert_eq!(drag.state(), DuplicateDragState::CloneDragging);
        // The original never moves.
        assert_eq!(surface.node_position(id), Some(Point::new(100.0, 100.0)));

        let placements = drag.finish(&mut surface).unwrap();
        assert_eq!(drag.state(), DuplicateDragState::Committed);
        assert_eq!(
            placements,
            vec![DuplicatePlacement {
                source_id: id,
                x: 300.0,
                y: 250.0
            }]
        );
        assert!(surface.transient_ids().is_empty());
        assert_eq!(drag.finish(&mut surface), Err(DuplicateDragError::NotActive));
    }

    #[test]
    fn test_no_layer_falls_back() {
        let element = rect(0.0, 0.0);
        let id = element.id();
        let mut surface = HeadlessSurface::without_layer();
        surface.sync(&SceneStore::from_elements(vec![element]));
        let err = DuplicateDrag::begin(
            &mut surface,
            id,
            &Selection::new(),
            canvas(),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, DuplicateDragError::NoRenderLayer);
    }

    #[test]
    fn test_multi_selection_clones_follow_leader() {
        let a = rect(100.0, 100.0);
        let b = rect(400.0, 120.0);
        let (ida, idb) = (a.id(), b.id());
        let mut surface = HeadlessSurface::from_scene(&SceneStore::from_elements(vec![a, b]));
        let selection = Selection::from_ids([ida, idb]);

        let mut drag =
            DuplicateDrag::begin(&mut surface, idb, &selection, canvas(), &EngineConfig::default())
                .unwrap();
        assert_eq!(drag.source_ids(), vec![idb, ida]);
        drag.update(&mut surface, Point::new(450.0, 170.0), FREE).unwrap();
        let placements = drag.finish(&mut surface).unwrap();
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[1].source_id, ida);
        assert_eq!(placements[1].position(), Point::new(150.0, 150.0));
    }

    #[test]
    fn test_cancel_destroys_clones() {
        let element = rect(0.0, 0.0);
        let id = element.id();
        let mut surface = HeadlessSurface::from_scene(&SceneStore::from_elements(vec![element]));
        let mut drag = DuplicateDrag::begin(
            &mut surface,
            id,
            &Selection::new(),
            canvas(),
            &EngineConfig::default(),
        )
        .unwrap();
        drag.update(&mut surface, Point::new(50.0, 50.0), FREE).unwrap();
        drag.cancel(&mut surface);
        assert!(surface.transient_ids().is_empty());
        assert_eq!(surface.node_ids(), vec![id]);
    }

    #[test]
    fn test_release_without_movement_yields_nothing() {
        let element = rect(0.0, 0.0);
        let id = element.id();
        let mut surface = HeadlessSurface::from_scene(&SceneStore::from_elements(vec![element]));
        let mut drag = DuplicateDrag::begin(
            &mut surface,
            id,
            &Selection::new(),
            canvas(),
            &EngineConfig::default(),
        )
        .unwrap();
        assert!(drag.finish(&mut surface).unwrap().is_empty());
        assert!(surface.transient_ids().is_empty());
    }

    #[test]
    fn test_duplicate_group_gets_fresh_ids_and_shared_bytes() {
        let cache = MemoryByteCache::new();
        let image = Element::Image(Image::new(Point::ZERO, b"png-bytes", 8, 8, ImageFormat::Png));
        let mut group = Element::Group(Group::new(vec![image, rect(10.0, 10.0)]));
        let original_ids = group.all_ids();

        let copy = duplicate_element(&mut group, &cache);
        let copy_ids = copy.all_ids();
        assert_eq!(copy_ids.len(), original_ids.len());
        assert!(copy_ids.iter().all(|id| !original_ids.contains(id)));

        let original_key = group.as_group().unwrap().children[0]
            .as_image()
            .unwrap()
            .cache_key()
            .map(str::to_owned);
        let copy_key = copy.as_group().unwrap().children[0]
            .as_image()
            .unwrap()
            .cache_key()
            .map(str::to_owned);
        assert!(original_key.is_some());
        assert_eq!(original_key, copy_key);
        assert_eq!(cache.len(), 1);
    }
}
