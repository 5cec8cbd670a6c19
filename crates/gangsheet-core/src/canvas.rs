//! Canvas document and state management.

use crate::cache::{ByteCache, MemoryByteCache};
use crate::config::EngineConfig;
use crate::duplicate::{
    DuplicateDrag, DuplicateDragError, DuplicatePlacement, duplicate_element, share_image_sources,
};
use crate::elements::{
    Element, ElementId, ElementPatch, ElementUpdate, ModelError, SerializableColor,
};
use crate::error::{EditorError, EditorResult};
use crate::history::{CommitOutcome, History};
use crate::layout::{self, Length, TilingOutcome, TilingRequest};
use crate::scene::{Alignment, Axis, SceneStore, ZOrder};
use crate::selection::{
    DragModifiers, DragSession, LiveTransform, Selection, bake_transform,
};
use crate::snap::SnapGuide;
use crate::surface::RenderSurface;
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

const CM_PER_INCH: f64 = 2.54;

/// Physical setup of a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
    pub dpi: f64,
    pub background: SerializableColor,
}

impl Default for DocumentSettings {
    /// A4 portrait at 300 DPI.
    fn default() -> Self {
        Self {
            width: 2480.0,
            height: 3508.0,
            dpi: 300.0,
            background: SerializableColor::white(),
        }
    }
}

impl DocumentSettings {
    /// Sheet of `width_cm` x `height_cm` at `dpi`.
    pub fn from_cm(width_cm: f64, height_cm: f64, dpi: f64) -> Self {
        Self {
            width: Self::cm_to_px_at(width_cm, dpi),
            height: Self::cm_to_px_at(height_cm, dpi),
            dpi,
            ..Default::default()
        }
    }

    pub fn cm_to_px_at(cm: f64, dpi: f64) -> f64 {
        cm / CM_PER_INCH * dpi
    }

    pub fn cm_to_px(&self, cm: f64) -> f64 {
        Self::cm_to_px_at(cm, self.dpi)
    }

    pub fn px_to_cm(&self, px: f64) -> f64 {
        if self.dpi <= 0.0 {
            return 0.0;
        }
        px / self.dpi * CM_PER_INCH
    }

    pub fn canvas_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Distance kept from the sheet edge by [`Placement`] edges.
pub const EDGE_PADDING: f64 = 20.0;

/// Spot on the sheet to move an element to. Edges keep [`EDGE_PADDING`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Placement {
    /// Top-left corner for a box of `size` currently at `current`. Axes the
    /// placement says nothing about keep their coordinate.
    pub fn resolve(self, current: Point, size: Size, settings: &DocumentSettings) -> Point {
        let left = EDGE_PADDING;
        let right = settings.width - size.width - EDGE_PADDING;
        let top = EDGE_PADDING;
        let bottom = settings.height - size.height - EDGE_PADDING;
        let center = Point::new(
            (settings.width - size.width) / 2.0,
            (settings.height - size.height) / 2.0,
        );
        match self {
            Placement::Center => center,
            Placement::Top => Point::new(current.x, top),
            Placement::Bottom => Point::new(current.x, bottom),
            Placement::Left => Point::new(left, current.y),
            Placement::Right => Point::new(right, current.y),
            Placement::TopLeft => Point::new(left, top),
            Placement::TopRight => Point::new(right, top),
            Placement::BottomLeft => Point::new(left, bottom),
            Placement::BottomRight => Point::new(right, bottom),
        }
    }
}

/// A canvas document: sheet settings, elements, selection and history.
///
/// Every settled mutation records exactly one history entry. Gestures in
/// progress (drags, alt-drag clones) only touch the render surface until they
/// are released.
pub struct CanvasDocument {
    /// Unique document identifier.
    pub id: String,
    /// Document name.
    pub name: String,
    pub settings: DocumentSettings,
    scene: SceneStore,
    selection: Selection,
    history: History,
    cache: Arc<dyn ByteCache>,
    config: EngineConfig,
    drag: Option<DragSession>,
    duplicate_drag: Option<DuplicateDrag>,
}

impl fmt::Debug for CanvasDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasDocument")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("elements", &self.scene.len())
            .field("selection", &self.selection)
            .field("history", &self.history.len())
            .finish()
    }
}

impl Default for CanvasDocument {
    fn default() -> Self {
        Self::new(DocumentSettings::default())
    }
}

impl CanvasDocument {
    /// Create an empty document with its own cache.
    pub fn new(settings: DocumentSettings) -> Self {
        Self::with_cache(
            settings,
            Arc::new(MemoryByteCache::new()),
            EngineConfig::default(),
        )
    }

    /// Create an empty document sharing `cache`.
    pub fn with_cache(
        settings: DocumentSettings,
        cache: Arc<dyn ByteCache>,
        config: EngineConfig,
    ) -> Self {
        let mut doc = Self {
            id: Uuid::new_v4().to_string(),
            name: "Untitled".to_string(),
            settings,
            scene: SceneStore::new(),
            selection: Selection::new(),
            history: History::new(config.history_capacity),
            cache,
            config,
            drag: None,
            duplicate_drag: None,
        };
        doc.history.reset(doc.scene.elements(), doc.selection.ids());
        doc
    }

    /// Replace the contents wholesale, e.g. after loading. History restarts
    /// from the loaded state.
    pub fn load_elements(&mut self, elements: Vec<Element>) {
        self.scene.set_elements(elements);
        self.selection.clear();
        self.history.reset(self.scene.elements(), self.selection.ids());
    }

    pub fn scene(&self) -> &SceneStore {
        &self.scene
    }

    pub fn elements(&self) -> &[Element] {
        self.scene.elements()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn cache(&self) -> &Arc<dyn ByteCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.scene.find(id)
    }

    /// Record the current state as a history entry.
    pub fn commit(&mut self) -> CommitOutcome {
        self.history.commit(self.scene.elements(), self.selection.ids())
    }

    /// Undo the last change.
    /// Returns true if undo was performed, false if nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(snapshot.elements, snapshot.selection);
                true
            }
            None => false,
        }
    }

    /// Redo the last undone change.
    /// Returns true if redo was performed, false if nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(snapshot.elements, snapshot.selection);
                true
            }
            None => false,
        }
    }

    // The replayed state goes through the regular commit path, which swallows
    // the suppress flag set by undo/redo.
    fn restore(&mut self, elements: Vec<Element>, selection: Vec<ElementId>) {
        self.scene.set_elements(elements);
        self.selection.set(selection);
        let outcome = self.commit();
        debug_assert_eq!(outcome, CommitOutcome::Suppressed);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Add an element on top, select it and commit.
    pub fn add_element(&mut self, mut element: Element) -> ElementId {
        share_image_sources(&mut element, self.cache.as_ref());
        let id = self.scene.add(element);
        self.selection.select(id);
        self.commit();
        id
    }

    /// Apply attribute patches. Commits once if anything changed.
    pub fn update_many(&mut self, updates: &[ElementUpdate]) -> usize {
        let applied = self.scene.update_many(updates);
        if applied > 0 {
            self.commit();
        }
        applied
    }

    /// Replace every element and commit.
    pub fn set_elements(&mut self, elements: Vec<Element>) {
        self.scene.set_elements(elements);
        self.prune_selection();
        self.commit();
    }

    /// Delete elements, or the selection when `ids` is empty.
    pub fn delete(&mut self, ids: &[ElementId]) -> EditorResult<usize> {
        let targets: Vec<ElementId> = if ids.is_empty() {
            self.selection.ids().to_vec()
        } else {
            ids.to_vec()
        };
        if targets.is_empty() {
            return Err(EditorError::EmptySelection);
        }
        if let Some(&missing) = targets.iter().find(|&&id| !self.scene.contains(id)) {
            return Err(EditorError::MissingTarget(missing));
        }
        let removed = self.scene.remove_many(&targets);
        self.prune_selection();
        self.commit();
        Ok(removed.len())
    }

    /// Replace the selection. Unknown ids are dropped. Selection changes alone
    /// are not recorded in history.
    pub fn select(&mut self, ids: &[ElementId]) {
        self.selection.set(ids.iter().copied().filter(|&id| self.scene.contains(id)));
    }

    fn prune_selection(&mut self) {
        let scene = &self.scene;
        self.selection.retain(|id| scene.contains(id));
    }

    fn require_selection(&self) -> EditorResult<Vec<ElementId>> {
        if self.selection.is_empty() {
            return Err(EditorError::EmptySelection);
        }
        Ok(self.selection.ids().to_vec())
    }

    /// Group top-level elements, or the selection when `ids` is empty. The
    /// group becomes the selection.
    pub fn group(&mut self, ids: &[ElementId]) -> EditorResult<ElementId> {
        let ids = self.targets(ids)?;
        let group_id = self.scene.group(&ids)?;
        self.selection.select(group_id);
        self.commit();
        Ok(group_id)
    }

    /// Dissolve a group. Its children become the selection.
    pub fn ungroup(&mut self, group_id: ElementId) -> EditorResult<Vec<ElementId>> {
        if !self.scene.contains(group_id) {
            return Err(EditorError::MissingTarget(group_id));
        }
        let children = self.scene.ungroup(group_id)?;
        self.selection.set(children.iter().copied());
        self.commit();
        Ok(children)
    }

    /// Dissolve every selected group.
    pub fn ungroup_selected(&mut self) -> EditorResult<Vec<ElementId>> {
        let groups: Vec<ElementId> = self
            .require_selection()?
            .into_iter()
            .filter(|&id| {
                self.scene.index_of(id).is_some()
                    && self.scene.find(id).is_some_and(Element::is_group)
            })
            .collect();
        let Some(&first) = groups.first() else {
            let primary = self.selection.primary().unwrap_or_default();
            return Err(ModelError::NotAGroup(primary).into());
        };
        if groups.len() == 1 {
            return self.ungroup(first);
        }

        let mut released = Vec::new();
        for id in groups {
            released.extend(self.scene.ungroup(id)?);
        }
        self.selection.set(released.iter().copied());
        self.commit();
        Ok(released)
    }

    /// Align `ids`, or the selection when empty.
    pub fn align(&mut self, ids: &[ElementId], alignment: Alignment) -> EditorResult<usize> {
        let targets = self.targets(ids)?;
        let moved = self.scene.align(&targets, alignment);
        if moved > 0 {
            self.commit();
        }
        Ok(moved)
    }

    /// Distribute `ids`, or the selection when empty.
    pub fn distribute(&mut self, ids: &[ElementId], axis: Axis) -> EditorResult<usize> {
        let targets = self.targets(ids)?;
        let moved = self.scene.distribute(&targets, axis);
        if moved > 0 {
            self.commit();
        }
        Ok(moved)
    }

    pub fn reorder(&mut self, id: ElementId, order: ZOrder) -> EditorResult<bool> {
        if self.scene.index_of(id).is_none() {
            return Err(EditorError::MissingTarget(id));
        }
        let moved = self.scene.reorder(id, order);
        if moved {
            self.commit();
        }
        Ok(moved)
    }

    /// Remove every element. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.scene.len();
        if removed > 0 {
            self.scene.clear();
            self.selection.clear();
            self.commit();
        }
        removed
    }

    /// Move an element (or the primary selection) to a spot on the sheet.
    pub fn place(&mut self, id: Option<ElementId>, placement: Placement) -> EditorResult<()> {
        let id = self.target(id)?;
        let element = self.scene.find(id).ok_or(EditorError::MissingTarget(id))?;
        let size = element.scaled_size();
        let current = element.position();
        let position = placement.resolve(current, size, &self.settings);
        let patch = ElementPatch::position(position.x, position.y);
        self.update_many(&[ElementUpdate::new(id, patch)]);
        Ok(())
    }

    /// Resize an element (or the primary selection) to a displayed size.
    ///
    /// With one dimension the other follows the current aspect. The size is
    /// expressed through scale so the intrinsic dimensions stay intact.
    pub fn resize(
        &mut self,
        id: Option<ElementId>,
        width: Option<Length>,
        height: Option<Length>,
    ) -> EditorResult<bool> {
        let id = self.target(id)?;
        let element = self.scene.find(id).ok_or(EditorError::MissingTarget(id))?;
        let size = element.scaled_size();
        if size.width <= 0.0 || size.height <= 0.0 {
            return Ok(false);
        }

        let width = width.map(|w| w.to_px(&self.settings));
        let height = height.map(|h| h.to_px(&self.settings));
        for value in [width, height].into_iter().flatten() {
            if !value.is_finite() || value <= 0.0 {
                return Err(EditorError::InvalidLength(value));
            }
        }
        let (target_w, target_h) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, size.height * w / size.width),
            (None, Some(h)) => (size.width * h / size.height, h),
            (None, None) => return Ok(false),
        };

        let base = element.base();
        let patch = ElementPatch {
            scale_x: Some(base.scale_x * target_w / size.width),
            scale_y: Some(base.scale_y * target_h / size.height),
            ..Default::default()
        };
        Ok(self.update_many(&[ElementUpdate::new(id, patch)]) > 0)
    }

    fn target(&self, id: Option<ElementId>) -> EditorResult<ElementId> {
        let id = id
            .or_else(|| self.selection.primary())
            .ok_or(EditorError::EmptySelection)?;
        if !self.scene.contains(id) {
            return Err(EditorError::MissingTarget(id));
        }
        Ok(id)
    }

    fn targets(&self, ids: &[ElementId]) -> EditorResult<Vec<ElementId>> {
        if ids.is_empty() {
            return self.require_selection();
        }
        if let Some(&missing) = ids.iter().find(|&&id| !self.scene.contains(id)) {
            return Err(EditorError::MissingTarget(missing));
        }
        Ok(ids.to_vec())
    }

    /// Start dragging `leader` on the surface. Selected peers follow it.
    pub fn begin_drag(
        &mut self,
        surface: &dyn RenderSurface,
        leader: ElementId,
    ) -> EditorResult<()> {
        if self.scene.find(leader).is_some_and(Element::is_locked) {
            log::debug!("element {leader} is locked, drag ignored");
            return Ok(());
        }
        let session = DragSession::begin(
            surface,
            leader,
            &self.selection,
            self.settings.canvas_rect(),
            self.config.snap_distance,
        )
        .ok_or(EditorError::MissingTarget(leader))?;
        self.drag = Some(session);
        Ok(())
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_guides(&self) -> &[SnapGuide] {
        self.drag.as_ref().map(|d| d.guides()).unwrap_or(&[])
    }

    /// Pointer move during a drag. Returns the leader's final position.
    pub fn drag_move(
        &mut self,
        surface: &mut dyn RenderSurface,
        proposed: Point,
        modifiers: DragModifiers,
    ) -> EditorResult<Point> {
        let session = self.drag.as_mut().ok_or(EditorError::NoActiveDrag)?;
        Ok(session.update(surface, proposed, modifiers))
    }

    /// Release the drag: write every member's position and commit once.
    pub fn end_drag(&mut self, surface: &dyn RenderSurface) -> EditorResult<usize> {
        let session = self.drag.take().ok_or(EditorError::NoActiveDrag)?;
        let updates = session.finish(surface, self.config.drag_threshold);
        Ok(self.update_many(&updates))
    }

    /// Abort the drag and put the nodes back.
    pub fn cancel_drag(&mut self, surface: &mut dyn RenderSurface) -> EditorResult<()> {
        let session = self.drag.take().ok_or(EditorError::NoActiveDrag)?;
        session.cancel(surface);
        Ok(())
    }

    /// Bake the live transforms of a resize/rotate gesture into the elements.
    pub fn end_transform(
        &mut self,
        transforms: &[(ElementId, LiveTransform)],
    ) -> EditorResult<usize> {
        let mut updates = Vec::with_capacity(transforms.len());
        for (id, live) in transforms {
            let element = self.scene.find(*id).ok_or(EditorError::MissingTarget(*id))?;
            let patch = bake_transform(element, live, self.config.min_dimension);
            updates.push(ElementUpdate::new(*id, patch));
        }
        Ok(self.update_many(&updates))
    }

    /// Start an alt-drag duplicate on `pressed`.
    ///
    /// Returns `Ok(false)` when the surface has no layer for clones; the
    /// element is then selected as after a plain click.
    pub fn begin_duplicate_drag(
        &mut self,
        surface: &mut dyn RenderSurface,
        pressed: ElementId,
    ) -> EditorResult<bool> {
        if !self.scene.contains(pressed) {
            return Err(EditorError::MissingTarget(pressed));
        }
        let canvas = self.settings.canvas_rect();
        match DuplicateDrag::begin(surface, pressed, &self.selection, canvas, &self.config) {
            Ok(drag) => {
                self.duplicate_drag = Some(drag);
                Ok(true)
            }
            Err(DuplicateDragError::NoRenderLayer) => {
                log::warn!("no render layer for duplicate drag, selecting {pressed} instead");
                if !self.selection.contains(pressed) {
                    self.selection.select(pressed);
                }
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn duplicate_drag(&self) -> Option<&DuplicateDrag> {
        self.duplicate_drag.as_ref()
    }

    pub fn duplicate_drag_move(
        &mut self,
        surface: &mut dyn RenderSurface,
        proposed: Point,
        modifiers: DragModifiers,
    ) -> EditorResult<Point> {
        let drag = self.duplicate_drag.as_mut().ok_or(EditorError::NoActiveDrag)?;
        Ok(drag.update(surface, proposed, modifiers)?)
    }

    /// Release an alt-drag: copies land where the clones were dropped.
    pub fn end_duplicate_drag(
        &mut self,
        surface: &mut dyn RenderSurface,
    ) -> EditorResult<Vec<ElementId>> {
        let mut drag = self.duplicate_drag.take().ok_or(EditorError::NoActiveDrag)?;
        let placements = drag.finish(surface)?;
        if placements.is_empty() {
            return Ok(Vec::new());
        }
        self.duplicate_at(&placements)
    }

    pub fn cancel_duplicate_drag(&mut self, surface: &mut dyn RenderSurface) -> EditorResult<()> {
        let drag = self.duplicate_drag.take().ok_or(EditorError::NoActiveDrag)?;
        drag.cancel(surface);
        Ok(())
    }

    /// Deep-copy elements to explicit positions. Copies are appended on top,
    /// become the selection and are committed as one entry.
    pub fn duplicate_at(
        &mut self,
        placements: &[DuplicatePlacement],
    ) -> EditorResult<Vec<ElementId>> {
        if placements.is_empty() {
            return Err(EditorError::EmptySelection);
        }
        if let Some(missing) = placements.iter().find(|p| !self.scene.contains(p.source_id)) {
            return Err(EditorError::MissingTarget(missing.source_id));
        }

        let mut copies = Vec::with_capacity(placements.len());
        for placement in placements {
            let Some(source) = self.scene.find_mut(placement.source_id) else {
                continue;
            };
            let mut copy = duplicate_element(source, self.cache.as_ref());
            copy.set_position(placement.position());
            copies.push(copy);
        }

        let ids: Vec<ElementId> = copies.into_iter().map(|copy| self.scene.add(copy)).collect();
        self.selection.set(ids.iter().copied());
        self.commit();
        Ok(ids)
    }

    /// Copy every selected top-level element, offset by the configured
    /// distance, each copy directly above its original.
    pub fn duplicate_selection(&mut self) -> EditorResult<Vec<ElementId>> {
        let ids = self.require_selection()?;
        let offset = Vec2::new(self.config.duplicate_offset, self.config.duplicate_offset);

        let mut copies = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(index) = self.scene.index_of(id) else {
                log::debug!("selected element {id} is not top-level, not duplicated");
                continue;
            };
            let Some(source) = self.scene.find_mut(id) else {
                continue;
            };
            let mut copy = duplicate_element(source, self.cache.as_ref());
            copy.set_position(copy.position() + offset);
            let copy_id = self.scene.insert(index + 1, copy);
            copies.push(copy_id);
        }
        if copies.is_empty() {
            return Err(EditorError::EmptySelection);
        }
        self.selection.set(copies.iter().copied());
        self.commit();
        Ok(copies)
    }

    /// Fill a footprint with copies of one element. Commits once and selects
    /// the source.
    pub fn tile(&mut self, request: &TilingRequest) -> EditorResult<TilingOutcome> {
        let outcome = layout::tile(
            &mut self.scene,
            self.selection.primary(),
            &self.settings,
            request,
            self.config.min_print_dpi,
            self.cache.as_ref(),
        )?;
        self.selection.select(outcome.source_id);
        self.commit();
        Ok(outcome)
    }
}

/// Open documents with one of them active.
pub struct Workspace {
    documents: Vec<CanvasDocument>,
    active: Option<usize>,
    cache: Arc<dyn ByteCache>,
    config: EngineConfig,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Workspace {
    /// A workspace whose documents share one byte cache.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_cache(Arc::new(MemoryByteCache::new()), config)
    }

    pub fn with_cache(cache: Arc<dyn ByteCache>, config: EngineConfig) -> Self {
        Self {
            documents: Vec::new(),
            active: None,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ByteCache> {
        &self.cache
    }

    /// Open a new empty document and make it active. Returns its id.
    pub fn create_document(
        &mut self,
        name: impl Into<String>,
        settings: DocumentSettings,
    ) -> String {
        let mut doc =
            CanvasDocument::with_cache(settings, Arc::clone(&self.cache), self.config.clone());
        doc.name = name.into();
        self.open(doc)
    }

    /// Add an existing document and make it active.
    pub fn open(&mut self, document: CanvasDocument) -> String {
        let id = document.id.clone();
        self.documents.push(document);
        self.active = Some(self.documents.len() - 1);
        log::debug!("document {id} opened");
        id
    }

    pub fn documents(&self) -> impl Iterator<Item = &CanvasDocument> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CanvasDocument> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CanvasDocument> {
        self.documents.iter_mut().find(|d| d.id == id)
    }

    pub fn active(&self) -> Option<&CanvasDocument> {
        self.active.and_then(|i| self.documents.get(i))
    }

    pub fn active_mut(&mut self) -> Option<&mut CanvasDocument> {
        self.active.and_then(|i| self.documents.get_mut(i))
    }

    pub fn set_active(&mut self, id: &str) -> bool {
        match self.documents.iter().position(|d| d.id == id) {
            Some(index) => {
                self.active = Some(index);
                true
            }
            None => false,
        }
    }

    /// Close a document. The previous document becomes active when the active
    /// one is closed.
    pub fn close(&mut self, id: &str) -> Option<CanvasDocument> {
        let index = self.documents.iter().position(|d| d.id == id)?;
        let doc = self.documents.remove(index);
        self.active = match self.active {
            _ if self.documents.is_empty() => None,
            Some(active) if active > index => Some(active - 1),
            Some(active) if active == index => Some(index.saturating_sub(1)),
            other => other,
        };
        Some(doc)
    }
}
