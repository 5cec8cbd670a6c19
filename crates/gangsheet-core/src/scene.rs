//! Ordered element collection for a document.

use crate::elements::{Element, ElementId, ElementUpdate, Group, ModelError, union_bounds};
use kurbo::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Edge or center to line a set of elements up against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    Left,
    Right,
    Top,
    Bottom,
    CenterH,
    CenterV,
}

/// Axis for even distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Stacking change for a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZOrder {
    Front,
    Back,
    Forward,
    Backward,
}

/// Top-level elements of a document, back to front.
///
/// Every mutation leaves the collection sanitized, so consumers never observe
/// non-finite offsets or empty boxes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneStore {
    elements: Vec<Element>,
}

impl SceneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<Element>) -> Self {
        let mut store = Self::new();
        store.set_elements(elements);
        store
    }

    /// Elements in z-order (back to front).
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Replace the whole collection.
    ///
    /// An element whose ids collide with an earlier one gets fresh ids.
    pub fn set_elements(&mut self, mut next: Vec<Element>) {
        let mut seen = HashSet::new();
        for element in &mut next {
            element.sanitize();
            claim_ids(element, |id| seen.contains(&id));
            seen.extend(element.all_ids());
        }
        self.elements = next;
    }

    /// Append an element on top and return its id. Ids already present in
    /// the scene are replaced with fresh ones.
    pub fn add(&mut self, mut element: Element) -> ElementId {
        self.admit(&mut element);
        let id = element.id();
        self.elements.push(element);
        id
    }

    /// Insert an element at a z-index, clamped to the collection length.
    pub fn insert(&mut self, index: usize, mut element: Element) -> ElementId {
        self.admit(&mut element);
        let id = element.id();
        let index = index.min(self.elements.len());
        self.elements.insert(index, element);
        id
    }

    /// Z-index of a top-level element.
    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| e.id() == id)
    }

    /// Find an element anywhere in the tree.
    pub fn find(&self, id: ElementId) -> Option<&Element> {
        for element in &self.elements {
            if element.id() == id {
                return Some(element);
            }
            if let Element::Group(group) = element {
                if let Some(found) = group.find(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Find a mutable element anywhere in the tree.
    pub fn find_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        for element in &mut self.elements {
            if element.id() == id {
                return Some(element);
            }
            if let Element::Group(group) = element {
                if let Some(found) = group.find_mut(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.find(id).is_some()
    }

    /// Every id in the tree, depth first in z-order.
    pub fn all_ids(&self) -> Vec<ElementId> {
        self.elements.iter().flat_map(|e| e.all_ids()).collect()
    }

    /// Apply patches to the referenced elements. Unknown ids are ignored.
    /// Returns how many patches found their element.
    pub fn update_many(&mut self, updates: &[ElementUpdate]) -> usize {
        let mut applied = 0;
        for update in updates {
            match self.find_mut(update.id) {
                Some(element) => {
                    element.apply_patch(&update.attrs);
                    applied += 1;
                }
                None => log::debug!("update for unknown element {} ignored", update.id),
            }
        }
        applied
    }

    /// Remove elements by id, wherever they sit in the tree.
    /// Returns the removed elements.
    pub fn remove_many(&mut self, ids: &[ElementId]) -> Vec<Element> {
        fn drain(list: &mut Vec<Element>, ids: &[ElementId], removed: &mut Vec<Element>) {
            let mut i = 0;
            while i < list.len() {
                if ids.contains(&list[i].id()) {
                    removed.push(list.remove(i));
                } else {
                    if let Element::Group(group) = &mut list[i] {
                        drain(&mut group.children, ids, removed);
                    }
                    i += 1;
                }
            }
        }

        let mut removed = Vec::new();
        drain(&mut self.elements, ids, &mut removed);
        removed
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Bring an element to the front (topmost).
    pub fn bring_to_front(&mut self, id: ElementId) -> bool {
        match self.index_of(id) {
            Some(pos) if pos + 1 < self.elements.len() => {
                let element = self.elements.remove(pos);
                self.elements.push(element);
                true
            }
            _ => false,
        }
    }

    /// Send an element to the back (bottommost).
    pub fn send_to_back(&mut self, id: ElementId) -> bool {
        match self.index_of(id) {
            Some(pos) if pos > 0 => {
                let element = self.elements.remove(pos);
                self.elements.insert(0, element);
                true
            }
            _ => false,
        }
    }

    /// Move an element one layer forward (towards front).
    /// Returns true if the element was moved, false if already at front.
    pub fn bring_forward(&mut self, id: ElementId) -> bool {
        if let Some(pos) = self.index_of(id) {
            if pos + 1 < self.elements.len() {
                self.elements.swap(pos, pos + 1);
                return true;
            }
        }
        false
    }

    /// Move an element one layer backward (towards back).
    /// Returns true if the element was moved, false if already at back.
    pub fn send_backward(&mut self, id: ElementId) -> bool {
        if let Some(pos) = self.index_of(id) {
            if pos > 0 {
                self.elements.swap(pos, pos - 1);
                return true;
            }
        }
        false
    }

    pub fn reorder(&mut self, id: ElementId, order: ZOrder) -> bool {
        match order {
            ZOrder::Front => self.bring_to_front(id),
            ZOrder::Back => self.send_to_back(id),
            ZOrder::Forward => self.bring_forward(id),
            ZOrder::Backward => self.send_backward(id),
        }
    }

    /// Group top-level elements into a single group and return its id.
    /// The group takes the z-position of the frontmost member.
    pub fn group(&mut self, ids: &[ElementId]) -> Result<ElementId, ModelError> {
        let members: Vec<(usize, Element)> = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| ids.contains(&e.id()))
            .map(|(idx, e)| (idx, e.clone()))
            .collect();
        if members.len() < 2 {
            return Err(ModelError::TooFewMembers(members.len()));
        }

        let front = members.iter().map(|(idx, _)| *idx).max().unwrap_or(0);
        let count = members.len();
        let children: Vec<Element> = members.into_iter().map(|(_, e)| e).collect();
        let group = Group::from_absolute(children)?;
        let group_id = group.base.id;

        self.elements.retain(|e| !ids.contains(&e.id()));
        let insert_at = (front + 1 - count).min(self.elements.len());
        self.elements.insert(insert_at, Element::Group(group));
        Ok(group_id)
    }

    /// Dissolve a top-level group, placing its children at its z-position in
    /// absolute coordinates. Returns the children ids.
    pub fn ungroup(&mut self, group_id: ElementId) -> Result<Vec<ElementId>, ModelError> {
        let pos = self
            .index_of(group_id)
            .filter(|&pos| self.elements[pos].is_group())
            .ok_or(ModelError::NotAGroup(group_id))?;
        let Element::Group(group) = self.elements.remove(pos) else {
            return Err(ModelError::NotAGroup(group_id));
        };
        let mut children = group.ungroup();
        for child in &mut children {
            child.sanitize();
        }
        let child_ids: Vec<ElementId> = children.iter().map(|c| c.id()).collect();
        for (i, child) in children.into_iter().enumerate() {
            self.elements.insert(pos + i, child);
        }
        Ok(child_ids)
    }

    /// Line up top-level elements against the shared edge or center of their
    /// union. Needs at least two unlocked elements; returns how many moved.
    pub fn align(&mut self, ids: &[ElementId], alignment: Alignment) -> usize {
        let targets = self.movable_top_level(ids);
        if targets.len() < 2 {
            return 0;
        }
        let Some(union) = union_bounds(targets.iter().map(|&i| &self.elements[i])) else {
            return 0;
        };

        let mut moved = 0;
        for idx in targets {
            let b = self.elements[idx].bounds();
            let delta = match alignment {
                Alignment::Left => Vec2::new(union.x0 - b.x0, 0.0),
                Alignment::Right => Vec2::new(union.x1 - b.x1, 0.0),
                Alignment::Top => Vec2::new(0.0, union.y0 - b.y0),
                Alignment::Bottom => Vec2::new(0.0, union.y1 - b.y1),
                Alignment::CenterH => Vec2::new(union.center().x - b.center().x, 0.0),
                Alignment::CenterV => Vec2::new(0.0, union.center().y - b.center().y),
            };
            if delta.hypot2() > 0.0 {
                let element = &mut self.elements[idx];
                let position = element.position() + delta;
                element.set_position(position);
                moved += 1;
            }
        }
        moved
    }

    /// Space top-level elements so their centers are evenly spread between
    /// the first and last along an axis. Needs at least three unlocked
    /// elements; returns how many moved.
    pub fn distribute(&mut self, ids: &[ElementId], axis: Axis) -> usize {
        let mut targets = self.movable_top_level(ids);
        if targets.len() < 3 {
            return 0;
        }
        let center_of = |r: Rect| match axis {
            Axis::Horizontal => r.center().x,
            Axis::Vertical => r.center().y,
        };
        let start_of = |r: Rect| match axis {
            Axis::Horizontal => r.x0,
            Axis::Vertical => r.y0,
        };
        targets.sort_by(|&a, &b| {
            start_of(self.elements[a].bounds()).total_cmp(&start_of(self.elements[b].bounds()))
        });

        let first = center_of(self.elements[targets[0]].bounds());
        let last = center_of(self.elements[targets[targets.len() - 1]].bounds());
        let step = (last - first) / (targets.len() - 1) as f64;

        let mut moved = 0;
        for (n, idx) in targets.into_iter().enumerate() {
            let current = center_of(self.elements[idx].bounds());
            let shift = first + n as f64 * step - current;
            if shift != 0.0 {
                let delta = match axis {
                    Axis::Horizontal => Vec2::new(shift, 0.0),
                    Axis::Vertical => Vec2::new(0.0, shift),
                };
                let element = &mut self.elements[idx];
                let position = element.position() + delta;
                element.set_position(position);
                moved += 1;
            }
        }
        moved
    }

    /// Get the bounding box of all elements.
    pub fn bounds(&self) -> Option<Rect> {
        union_bounds(&self.elements)
    }

    fn admit(&self, element: &mut Element) {
        element.sanitize();
        claim_ids(element, |id| self.contains(id));
    }

    fn movable_top_level(&self, ids: &[ElementId]) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| ids.contains(&e.id()) && !e.is_locked())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Regenerate every id of `element` when any of them is taken or repeats
/// inside the element itself.
fn claim_ids(element: &mut Element, taken: impl Fn(ElementId) -> bool) {
    let ids = element.all_ids();
    let mut own = HashSet::with_capacity(ids.len());
    if ids.iter().any(|&id| !own.insert(id) || taken(id)) {
        log::warn!("element {} reuses an existing id, assigning fresh ids", element.id());
        element.regenerate_ids();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ElementPatch, Shape, ShapeKind};
    use kurbo::Point;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Element {
        Element::Shape(Shape::new(ShapeKind::Rectangle, Point::new(x, y), w, h))
    }

    fn store_of(elements: Vec<Element>) -> (SceneStore, Vec<ElementId>) {
        let ids = elements.iter().map(|e| e.id()).collect();
        (SceneStore::from_elements(elements), ids)
    }

    #[test]
    fn test_set_elements_sanitizes() {
        let (store, ids) = store_of(vec![rect(f64::NAN, 1.0, -3.0, 20.0)]);
        let element = store.find(ids[0]).unwrap();
        assert_eq!(element.base().x, 0.0);
        assert!((element.intrinsic_size().unwrap().width - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_add_replaces_colliding_ids() {
        let original = rect(0.0, 0.0, 10.0, 10.0);
        let mut store = SceneStore::new();
        let first = store.add(original.clone());
        let second = store.add(original.clone());
        assert_eq!(first, original.id());
        assert_ne!(second, first);
        assert_eq!(store.index_of(second), Some(1));

        let third = store.insert(0, Element::Group(Group::new(vec![original])));
        let group = store.find(third).unwrap();
        assert!(!group.all_ids().contains(&first));
    }

    #[test]
    fn test_set_elements_keeps_ids_unique() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let (store, ids) = store_of(vec![a.clone(), a.clone()]);
        assert_eq!(ids[0], ids[1]);
        let stored = store.all_ids();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], a.id());
        assert_ne!(stored[1], a.id());
    }

    #[test]
    fn test_update_many_ignores_unknown_ids() {
        let (mut store, ids) = store_of(vec![rect(0.0, 0.0, 10.0, 10.0)]);
        let applied = store.update_many(&[
            ElementUpdate::new(ids[0], ElementPatch::position(5.0, 6.0)),
            ElementUpdate::new(ElementId::new_v4(), ElementPatch::position(1.0, 1.0)),
        ]);
        assert_eq!(applied, 1);
        assert_eq!(store.find(ids[0]).unwrap().position(), Point::new(5.0, 6.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_many_reaches_group_children() {
        let child = rect(0.0, 0.0, 10.0, 10.0);
        let child_id = child.id();
        let mut store = SceneStore::new();
        store.add(Element::Group(Group::new(vec![child])));
        store.update_many(&[ElementUpdate::new(
            child_id,
            ElementPatch {
                rotation: Some(f64::NAN),
                ..Default::default()
            },
        )]);
        assert_eq!(store.find(child_id).unwrap().base().rotation, 0.0);
    }

    #[test]
    fn test_z_order() {
        let (mut store, ids) = store_of(vec![
            rect(0.0, 0.0, 1.0, 1.0),
            rect(0.0, 0.0, 1.0, 1.0),
            rect(0.0, 0.0, 1.0, 1.0),
        ]);
        assert!(store.bring_to_front(ids[0]));
        assert_eq!(store.index_of(ids[0]), Some(2));
        assert!(!store.bring_forward(ids[0]));
        assert!(store.send_to_back(ids[0]));
        assert_eq!(store.index_of(ids[0]), Some(0));
        assert!(store.bring_forward(ids[0]));
        assert_eq!(store.index_of(ids[0]), Some(1));
        assert!(store.send_backward(ids[0]));
        assert!(!store.send_backward(ids[0]));
    }

    #[test]
    fn test_group_and_ungroup_preserve_geometry() {
        let (mut store, ids) = store_of(vec![
            rect(10.0, 10.0, 20.0, 20.0),
            rect(0.0, 0.0, 5.0, 5.0),
            rect(50.0, 60.0, 20.0, 20.0),
        ]);
        let group_id = store.group(&[ids[0], ids[2]]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.index_of(group_id), Some(1));

        let group = store.find(group_id).unwrap();
        let bounds = group.bounds();
        assert!((bounds.x0 - 10.0).abs() < 1e-9);
        assert!((bounds.y1 - 80.0).abs() < 1e-9);

        let child_ids = store.ungroup(group_id).unwrap();
        assert_eq!(child_ids, vec![ids[0], ids[2]]);
        assert_eq!(store.find(ids[2]).unwrap().position(), Point::new(50.0, 60.0));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_group_needs_two_members() {
        let (mut store, ids) = store_of(vec![rect(0.0, 0.0, 1.0, 1.0)]);
        assert_eq!(store.group(&[ids[0]]), Err(ModelError::TooFewMembers(1)));
        assert_eq!(store.ungroup(ids[0]), Err(ModelError::NotAGroup(ids[0])));
    }

    #[test]
    fn test_remove_many_reaches_nested() {
        let child = rect(0.0, 0.0, 1.0, 1.0);
        let child_id = child.id();
        let top = rect(5.0, 5.0, 1.0, 1.0);
        let top_id = top.id();
        let mut store = SceneStore::from_elements(vec![
            top,
            Element::Group(Group::new(vec![child, rect(3.0, 3.0, 1.0, 1.0)])),
        ]);
        let removed = store.remove_many(&[top_id, child_id]);
        assert_eq!(removed.len(), 2);
        assert!(!store.contains(child_id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_align_left_and_center() {
        let (mut store, ids) = store_of(vec![
            rect(10.0, 0.0, 20.0, 20.0),
            rect(40.0, 50.0, 40.0, 20.0),
        ]);
        assert_eq!(store.align(&ids, Alignment::Left), 1);
        assert!((store.find(ids[1]).unwrap().base().x - 10.0).abs() < 1e-9);

        // Union now spans x 10..50, center 30.
        store.align(&ids, Alignment::CenterH);
        let a = store.find(ids[0]).unwrap().bounds();
        let b = store.find(ids[1]).unwrap().bounds();
        assert!((a.center().x - 30.0).abs() < 1e-9);
        assert!((b.center().x - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_align_skips_locked_and_needs_two() {
        let (mut store, ids) =
            store_of(vec![rect(10.0, 0.0, 20.0, 20.0), rect(40.0, 0.0, 20.0, 20.0)]);
        store.find_mut(ids[1]).unwrap().base_mut().locked = true;
        assert_eq!(store.align(&ids, Alignment::Left), 0);
    }

    #[test]
    fn test_distribute_even_centers() {
        let (mut store, ids) = store_of(vec![
            rect(0.0, 0.0, 10.0, 10.0),
            rect(12.0, 0.0, 10.0, 10.0),
            rect(90.0, 0.0, 10.0, 10.0),
        ]);
        assert_eq!(store.distribute(&ids, Axis::Horizontal), 1);
        // Centers 5 and 95, middle goes to 50.
        let middle = store.find(ids[1]).unwrap().bounds();
        assert!((middle.center().x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_distribute_needs_three() {
        let (mut store, ids) =
            store_of(vec![rect(0.0, 0.0, 10.0, 10.0), rect(50.0, 0.0, 10.0, 10.0)]);
        assert_eq!(store.distribute(&ids, Axis::Vertical), 0);
    }
}
