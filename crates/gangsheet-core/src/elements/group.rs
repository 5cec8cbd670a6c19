//! Group element for combining multiple elements.

use super::{Element, ElementBase, ElementId, ElementTrait, ModelError, union_bounds};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// A group of elements that is manipulated as a single unit.
/// Children are positioned relative to the group origin and owned exclusively,
/// so the hierarchy is always a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub children: Vec<Element>,
}

impl Group {
    /// Create a group at the origin whose children keep their coordinates.
    pub fn new(children: Vec<Element>) -> Self {
        Self {
            base: ElementBase::new(Point::ZERO),
            children,
        }
    }

    /// Create a group from elements expressed in the parent's coordinates.
    /// The group origin becomes the top-left of their union and children are
    /// re-expressed relative to it.
    pub fn from_absolute(mut children: Vec<Element>) -> Result<Self, ModelError> {
        let origin = union_bounds(&children)
            .map(|r| r.origin())
            .unwrap_or(Point::ZERO);
        let shift = Vec2::new(-origin.x, -origin.y);
        for child in &mut children {
            let position = child.position() + shift;
            child.set_position(position);
        }
        let mut group = Self {
            base: ElementBase::new(origin),
            children: Vec::with_capacity(children.len()),
        };
        for child in children {
            group.try_push(child)?;
        }
        Ok(group)
    }

    /// Get the children of this group.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Add a child, refusing anything that would break the tree shape.
    pub fn try_push(&mut self, child: Element) -> Result<(), ModelError> {
        if child.contains_id(self.base.id) {
            return Err(ModelError::Cycle {
                group: self.base.id,
                child: child.id(),
            });
        }
        let existing = self.all_element_ids();
        if let Some(dup) = child.all_ids().into_iter().find(|id| existing.contains(id)) {
            return Err(ModelError::DuplicateId(dup));
        }
        self.children.push(child);
        Ok(())
    }

    /// Whether [`Group::ungroup`] reproduces every child's placement exactly.
    ///
    /// A child transform only carries rotation and axis scale, so a
    /// non-uniform group scale over a child turned by anything other than a
    /// multiple of 90 degrees would need a skew.
    pub fn folds_exactly(&self) -> bool {
        let uniform = (self.base.scale_x - self.base.scale_y).abs() < FOLD_EPSILON;
        uniform
            || self
                .children
                .iter()
                .all(|child| quarter_turns(child.base().rotation).is_some())
    }

    /// Dissolve this group and return its children in the parent's coordinates.
    ///
    /// Group rotation and scale are folded into each child. When
    /// [`Group::folds_exactly`] is false, the skew a rotated child would
    /// need is dropped: its origin lands exactly but its outline keeps the
    /// closest rotation and axis scale.
    pub fn ungroup(self) -> Vec<Element> {
        if !self.folds_exactly() {
            log::warn!(
                "ungrouping {} approximates rotated children under non-uniform scale",
                self.base.id
            );
        }
        let affine = self.base.affine();
        let Group { base, children } = self;
        children
            .into_iter()
            .map(|mut child| {
                let position = affine * child.position();
                child.set_position(position);
                let child_base = child.base_mut();
                // A child turned a quarter turn sees the group's axes swapped.
                let (sx, sy) = match quarter_turns(child_base.rotation) {
                    Some(turns) if turns % 2 == 1 => (base.scale_y, base.scale_x),
                    _ => (base.scale_x, base.scale_y),
                };
                child_base.rotation += base.rotation;
                child_base.scale_x *= sx;
                child_base.scale_y *= sy;
                child_base.opacity *= base.opacity;
                child
            })
            .collect()
    }

    /// Get all element IDs in this group (including nested groups).
    pub fn all_element_ids(&self) -> Vec<ElementId> {
        let mut ids = vec![self.base.id];
        for child in &self.children {
            ids.extend(child.all_ids());
        }
        ids
    }

    /// Find an element by ID within this group (including nested groups).
    pub fn find(&self, id: ElementId) -> Option<&Element> {
        for child in &self.children {
            if child.id() == id {
                return Some(child);
            }
            if let Element::Group(group) = child {
                if let Some(found) = group.find(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Find a mutable element by ID within this group (including nested groups).
    pub fn find_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        for child in &mut self.children {
            if child.id() == id {
                return Some(child);
            }
            if let Element::Group(group) = child {
                if let Some(found) = group.find_mut(id) {
                    return Some(found);
                }
            }
        }
        None
    }
}

const FOLD_EPSILON: f64 = 1e-9;

/// Number of quarter turns in `degrees`, if it is a whole number of them.
fn quarter_turns(degrees: f64) -> Option<i64> {
    let turns = degrees / 90.0;
    let whole = turns.round();
    ((turns - whole).abs() < FOLD_EPSILON).then(|| (whole as i64).rem_euclid(4))
}

impl ElementTrait for Group {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn intrinsic_size(&self) -> Option<Size> {
        None
    }

    fn set_intrinsic_size(&mut self, _size: Size) {}

    fn bounds(&self) -> Rect {
        let local = union_bounds(&self.children).unwrap_or(Rect::ZERO);
        self.base.affine().transform_rect_bbox(local)
    }
}
