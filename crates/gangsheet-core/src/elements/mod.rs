//! Element definitions for the composition canvas.

mod group;
mod image;
mod shape;
mod text;

pub use group::Group;
pub use image::{Image, ImageFormat, ImageSource};
pub use shape::{Shape, ShapeKind};
pub use text::{Text, TextAlign};

use kurbo::{Affine, Point, Rect, Size};
use peniko::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Replacement for a missing or non-positive width/height.
pub const DEFAULT_DIMENSION: f64 = 100.0;

/// Errors raised by structural changes to the element tree.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Element {child} cannot be placed inside group {group}: it would create a cycle")]
    Cycle { group: ElementId, child: ElementId },
    #[error("Element id {0} appears more than once")]
    DuplicateId(ElementId),
    #[error("Element {0} is not a group")]
    NotAGroup(ElementId),
    #[error("A group needs at least two elements, found {0}")]
    TooFewMembers(usize),
}

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

fn default_scale() -> f64 {
    1.0
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

/// Attributes shared by every element kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBase {
    pub id: ElementId,
    /// Top-left position in the parent's coordinate space.
    pub x: f64,
    pub y: f64,
    /// Rotation in degrees around the top-left corner.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_scale")]
    pub scale_x: f64,
    #[serde(default = "default_scale")]
    pub scale_y: f64,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

impl ElementBase {
    /// Create attributes for a new element at the given position.
    pub fn new(position: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            x: position.x,
            y: position.y,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            visible: true,
            locked: false,
            name: None,
            opacity: 1.0,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Local-to-parent transform: translate, then rotate, then scale.
    pub fn affine(&self) -> Affine {
        Affine::translate((self.x, self.y))
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }

    fn sanitize(&mut self) {
        if !self.x.is_finite() {
            self.x = 0.0;
        }
        if !self.y.is_finite() {
            self.y = 0.0;
        }
        if !self.rotation.is_finite() {
            self.rotation = 0.0;
        }
        if !self.scale_x.is_finite() {
            self.scale_x = 1.0;
        }
        if !self.scale_y.is_finite() {
            self.scale_y = 1.0;
        }
        self.opacity = if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }

    fn is_finite(&self) -> bool {
        [self.x, self.y, self.rotation, self.scale_x, self.scale_y, self.opacity]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Common behaviour of every element kind.
pub trait ElementTrait {
    fn base(&self) -> &ElementBase;

    fn base_mut(&mut self) -> &mut ElementBase;

    /// Unscaled width/height. `None` for containers, whose extent comes from children.
    fn intrinsic_size(&self) -> Option<Size>;

    /// Replace the unscaled width/height. Containers ignore this.
    fn set_intrinsic_size(&mut self, size: Size);

    /// Axis-aligned bounding box in the parent's coordinate space.
    fn bounds(&self) -> Rect {
        let size = self.intrinsic_size().unwrap_or(Size::ZERO);
        self.base()
            .affine()
            .transform_rect_bbox(Rect::from_origin_size(Point::ZERO, size))
    }

    fn id(&self) -> ElementId {
        self.base().id
    }
}

/// Partial attribute update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl ElementPatch {
    /// Patch that only moves an element.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A patch addressed to one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementUpdate {
    pub id: ElementId,
    pub attrs: ElementPatch,
}

impl ElementUpdate {
    pub fn new(id: ElementId, attrs: ElementPatch) -> Self {
        Self { id, attrs }
    }
}

/// Enum wrapper for all element kinds (for serialization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Image(Image),
    Shape(Shape),
    Text(Text),
    Group(Group),
}

impl Element {
    pub fn id(&self) -> ElementId {
        self.base().id
    }

    pub fn base(&self) -> &ElementBase {
        match self {
            Element::Image(e) => e.base(),
            Element::Shape(e) => e.base(),
            Element::Text(e) => e.base(),
            Element::Group(e) => e.base(),
        }
    }

    pub fn base_mut(&mut self) -> &mut ElementBase {
        match self {
            Element::Image(e) => e.base_mut(),
            Element::Shape(e) => e.base_mut(),
            Element::Text(e) => e.base_mut(),
            Element::Group(e) => e.base_mut(),
        }
    }

    pub fn intrinsic_size(&self) -> Option<Size> {
        match self {
            Element::Image(e) => e.intrinsic_size(),
            Element::Shape(e) => e.intrinsic_size(),
            Element::Text(e) => e.intrinsic_size(),
            Element::Group(e) => e.intrinsic_size(),
        }
    }

    pub fn set_intrinsic_size(&mut self, size: Size) {
        match self {
            Element::Image(e) => e.set_intrinsic_size(size),
            Element::Shape(e) => e.set_intrinsic_size(size),
            Element::Text(e) => e.set_intrinsic_size(size),
            Element::Group(e) => e.set_intrinsic_size(size),
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Element::Image(e) => e.bounds(),
            Element::Shape(e) => e.bounds(),
            Element::Text(e) => e.bounds(),
            Element::Group(e) => e.bounds(),
        }
    }

    /// Width/height after scale, ignoring rotation.
    pub fn scaled_size(&self) -> Size {
        match self.intrinsic_size() {
            Some(size) => {
                let base = self.base();
                Size::new(size.width * base.scale_x, size.height * base.scale_y)
            }
            None => self.bounds().size(),
        }
    }

    pub fn position(&self) -> Point {
        self.base().position()
    }

    pub fn set_position(&mut self, position: Point) {
        let base = self.base_mut();
        base.x = position.x;
        base.y = position.y;
    }

    pub fn name(&self) -> Option<&str> {
        self.base().name.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.base().locked
    }

    /// Check if this element is a group.
    pub fn is_group(&self) -> bool {
        matches!(self, Element::Group(_))
    }

    /// Get the group if this element is a group.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Element::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Get the mutable group if this element is a group.
    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Element::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Check if this element is an image.
    pub fn is_image(&self) -> bool {
        matches!(self, Element::Image(_))
    }

    /// Get the image if this element is an image.
    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Element::Image(img) => Some(img),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut Image> {
        match self {
            Element::Image(img) => Some(img),
            _ => None,
        }
    }

    /// Give this element and every descendant a fresh identifier.
    /// Used when duplicating or pasting so copies never alias the original.
    pub fn regenerate_ids(&mut self) {
        self.base_mut().id = Uuid::new_v4();
        if let Element::Group(group) = self {
            for child in &mut group.children {
                child.regenerate_ids();
            }
        }
    }

    /// Whether this element or any descendant has the given id.
    pub fn contains_id(&self, id: ElementId) -> bool {
        if self.id() == id {
            return true;
        }
        match self {
            Element::Group(group) => group.children.iter().any(|c| c.contains_id(id)),
            _ => false,
        }
    }

    /// Ids of this element and all descendants, depth first.
    pub fn all_ids(&self) -> Vec<ElementId> {
        match self {
            Element::Group(group) => group.all_element_ids(),
            _ => vec![self.id()],
        }
    }

    /// Replace non-finite offsets/rotation/scale and non-positive sizes with
    /// safe defaults, recursing into group children.
    pub fn sanitize(&mut self) {
        self.base_mut().sanitize();
        if let Some(size) = self.intrinsic_size() {
            let fix = |v: f64| {
                if v.is_finite() && v > 0.0 {
                    v
                } else {
                    DEFAULT_DIMENSION
                }
            };
            let fixed = Size::new(fix(size.width), fix(size.height));
            if fixed != size {
                self.set_intrinsic_size(fixed);
            }
        }
        if let Element::Group(group) = self {
            for child in &mut group.children {
                child.sanitize();
            }
        }
    }

    /// First id in this subtree carrying a non-finite numeric attribute.
    pub fn find_non_finite(&self) -> Option<ElementId> {
        let size_ok = self
            .intrinsic_size()
            .map(|s| s.width.is_finite() && s.height.is_finite())
            .unwrap_or(true);
        if !self.base().is_finite() || !size_ok {
            return Some(self.id());
        }
        match self {
            Element::Group(group) => group.children.iter().find_map(|c| c.find_non_finite()),
            _ => None,
        }
    }

    /// Apply a partial update, then sanitize.
    pub fn apply_patch(&mut self, patch: &ElementPatch) {
        {
            let base = self.base_mut();
            if let Some(x) = patch.x {
                base.x = x;
            }
            if let Some(y) = patch.y {
                base.y = y;
            }
            if let Some(rotation) = patch.rotation {
                base.rotation = rotation;
            }
            if let Some(scale_x) = patch.scale_x {
                base.scale_x = scale_x;
            }
            if let Some(scale_y) = patch.scale_y {
                base.scale_y = scale_y;
            }
            if let Some(visible) = patch.visible {
                base.visible = visible;
            }
            if let Some(locked) = patch.locked {
                base.locked = locked;
            }
            if let Some(name) = &patch.name {
                base.name = Some(name.clone());
            }
            if let Some(opacity) = patch.opacity {
                base.opacity = opacity;
            }
        }
        if patch.width.is_some() || patch.height.is_some() {
            if let Some(size) = self.intrinsic_size() {
                self.set_intrinsic_size(Size::new(
                    patch.width.unwrap_or(size.width),
                    patch.height.unwrap_or(size.height),
                ));
            }
        }
        self.sanitize();
    }
}

/// Sanitize every element of a collection in place.
pub fn sanitize_elements(elements: &mut [Element]) {
    for element in elements {
        element.sanitize();
    }
}

/// Union of the bounding boxes of a set of elements.
pub fn union_bounds<'a>(elements: impl IntoIterator<Item = &'a Element>) -> Option<Rect> {
    elements.into_iter().fold(None, |acc, element| {
        let bounds = element.bounds();
        Some(match acc {
            Some(r) => r.union(bounds),
            None => bounds,
        })
    })
}
