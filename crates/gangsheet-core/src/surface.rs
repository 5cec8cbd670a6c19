//! Boundary to the interactive render surface.
//!
//! During a gesture the surface owns live node positions; the scene only
//! hears about the settled result. The engine talks to it through
//! [`RenderSurface`] so any retained-mode renderer can sit behind it.

use crate::elements::{Element, ElementId};
use crate::scene::SceneStore;
use kurbo::{Point, Rect};
use uuid::Uuid;

/// Identifier of a node on the surface. Element nodes share their element id.
pub type NodeId = ElementId;

/// Operations the engine needs from a render surface.
pub trait RenderSurface {
    /// Whether a drawable layer exists to host transient nodes.
    fn has_layer(&self) -> bool;

    /// Live position of a node.
    fn node_position(&self, id: NodeId) -> Option<Point>;

    /// Move a node. Returns false for unknown nodes.
    fn set_node_position(&mut self, id: NodeId, position: Point) -> bool;

    /// Bounding box of a node in canvas coordinates.
    fn client_rect(&self, id: NodeId) -> Option<Rect>;

    /// Element nodes currently on the surface, back to front. Transient nodes
    /// are not listed.
    fn node_ids(&self) -> Vec<NodeId>;

    /// Stop any drag running on a node without committing it.
    fn cancel_drag(&mut self, id: NodeId);

    /// Create a transient copy of a node with the given opacity on the same
    /// layer. Returns the clone's id.
    fn spawn_clone(&mut self, id: NodeId, opacity: f64) -> Option<NodeId>;

    /// Hand pointer control to a node.
    fn start_drag(&mut self, id: NodeId) -> bool;

    /// Remove a node. Returns false for unknown nodes.
    fn destroy_node(&mut self, id: NodeId) -> bool;
}

#[derive(Debug, Clone)]
struct Node {
    id: NodeId,
    element: Element,
    opacity: f64,
    transient: bool,
}

/// In-memory surface mirroring a scene's top-level elements.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    nodes: Vec<Node>,
    layer: bool,
    dragging: Option<NodeId>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            layer: true,
            dragging: None,
        }
    }

    /// A surface that has not mounted its layer yet.
    pub fn without_layer() -> Self {
        Self {
            layer: false,
            ..Self::new()
        }
    }

    pub fn from_scene(scene: &SceneStore) -> Self {
        let mut surface = Self::new();
        surface.sync(scene);
        surface
    }

    /// Rebuild element nodes from the scene. Transient nodes survive.
    pub fn sync(&mut self, scene: &SceneStore) {
        self.nodes.retain(|n| n.transient);
        let mut element_nodes: Vec<Node> = scene
            .elements()
            .iter()
            .map(|element| Node {
                id: element.id(),
                element: element.clone(),
                opacity: element.base().opacity,
                transient: false,
            })
            .collect();
        element_nodes.append(&mut self.nodes);
        self.nodes = element_nodes;
    }

    /// Node currently following the pointer.
    pub fn dragging(&self) -> Option<NodeId> {
        self.dragging
    }

    /// Ids of transient nodes, in creation order.
    pub fn transient_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.transient)
            .map(|n| n.id)
            .collect()
    }

    pub fn opacity(&self, id: NodeId) -> Option<f64> {
        self.node(id).map(|n| n.opacity)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }
}

impl RenderSurface for HeadlessSurface {
    fn has_layer(&self) -> bool {
        self.layer
    }

    fn node_position(&self, id: NodeId) -> Option<Point> {
        self.node(id).map(|n| n.element.position())
    }

    fn set_node_position(&mut self, id: NodeId, position: Point) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.element.set_position(position);
                true
            }
            None => false,
        }
    }

    fn client_rect(&self, id: NodeId) -> Option<Rect> {
        self.node(id).map(|n| n.element.bounds())
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| !n.transient)
            .map(|n| n.id)
            .collect()
    }

    fn cancel_drag(&mut self, id: NodeId) {
        if self.dragging == Some(id) {
            self.dragging = None;
        }
    }

    fn spawn_clone(&mut self, id: NodeId, opacity: f64) -> Option<NodeId> {
        if !self.layer {
            return None;
        }
        let source = self.node(id)?;
        let clone_id = Uuid::new_v4();
        let clone = Node {
            id: clone_id,
            element: source.element.clone(),
            opacity,
            transient: true,
        };
        self.nodes.push(clone);
        Some(clone_id)
    }

    fn start_drag(&mut self, id: NodeId) -> bool {
        if self.node(id).is_none() {
            return false;
        }
        self.dragging = Some(id);
        true
    }

    fn destroy_node(&mut self, id: NodeId) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.dragging == Some(id) {
            self.dragging = None;
        }
        self.nodes.len() != before
    }
}
