//! Arena-backed scene
//!
//! [`FlowScene`] keeps nodes in a petgraph `StableDiGraph`, so handles stay
//! valid across deletions of other nodes. Each connection carries an authoring
//! sequence number that orders a parent's children.

use crate::adapter::{SceneAdapter, SceneError};
use crate::handle::{Connection, ConnectionHandle, NodeHandle, PortSide};
use crate::node::{Point, SceneNode};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use treeforge_model::NodeModel;

#[derive(Debug, Clone, Copy)]
struct Link {
    seq: u64,
}

/// In-memory scene
#[derive(Debug, Clone, Default)]
pub struct FlowScene {
    graph: StableDiGraph<SceneNode, Link>,
    next_seq: u64,
}

/// Blob layout: nodes in arena order, links as positions into `nodes`, in
/// authoring order
#[derive(Serialize)]
struct SceneRecordRef<'a> {
    nodes: Vec<&'a SceneNode>,
    links: Vec<[usize; 2]>,
}

#[derive(Deserialize)]
struct SceneRecord {
    nodes: Vec<SceneNode>,
    links: Vec<[usize; 2]>,
}

#[allow(clippy::cast_possible_truncation)]
fn to_handle(index: NodeIndex) -> NodeHandle {
    NodeHandle::from_raw(index.index() as u32)
}

#[allow(clippy::cast_possible_truncation)]
fn to_conn_handle(index: EdgeIndex) -> ConnectionHandle {
    ConnectionHandle::from_raw(index.index() as u32)
}

fn to_index(handle: NodeHandle) -> NodeIndex {
    NodeIndex::new(handle.raw() as usize)
}

fn to_edge_index(handle: ConnectionHandle) -> EdgeIndex {
    EdgeIndex::new(handle.raw() as usize)
}

fn direction(side: PortSide) -> Direction {
    match side {
        PortSide::In => Direction::Incoming,
        PortSide::Out => Direction::Outgoing,
    }
}

impl FlowScene {
    /// Empty scene
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn connection_at(&self, edge: EdgeIndex) -> Option<Connection> {
        let (source, target) = self.graph.edge_endpoints(edge)?;
        Some(Connection {
            id: to_conn_handle(edge),
            parent: to_handle(source),
            child: to_handle(target),
        })
    }
}

impl SceneAdapter for FlowScene {
    fn nodes(&self) -> Vec<NodeHandle> {
        self.graph.node_indices().map(to_handle).collect()
    }

    fn node(&self, node: NodeHandle) -> Option<&SceneNode> {
        self.graph.node_weight(to_index(node))
    }

    fn node_mut(&mut self, node: NodeHandle) -> Option<&mut SceneNode> {
        self.graph.node_weight_mut(to_index(node))
    }

    fn connections(&self, node: NodeHandle, side: PortSide, port: usize) -> Vec<Connection> {
        let index = to_index(node);
        let Some(data) = self.graph.node_weight(index) else {
            return Vec::new();
        };
        if port >= data.port_count(side) {
            return Vec::new();
        }

        let mut links: Vec<(u64, Connection)> = self
            .graph
            .edges_directed(index, direction(side))
            .map(|edge| {
                (
                    edge.weight().seq,
                    Connection {
                        id: to_conn_handle(edge.id()),
                        parent: to_handle(edge.source()),
                        child: to_handle(edge.target()),
                    },
                )
            })
            .collect();
        links.sort_by_key(|(seq, _)| *seq);
        links.into_iter().map(|(_, conn)| conn).collect()
    }

    fn connection(&self, connection: ConnectionHandle) -> Option<Connection> {
        self.connection_at(to_edge_index(connection))
    }

    fn create_node(&mut self, model: NodeModel, position: Point) -> NodeHandle {
        to_handle(self.graph.add_node(SceneNode::new(model, position)))
    }

    fn delete_node(&mut self, node: NodeHandle) -> Result<(), SceneError> {
        self.graph
            .remove_node(to_index(node))
            .map(|_| ())
            .ok_or(SceneError::NodeNotFound(node))
    }

    fn connect(
        &mut self,
        parent: NodeHandle,
        child: NodeHandle,
    ) -> Result<ConnectionHandle, SceneError> {
        let (p, c) = (to_index(parent), to_index(child));
        let parent_data = self.graph.node_weight(p).ok_or(SceneError::NodeNotFound(parent))?;
        let child_data = self.graph.node_weight(c).ok_or(SceneError::NodeNotFound(child))?;

        if parent == child {
            return Err(SceneError::SelfLoop(parent));
        }
        if parent_data.port_count(PortSide::Out) == 0 {
            return Err(SceneError::MissingPort { node: parent, side: PortSide::Out });
        }
        if child_data.port_count(PortSide::In) == 0 {
            return Err(SceneError::MissingPort { node: child, side: PortSide::In });
        }
        if self.graph.find_edge(p, c).is_some() {
            return Err(SceneError::DuplicateConnection { parent, child });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(to_conn_handle(self.graph.add_edge(p, c, Link { seq })))
    }

    fn disconnect(&mut self, connection: ConnectionHandle) -> Result<(), SceneError> {
        self.graph
            .remove_edge(to_edge_index(connection))
            .map(|_| ())
            .ok_or(SceneError::ConnectionNotFound(connection))
    }

    fn set_port_count(
        &mut self,
        node: NodeHandle,
        side: PortSide,
        count: usize,
    ) -> Result<(), SceneError> {
        let index = to_index(node);
        let data = self
            .graph
            .node_weight_mut(index)
            .ok_or(SceneError::NodeNotFound(node))?;
        data.set_port_count(side, count);

        // every connection sits on port 0
        if count == 0 {
            let doomed: Vec<EdgeIndex> = self
                .graph
                .edges_directed(index, direction(side))
                .map(|edge| edge.id())
                .collect();
            for edge in doomed {
                self.graph.remove_edge(edge);
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.graph.clear();
        self.next_seq = 0;
    }

    fn save_to_memory(&self) -> Result<Vec<u8>, SceneError> {
        let position: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .enumerate()
            .map(|(pos, index)| (index, pos))
            .collect();

        let mut links: Vec<(u64, [usize; 2])> = self
            .graph
            .edge_indices()
            .filter_map(|edge| {
                let (source, target) = self.graph.edge_endpoints(edge)?;
                Some((self.graph[edge].seq, [position[&source], position[&target]]))
            })
            .collect();
        links.sort_by_key(|(seq, _)| *seq);

        let record = SceneRecordRef {
            nodes: self.graph.node_indices().map(|index| &self.graph[index]).collect(),
            links: links.into_iter().map(|(_, link)| link).collect(),
        };
        Ok(serde_json::to_vec(&record)?)
    }

    fn load_from_memory(&mut self, blob: &[u8]) -> Result<(), SceneError> {
        let record: SceneRecord = serde_json::from_slice(blob)?;

        let mut graph: StableDiGraph<SceneNode, Link> = StableDiGraph::default();
        let indices: Vec<NodeIndex> = record.nodes.into_iter().map(|n| graph.add_node(n)).collect();

        for (seq, [parent, child]) in record.links.iter().copied().enumerate() {
            let (Some(&p), Some(&c)) = (indices.get(parent), indices.get(child)) else {
                return Err(SceneError::CorruptBlob(format!(
                    "link {seq} references a missing node"
                )));
            };
            if p == c || graph.find_edge(p, c).is_some() {
                return Err(SceneError::CorruptBlob(format!(
                    "link {seq} is a self loop or duplicate"
                )));
            }
            if graph[p].port_count(PortSide::Out) == 0 || graph[c].port_count(PortSide::In) == 0 {
                return Err(SceneError::CorruptBlob(format!(
                    "link {seq} attaches to a missing port"
                )));
            }
            graph.add_edge(p, c, Link { seq: seq as u64 });
        }

        self.next_seq = record.links.len() as u64;
        self.graph = graph;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeforge_model::NodeKind;

    fn model(kind: NodeKind, id: &str) -> NodeModel {
        NodeModel::new(kind, id)
    }

    fn sequence_with_children(scene: &mut FlowScene, n: usize) -> (NodeHandle, Vec<NodeHandle>) {
        let parent = scene.create_node(model(NodeKind::Control, "Sequence"), Point::default());
        let children = (0..n)
            .map(|i| {
                let child = scene.create_node(model(NodeKind::Action, &format!("A{i}")), Point::default());
                scene.connect(parent, child).unwrap();
                child
            })
            .collect();
        (parent, children)
    }

    #[test]
    fn children_follow_authoring_order() {
        let mut scene = FlowScene::new();
        let parent = scene.create_node(model(NodeKind::Control, "Sequence"), Point::default());
        let a = scene.create_node(model(NodeKind::Action, "A"), Point::default());
        let b = scene.create_node(model(NodeKind::Action, "B"), Point::default());
        let c = scene.create_node(model(NodeKind::Action, "C"), Point::default());

        scene.connect(parent, c).unwrap();
        scene.connect(parent, a).unwrap();
        scene.connect(parent, b).unwrap();

        assert_eq!(scene.children(parent), vec![c, a, b]);
        assert_eq!(scene.parent(a), Some(parent));
    }

    #[test]
    fn connect_rejects_bad_wiring() {
        let mut scene = FlowScene::new();
        let root = scene.create_node(model(NodeKind::Root, "Root"), Point::default());
        let leaf = scene.create_node(model(NodeKind::Action, "A"), Point::default());

        assert!(matches!(scene.connect(root, root), Err(SceneError::SelfLoop(_))));
        assert!(matches!(
            scene.connect(leaf, root),
            Err(SceneError::MissingPort { side: PortSide::Out, .. })
        ));
        scene.connect(root, leaf).unwrap();
        assert!(matches!(
            scene.connect(root, leaf),
            Err(SceneError::DuplicateConnection { .. })
        ));
    }

    #[test]
    fn delete_node_drops_its_connections() {
        let mut scene = FlowScene::new();
        let (parent, children) = sequence_with_children(&mut scene, 3);
        scene.delete_node(children[1]).unwrap();

        assert_eq!(scene.children(parent), vec![children[0], children[2]]);
        assert_eq!(scene.edge_count(), 2);
        assert!(matches!(scene.delete_node(children[1]), Err(SceneError::NodeNotFound(_))));
    }

    #[test]
    fn shrinking_ports_prunes_connections() {
        let mut scene = FlowScene::new();
        let (parent, _) = sequence_with_children(&mut scene, 2);
        scene.set_port_count(parent, PortSide::Out, 0).unwrap();
        assert_eq!(scene.edge_count(), 0);
        assert!(scene.children(parent).is_empty());
    }

    #[test]
    fn blob_is_canonical_across_holes() {
        let mut scene = FlowScene::new();
        let (_, children) = sequence_with_children(&mut scene, 3);
        scene.delete_node(children[0]).unwrap();

        let blob = scene.save_to_memory().unwrap();
        let mut restored = FlowScene::new();
        restored.load_from_memory(&blob).unwrap();

        assert_eq!(restored.save_to_memory().unwrap(), blob);
        assert_eq!(restored.node_count(), 3);
        assert_eq!(restored.edge_count(), 2);
    }

    #[test]
    fn corrupt_blob_leaves_scene_untouched() {
        let mut scene = FlowScene::new();
        sequence_with_children(&mut scene, 1);
        let before = scene.save_to_memory().unwrap();

        let bad = br#"{"nodes":[],"links":[[0,1]]}"#;
        assert!(matches!(scene.load_from_memory(bad), Err(SceneError::CorruptBlob(_))));
        assert!(matches!(scene.load_from_memory(b"not json"), Err(SceneError::Blob(_))));
        assert_eq!(scene.save_to_memory().unwrap(), before);
    }
}
