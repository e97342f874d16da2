//! Task plan produced by the Planner, stored as an arena of nodes keyed by id.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A single task in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: u32,
    #[serde(rename = "task")]
    pub text: String,
    /// Ids of tasks that must be answered before this one.
    #[serde(default)]
    pub subtasks: Vec<u32>,
}

/// Referential integrity violations found after building a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("task graph is empty")]
    Empty,
    #[error("duplicate task id {0}")]
    DuplicateId(u32),
    #[error("task {0} lists itself as a subtask")]
    SelfReference(u32),
    #[error("task {task} references missing subtask {subtask}")]
    MissingSubtask { task: u32, subtask: u32 },
    #[error("subtask cycle through tasks {0:?}")]
    Cycle(Vec<u32>),
}

/// Arena of task nodes addressed by integer id.
///
/// Construct with [`TaskGraph::from_nodes`]; a value of this type has passed
/// [`TaskGraph::check_integrity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGraph {
    nodes: BTreeMap<u32, TaskNode>,
}

#[derive(Serialize, Deserialize)]
struct TaskPlanWire {
    task_graph: Vec<TaskNode>,
}

impl TaskGraph {
    pub fn from_nodes(nodes: Vec<TaskNode>) -> Result<Self, GraphError> {
        let mut arena = BTreeMap::new();
        for node in nodes {
            let id = node.id;
            if arena.insert(id, node).is_some() {
                return Err(GraphError::DuplicateId(id));
            }
        }
        let graph = Self { nodes: arena };
        graph.check_integrity()?;
        Ok(graph)
    }

    /// Verify that every subtask resolves, nothing references itself, and the
    /// subtask relation is acyclic.
    pub fn check_integrity(&self) -> Result<(), GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::Empty);
        }
        for node in self.nodes.values() {
            for &subtask in &node.subtasks {
                if subtask == node.id {
                    return Err(GraphError::SelfReference(node.id));
                }
                if !self.nodes.contains_key(&subtask) {
                    return Err(GraphError::MissingSubtask {
                        task: node.id,
                        subtask,
                    });
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    pub fn get(&self, id: u32) -> Option<&TaskNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    /// Ids of tasks that no other task depends on.
    pub fn roots(&self) -> Vec<u32> {
        let referenced: BTreeSet<u32> = self
            .nodes
            .values()
            .flat_map(|node| node.subtasks.iter().copied())
            .collect();
        self.nodes
            .keys()
            .copied()
            .filter(|id| !referenced.contains(id))
            .collect()
    }

    /// Ids ordered so every subtask precedes the tasks that depend on it.
    ///
    /// Ties are broken by ascending id, so the order is stable.
    pub fn execution_order(&self) -> Vec<u32> {
        // Integrity was checked at construction.
        self.topological_order().unwrap_or_default()
    }

    fn topological_order(&self) -> Result<Vec<u32>, GraphError> {
        let mut pending: BTreeMap<u32, usize> = self
            .nodes
            .values()
            .map(|node| (node.id, node.subtasks.iter().collect::<BTreeSet<_>>().len()))
            .collect();
        let mut dependents: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for node in self.nodes.values() {
            for &subtask in node.subtasks.iter().collect::<BTreeSet<_>>() {
                dependents.entry(subtask).or_default().push(node.id);
            }
        }

        let mut ready: VecDeque<u32> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            for dependent in dependents.get(&id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            let done: BTreeSet<u32> = order.iter().copied().collect();
            let stuck = self
                .nodes
                .keys()
                .copied()
                .filter(|id| !done.contains(id))
                .collect();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }
}

impl Serialize for TaskGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TaskPlanWire {
            task_graph: self.nodes.values().cloned().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TaskGraph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = TaskPlanWire::deserialize(deserializer)?;
        TaskGraph::from_nodes(wire.task_graph).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u32, subtasks: &[u32]) -> TaskNode {
        TaskNode {
            id,
            text: format!("task {id}"),
            subtasks: subtasks.to_vec(),
        }
    }

    #[test]
    fn builds_graph_and_orders_subtasks_first() {
        let graph =
            TaskGraph::from_nodes(vec![task(1, &[2, 3]), task(2, &[3]), task(3, &[])]).expect("graph");
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.roots(), vec![1]);
        assert_eq!(graph.execution_order(), vec![3, 2, 1]);
    }

    #[test]
    fn rejects_missing_subtask() {
        let err = TaskGraph::from_nodes(vec![task(1, &[7])]).unwrap_err();
        assert_eq!(err, GraphError::MissingSubtask { task: 1, subtask: 7 });
    }

    #[test]
    fn rejects_self_reference() {
        let err = TaskGraph::from_nodes(vec![task(1, &[1])]).unwrap_err();
        assert_eq!(err, GraphError::SelfReference(1));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = TaskGraph::from_nodes(vec![task(1, &[]), task(1, &[])]).unwrap_err();
        assert_eq!(err, GraphError::DuplicateId(1));
    }

    #[test]
    fn rejects_cycles() {
        let err =
            TaskGraph::from_nodes(vec![task(1, &[2]), task(2, &[3]), task(3, &[1]), task(4, &[])])
                .unwrap_err();
        assert_eq!(err, GraphError::Cycle(vec![1, 2, 3]));
    }

    #[test]
    fn rejects_empty_plan() {
        assert_eq!(TaskGraph::from_nodes(Vec::new()).unwrap_err(), GraphError::Empty);
    }

    #[test]
    fn deserializes_wire_format_with_integrity_check() {
        let graph: TaskGraph = serde_json::from_str(
            r#"{"task_graph":[{"id":1,"task":"translate","subtasks":[2]},{"id":2,"task":"map keys"}]}"#,
        )
        .expect("parse plan");
        assert_eq!(graph.get(2).map(|n| n.text.as_str()), Some("map keys"));

        let err = serde_json::from_str::<TaskGraph>(
            r#"{"task_graph":[{"id":1,"task":"translate","subtasks":[9]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing subtask 9"));
    }
}
