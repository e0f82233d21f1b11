//! `Dag` — the task dependency graph and its acyclicity validator.
//!
//! Rules enforced:
//! 1. Node names must be unique within the graph (`add_node` rejects a
//!    re-registration).
//! 2. Every edge must reference nodes that already exist.
//! 3. The directed graph must be acyclic — `validate` runs Kahn's algorithm
//!    and accepts iff every node is eventually emitted.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::EngineError;

/// A directed graph of task names. Edges point from an independent node to
/// its dependent (downstream) node.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    downstream: HashMap<String, Vec<String>>,
}

impl Dag {
    pub fn new() -> Self {
        Self {
            downstream: HashMap::new(),
        }
    }

    /// Register a node. Re-registering an existing name is an error.
    pub fn add_node(&mut self, name: impl Into<String>) -> Result<(), EngineError> {
        let name = name.into();
        if self.downstream.contains_key(&name) {
            return Err(EngineError::DuplicateName(name));
        }
        self.downstream.insert(name, Vec::new());
        Ok(())
    }

    /// Create an edge from `independent` to `dependent`. Both must already
    /// be registered nodes.
    pub fn set_downstream(
        &mut self,
        independent: &str,
        dependent: &str,
    ) -> Result<(), EngineError> {
        if !self.downstream.contains_key(independent) {
            return Err(EngineError::UnknownTaskReference {
                task: independent.to_string(),
                side: "from",
            });
        }
        if !self.downstream.contains_key(dependent) {
            return Err(EngineError::UnknownTaskReference {
                task: dependent.to_string(),
                side: "to",
            });
        }
        self.downstream
            .get_mut(independent)
            .unwrap()
            .push(dependent.to_string());
        Ok(())
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.downstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downstream.is_empty()
    }

    /// All node names.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.downstream.keys().map(|s| s.as_str())
    }

    /// Validate acyclicity via Kahn's algorithm. Returns `true` iff a
    /// topological order of all nodes exists.
    pub fn validate(&self) -> bool {
        self.topological_order().is_some()
    }

    /// Topological order of all nodes, or `None` if the graph contains a
    /// cycle.
    pub fn topological_order(&self) -> Option<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for node in self.downstream.keys() {
            in_degree.entry(node.as_str()).or_insert(0);
        }
        for downstream in self.downstream.values() {
            for target in downstream {
                *in_degree.entry(target.as_str()).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&name, _)| name)
            .collect();

        let mut sorted = Vec::with_capacity(self.downstream.len());

        while let Some(node) = queue.pop_front() {
            sorted.push(node.to_owned());
            if let Some(neighbours) = self.downstream.get(node) {
                for neighbour in neighbours {
                    let degree = in_degree.entry(neighbour.as_str()).or_insert(0);
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(neighbour.as_str());
                    }
                }
            }
        }

        if sorted.len() == self.downstream.len() {
            Some(sorted)
        } else {
            None
        }
    }

    /// Immediate upstream nodes of `name`.
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        self.downstream
            .iter()
            .filter_map(|(node, targets)| targets.iter().any(|t| t == name).then(|| node.clone()))
            .collect()
    }

    /// All `(independent, dependent)` edges, in no particular order.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.downstream
            .iter()
            .flat_map(|(node, targets)| targets.iter().map(move |t| (node.clone(), t.clone())))
            .collect()
    }

    /// Nodes with no upstream edges.
    pub fn independent_nodes(&self) -> Vec<String> {
        let with_upstream: HashSet<&str> = self
            .downstream
            .values()
            .flat_map(|targets| targets.iter().map(|t| t.as_str()))
            .collect();

        self.downstream
            .keys()
            .filter(|node| !with_upstream.contains(node.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> Dag {
        let mut dag = Dag::new();
        dag.add_node("a").unwrap();
        dag.add_node("b").unwrap();
        dag.add_node("c").unwrap();
        dag.set_downstream("a", "b").unwrap();
        dag.set_downstream("b", "c").unwrap();
        dag
    }

    #[test]
    fn valid_linear_dag_validates() {
        assert!(linear().validate());
    }

    #[test]
    fn diamond_dag_validates_and_orders_ends_correctly() {
        let mut dag = Dag::new();
        for n in ["a", "b", "c", "d"] {
            dag.add_node(n).unwrap();
        }
        dag.set_downstream("a", "b").unwrap();
        dag.set_downstream("a", "c").unwrap();
        dag.set_downstream("b", "d").unwrap();
        dag.set_downstream("c", "d").unwrap();

        assert!(dag.validate());
        let order = dag.topological_order().unwrap();
        assert_eq!(order.first().unwrap(), "a");
        assert_eq!(order.last().unwrap(), "d");
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut dag = Dag::new();
        dag.add_node("a").unwrap();
        assert!(matches!(
            dag.add_node("a"),
            Err(EngineError::DuplicateName(name)) if name == "a"
        ));
    }

    #[test]
    fn edge_to_missing_node_is_rejected() {
        let mut dag = Dag::new();
        dag.add_node("a").unwrap();
        assert!(matches!(
            dag.set_downstream("a", "ghost"),
            Err(EngineError::UnknownTaskReference { task, .. }) if task == "ghost"
        ));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut dag = Dag::new();
        for n in ["a", "b", "c"] {
            dag.add_node(n).unwrap();
        }
        dag.set_downstream("a", "b").unwrap();
        dag.set_downstream("b", "c").unwrap();
        dag.set_downstream("c", "a").unwrap();
        assert!(!dag.validate());
        assert!(dag.topological_order().is_none());
    }

    #[test]
    fn single_node_no_edges_is_valid() {
        let mut dag = Dag::new();
        dag.add_node("solo").unwrap();
        assert!(dag.validate());
        assert_eq!(dag.independent_nodes(), vec!["solo"]);
    }

    #[test]
    fn dependencies_reports_immediate_upstream() {
        let dag = linear();
        assert_eq!(dag.dependencies("b"), vec!["a"]);
        assert_eq!(dag.dependencies("c"), vec!["b"]);
        assert!(dag.dependencies("a").is_empty());
    }

    #[test]
    fn independent_nodes_reports_roots_only() {
        let mut dag = Dag::new();
        for n in ["a", "b", "c", "d"] {
            dag.add_node(n).unwrap();
        }
        dag.set_downstream("a", "b").unwrap();
        dag.set_downstream("a", "c").unwrap();
        let mut independents = dag.independent_nodes();
        independents.sort();
        assert_eq!(independents, vec!["a", "d"]);
    }
}
