//! Dependency graph builder and ready-set computation.
//!
//! Uses `petgraph` to model step dependencies as a directed graph and detect
//! cycles via topological sort. The resulting [`ExecutionGraph`] answers the
//! two questions the orchestrator asks every round: which steps are ready to
//! dispatch, and which steps can never run because an upstream step failed.

use std::collections::{HashMap, HashSet};

use orchestrion_types::workflow::StepDefinition;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use super::definition::WorkflowError;

/// The dependency structure of one workflow, computed once per execution
/// (cacheable by workflow ID since definitions are immutable).
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    /// Step ID -> IDs it depends on.
    dependencies: HashMap<String, HashSet<String>>,
    /// Step ID -> IDs that directly depend on it.
    dependents: HashMap<String, HashSet<String>>,
    /// Step IDs in topological order, used for deterministic dispatch.
    topo_order: Vec<String>,
}

impl ExecutionGraph {
    /// Build the graph from a workflow's step list.
    ///
    /// Fails with [`WorkflowError::UnknownDependency`] if a step lists a
    /// dependency ID not present in the step list, and with
    /// [`WorkflowError::CycleDetected`] if the edges contain a cycle
    /// (a self-dependency is a one-node cycle).
    pub fn build(steps: &[StepDefinition]) -> Result<Self, WorkflowError> {
        let id_to_idx: HashMap<&str, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        let mut graph = DiGraph::<&str, ()>::new();
        let node_indices: Vec<_> = steps.iter().map(|s| graph.add_node(s.id.as_str())).collect();

        for step in steps {
            let to_idx = id_to_idx[step.id.as_str()];
            for dep in &step.dependencies {
                let from_idx = id_to_idx.get(dep.as_str()).ok_or_else(|| {
                    WorkflowError::UnknownDependency(format!(
                        "step '{}' depends on unknown step '{}'",
                        step.id, dep
                    ))
                })?;
                graph.add_edge(node_indices[*from_idx], node_indices[to_idx], ());
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| {
            let node_id = graph[cycle.node_id()];
            WorkflowError::CycleDetected(format!("cycle detected involving step '{node_id}'"))
        })?;

        let topo_order: Vec<String> = sorted
            .into_iter()
            .map(|idx| graph[idx].to_string())
            .collect();

        let mut dependencies: HashMap<String, HashSet<String>> = HashMap::new();
        let mut dependents: HashMap<String, HashSet<String>> = HashMap::new();
        for step in steps {
            dependencies.insert(step.id.clone(), step.dependencies.iter().cloned().collect());
            dependents.entry(step.id.clone()).or_default();
            for dep in &step.dependencies {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .insert(step.id.clone());
            }
        }

        Ok(Self {
            dependencies,
            dependents,
            topo_order,
        })
    }

    /// Number of steps in the graph.
    pub fn len(&self) -> usize {
        self.topo_order.len()
    }

    /// Whether the graph contains no steps.
    pub fn is_empty(&self) -> bool {
        self.topo_order.is_empty()
    }

    /// The dependency ID set of a step.
    pub fn dependencies_of(&self, step_id: &str) -> Option<&HashSet<String>> {
        self.dependencies.get(step_id)
    }

    /// Steps not yet attempted whose every dependency reached a terminal
    /// success state. Returned in topological order so batches are
    /// dispatched deterministically.
    ///
    /// No two ready steps can depend on each other: such a dependency would
    /// not yet be in `completed`, so the full ready set forms one batch.
    pub fn ready_steps(
        &self,
        attempted: &HashSet<String>,
        completed: &HashSet<String>,
    ) -> Vec<String> {
        self.topo_order
            .iter()
            .filter(|id| {
                !attempted.contains(*id)
                    && self.dependencies[*id].iter().all(|dep| completed.contains(dep))
            })
            .cloned()
            .collect()
    }

    /// The transitive closure of steps that depend on `step_id`, directly or
    /// through intermediate steps. Used to prune the dependents of a failed
    /// step in one pass.
    pub fn transitive_dependents(&self, step_id: &str) -> HashSet<String> {
        let mut reached = HashSet::new();
        let mut stack = vec![step_id];

        while let Some(current) = stack.pop() {
            if let Some(children) = self.dependents.get(current) {
                for child in children {
                    if reached.insert(child.clone()) {
                        stack.push(child.as_str());
                    }
                }
            }
        }
        reached
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
