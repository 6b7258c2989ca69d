//! Declared gold dependency graph with layered topological sort

use super::targets::GoldTarget;
use crate::errors::{EtlError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Target node in the DAG
#[derive(Debug, Clone)]
pub struct TargetNode {
    pub target: GoldTarget,
    pub dependencies: Vec<GoldTarget>,
}

impl TargetNode {
    pub fn new(target: GoldTarget, dependencies: Vec<GoldTarget>) -> Self {
        Self {
            target,
            dependencies,
        }
    }
}

/// Gold DAG. Targets in the same layer do not depend on each other.
#[derive(Debug, Clone)]
pub struct GoldDag {
    nodes: BTreeMap<GoldTarget, TargetNode>,
    execution_order: Vec<Vec<GoldTarget>>,
}

impl GoldDag {
    /// Create a DAG from node definitions
    pub fn new(nodes: Vec<TargetNode>) -> Result<Self> {
        let mut node_map = BTreeMap::new();
        for node in nodes {
            if node_map.insert(node.target, node.clone()).is_some() {
                return Err(EtlError::graph(format!(
                    "target {} declared twice",
                    node.target
                )));
            }
        }

        for node in node_map.values() {
            for dep in &node.dependencies {
                if !node_map.contains_key(dep) {
                    return Err(EtlError::graph(format!(
                        "target {} depends on undeclared target {}",
                        node.target, dep
                    )));
                }
            }
        }

        let execution_order = Self::topological_sort(&node_map)?;
        Ok(Self {
            nodes: node_map,
            execution_order,
        })
    }

    /// The lake's gold graph
    pub fn default_graph() -> Result<Self> {
        use GoldTarget::*;
        Self::new(vec![
            TargetNode::new(DimProject, vec![]),
            TargetNode::new(DimOrganization, vec![]),
            TargetNode::new(FactFunding, vec![DimOrganization, DimProject]),
            TargetNode::new(DimTime, vec![DimProject]),
            TargetNode::new(DimCountry, vec![DimOrganization]),
            TargetNode::new(DimProgram, vec![]),
            TargetNode::new(BridgeProjectProgram, vec![DimProgram]),
            TargetNode::new(DimTopic, vec![]),
            TargetNode::new(BridgeProjectTopic, vec![DimTopic]),
            TargetNode::new(DimStatus, vec![DimProject]),
            TargetNode::new(BridgeProjectStatus, vec![DimStatus]),
        ])
    }

    /// Kahn's algorithm, one layer per round. Layers are sorted by target
    /// declaration order so the result is deterministic.
    fn topological_sort(
        nodes: &BTreeMap<GoldTarget, TargetNode>,
    ) -> Result<Vec<Vec<GoldTarget>>> {
        let mut in_degree: BTreeMap<GoldTarget, usize> = nodes
            .values()
            .map(|n| (n.target, n.dependencies.len()))
            .collect();

        let mut result = Vec::new();
        let mut processed = BTreeSet::new();

        while processed.len() < nodes.len() {
            let ready: Vec<GoldTarget> = in_degree
                .iter()
                .filter(|(t, &d)| d == 0 && !processed.contains(*t))
                .map(|(&t, _)| t)
                .collect();

            if ready.is_empty() {
                let stuck: Vec<String> = in_degree.keys().map(|t| t.to_string()).collect();
                return Err(EtlError::graph(format!(
                    "cycle detected among: {}",
                    stuck.join(", ")
                )));
            }

            for &target in &ready {
                processed.insert(target);
                in_degree.remove(&target);
                for dependent in nodes.values() {
                    let edges = dependent.dependencies.iter().filter(|d| **d == target).count();
                    if let Some(d) = in_degree.get_mut(&dependent.target) {
                        *d = d.saturating_sub(edges);
                    }
                }
            }
            result.push(ready);
        }

        Ok(result)
    }

    pub fn execution_order(&self) -> &[Vec<GoldTarget>] {
        &self.execution_order
    }

    /// Every target, flattened in execution order
    pub fn ordered(&self) -> Vec<GoldTarget> {
        self.execution_order.iter().flatten().copied().collect()
    }

    /// Only `selected`, in execution order. Dependencies are not added.
    pub fn ordered_subset(&self, selected: &[GoldTarget]) -> Vec<GoldTarget> {
        self.ordered()
            .into_iter()
            .filter(|t| selected.contains(t))
            .collect()
    }

    pub fn dependencies(&self, target: GoldTarget) -> &[GoldTarget] {
        self.nodes
            .get(&target)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Execution plan as text (for logging and the `plan` command)
    pub fn execution_plan(&self) -> String {
        self.execution_order
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                let names: Vec<&str> = layer.iter().map(|t| t.name()).collect();
                format!("Layer {}: {}", i + 1, names.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
