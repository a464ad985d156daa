use crate::types::{BlockId, Workflow};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, VecDeque};

/// Reasons a workflow cannot be ordered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Duplicate block id '{0}'")]
    DuplicateBlock(BlockId),

    #[error("Connection references unknown block '{0}'")]
    UnknownBlock(BlockId),

    #[error("Block '{0}' is connected to itself")]
    SelfLoop(BlockId),

    #[error("Workflow contains cycles or disconnected components (block '{0}' is part of a cycle)")]
    Cycle(BlockId),
}

/// DAG representation of a workflow
pub struct WorkflowDag {
    graph: DiGraph<BlockId, ()>,
    /// Successors per node in connection order, for deterministic ordering
    successors: Vec<Vec<NodeIndex>>,
}

impl WorkflowDag {
    /// Build a DAG from a workflow, validating ids and connections
    pub fn from_workflow(workflow: &Workflow) -> Result<Self, PlanError> {
        let mut graph = DiGraph::new();
        let mut block_indices = HashMap::new();

        // Add all blocks as nodes, in enumeration order
        for block in &workflow.blocks {
            if block_indices.contains_key(&block.id) {
                return Err(PlanError::DuplicateBlock(block.id.clone()));
            }
            let node = graph.add_node(block.id.clone());
            block_indices.insert(block.id.clone(), node);
        }

        let mut successors = vec![Vec::new(); graph.node_count()];
        for connection in &workflow.connections {
            let source = *block_indices
                .get(&connection.source_block_id)
                .ok_or_else(|| PlanError::UnknownBlock(connection.source_block_id.clone()))?;
            let target = *block_indices
                .get(&connection.target_block_id)
                .ok_or_else(|| PlanError::UnknownBlock(connection.target_block_id.clone()))?;

            if source == target {
                return Err(PlanError::SelfLoop(connection.source_block_id.clone()));
            }

            graph.add_edge(source, target, ());
            successors[source.index()].push(target);
        }

        Ok(Self { graph, successors })
    }

    /// Blocks in execution order (Kahn's algorithm, FIFO ready queue).
    ///
    /// Ties go to the block that became ready first; blocks that start ready
    /// keep their enumeration order.
    pub fn execution_order(&self) -> Result<Vec<BlockId>, PlanError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| {
                self.graph
                    .neighbors_directed(n, petgraph::Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(node) = ready.pop_front() {
            order.push(self.graph[node].clone());
            for &next in &self.successors[node.index()] {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() < self.graph.node_count() {
            return Err(PlanError::Cycle(self.cycle_member(&in_degree)));
        }

        Ok(order)
    }

    /// Some block that lies on a cycle
    fn cycle_member(&self, in_degree: &[usize]) -> BlockId {
        let node = match petgraph::algo::toposort(&self.graph, None) {
            Err(cycle) => cycle.node_id(),
            // Only reachable if the two algorithms disagree; any unordered block will do
            Ok(_) => self
                .graph
                .node_indices()
                .find(|n| in_degree[n.index()] > 0)
                .unwrap_or_default(),
        };
        self.graph[node].clone()
    }
}

/// Order the blocks of `workflow` for execution
pub fn plan(workflow: &Workflow) -> Result<Vec<BlockId>, PlanError> {
    WorkflowDag::from_workflow(workflow)?.execution_order()
}
