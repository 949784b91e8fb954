use crate::types::{TaskNode, TaskSpec, TaskStatus};
use foreman_core::{ForemanError, ForemanResult};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A dependency DAG of tasks with a precomputed deterministic execution order.
///
/// Built once from a [`TaskSpec`]; afterwards only the per-node status moves,
/// through the transition operations below. Nodes are never removed, so
/// terminal states remain queryable for audit.
#[derive(Debug)]
pub struct TaskGraph {
    spec_id: String,
    title: String,
    nodes: HashMap<String, TaskNode>,
    /// Topological order over all node ids, smallest-id-first among ties.
    execution_order: Vec<String>,
}

impl TaskGraph {
    /// Build the graph and compute its execution order via Kahn's algorithm.
    ///
    /// The ready set is kept sorted and the lexicographically smallest id is
    /// removed at each step, so the order is reproducible across runs and
    /// platforms. Construction fails with [`ForemanError::CycleDetected`]
    /// when the order cannot cover every node; the error names the entire
    /// unresolved remainder (the cycle plus everything downstream of it).
    pub fn build(spec: &TaskSpec) -> ForemanResult<Self> {
        let mut nodes: HashMap<String, TaskNode> = HashMap::with_capacity(spec.tasks.len());
        for entry in &spec.tasks {
            let node = TaskNode::from_entry(entry);
            if nodes.insert(node.id.clone(), node).is_some() {
                return Err(ForemanError::Graph(format!(
                    "duplicate task id '{}' in spec '{}'",
                    entry.task_id, spec.spec_id
                )));
            }
        }

        // Every referenced dependency must exist.
        for node in nodes.values() {
            for dep in &node.depends_on {
                if !nodes.contains_key(dep) {
                    return Err(ForemanError::Graph(format!(
                        "task '{}' depends on unknown task '{dep}'",
                        node.id
                    )));
                }
            }
        }

        // Kahn's algorithm. dependents is the reverse adjacency: dep -> ids
        // waiting on it.
        let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in nodes.values() {
            in_degree.insert(node.id.as_str(), node.depends_on.len());
            for dep in &node.depends_on {
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(node.id.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut execution_order = Vec::with_capacity(nodes.len());
        while let Some(id) = ready.pop_first() {
            execution_order.push(id.to_string());
            for waiting in dependents.get(id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(deg) = in_degree.get_mut(waiting) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(waiting);
                    }
                }
            }
        }

        if execution_order.len() < nodes.len() {
            let ordered: BTreeSet<&str> =
                execution_order.iter().map(String::as_str).collect();
            let unresolved: Vec<String> = nodes
                .keys()
                .filter(|id| !ordered.contains(id.as_str()))
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            return Err(ForemanError::CycleDetected { unresolved });
        }

        Ok(Self {
            spec_id: spec.spec_id.clone(),
            title: spec.title.clone(),
            nodes,
            execution_order,
        })
    }

    /// The id of the specification this graph was built from.
    pub fn spec_id(&self) -> &str {
        &self.spec_id
    }

    /// The title of the specification.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The precomputed topological order over all task ids.
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Look up a node by id.
    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    /// Iterate all nodes in execution order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.execution_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
    }

    /// Total number of tasks.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when every task has reached a terminal status.
    pub fn is_done(&self) -> bool {
        self.nodes.values().all(|n| n.status.is_terminal())
    }

    /// Every task that could be dispatched right now: status Pending or
    /// Ready, with all dependencies Complete. Returned in execution order.
    pub fn get_ready_tasks(&self) -> Vec<&TaskNode> {
        self.tasks()
            .filter(|node| {
                matches!(node.status, TaskStatus::Pending | TaskStatus::Ready)
                    && self.deps_complete(node)
            })
            .collect()
    }

    fn deps_complete(&self, node: &TaskNode) -> bool {
        node.depends_on.iter().all(|dep| {
            self.nodes
                .get(dep)
                .is_some_and(|d| d.status == TaskStatus::Complete)
        })
    }

    /// Mark a task Complete and promote any dependents whose dependencies are
    /// now all Complete.
    ///
    /// Returns the ids of the newly unblocked tasks, in execution order.
    /// Unknown ids and tasks already in a terminal state are a no-op that
    /// returns an empty list; callers must not treat the empty result as
    /// failure.
    pub fn mark_complete(&mut self, id: &str) -> Vec<String> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Vec::new();
        };
        if !node.status.can_transition_to(TaskStatus::Complete) {
            return Vec::new();
        }
        node.status = TaskStatus::Complete;
        debug!(task = id, "task complete");

        // Promote Pending dependents whose last dependency just landed.
        let mut unblocked = Vec::new();
        for candidate_id in &self.execution_order {
            let Some(candidate) = self.nodes.get(candidate_id) else {
                continue;
            };
            if candidate.status != TaskStatus::Pending {
                continue;
            }
            if !candidate.depends_on.iter().any(|d| d == id) {
                continue;
            }
            if self.deps_complete(candidate) {
                unblocked.push(candidate_id.clone());
            }
        }
        for unblocked_id in &unblocked {
            if let Some(node) = self.nodes.get_mut(unblocked_id) {
                node.status = TaskStatus::Ready;
                debug!(task = %unblocked_id, "task unblocked");
            }
        }
        unblocked
    }

    /// Mark a task InProgress. Returns false for unknown ids and for
    /// transitions the status table rejects.
    pub fn mark_in_progress(&mut self, id: &str) -> bool {
        self.transition(id, TaskStatus::InProgress)
    }

    /// Mark a task Blocked. Returns false for unknown ids and for
    /// transitions the status table rejects.
    pub fn mark_blocked(&mut self, id: &str) -> bool {
        self.transition(id, TaskStatus::Blocked)
    }

    fn transition(&mut self, id: &str, next: TaskStatus) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if !node.status.can_transition_to(next) {
            debug!(task = id, from = %node.status, to = %next, "transition rejected");
            return false;
        }
        node.status = next;
        debug!(task = id, to = %next, "task transition");
        true
    }

    /// Bucket task ids by dependency depth, ascending.
    ///
    /// Depth 0 holds tasks with no dependencies; depth n holds tasks whose
    /// deepest dependency sits at depth n-1. Each bucket is safe to execute
    /// concurrently once all earlier buckets are Complete. Buckets are
    /// sorted lexicographically for reproducibility.
    pub fn get_parallel_groups(&self) -> Vec<Vec<String>> {
        let mut depth: HashMap<&str, usize> = HashMap::with_capacity(self.nodes.len());
        // execution_order guarantees dependencies are visited first.
        for id in &self.execution_order {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let d = node
                .depends_on
                .iter()
                .filter_map(|dep| depth.get(dep.as_str()))
                .max()
                .map_or(0, |max| max + 1);
            depth.insert(id.as_str(), d);
        }

        let group_count = depth.values().max().map_or(0, |max| max + 1);
        let mut groups: Vec<Vec<String>> = vec![Vec::new(); group_count];
        for id in &self.execution_order {
            if let Some(d) = depth.get(id.as_str()) {
                groups[*d].push(id.clone());
            }
        }
        for group in &mut groups {
            group.sort();
        }
        groups
    }
}
