// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency graph and workflow tracking.
//!
//! Every spawned worker gets a node; edges point predecessor → successor.
//! Completion wakes successors whose predecessors are all satisfied, in
//! the order they were registered. A deleted predecessor that never
//! completed counts as failed; a completed-then-cleaned one is pruned from
//! its successors' edges so late cleanup can't wedge the queue.

use fleet_core::{OnComplete, WorkerId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DependencyError {
    #[error("unknown dependency: {0}")]
    MissingDependency(WorkerId),
    #[error("dependency cycle through {0}")]
    Cycle(WorkerId),
    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),
    #[error("unknown workflow task: {0}")]
    UnknownTask(String),
}

#[derive(Debug, Default, Clone)]
struct DepNode {
    predecessors: HashSet<WorkerId>,
    successors: HashSet<WorkerId>,
    on_complete: Option<OnComplete>,
    workflow_id: Option<String>,
    started: bool,
    completed: bool,
    failed: bool,
    /// Set when a predecessor fails, so the grace-then-fail policy still
    /// sees the failure after the predecessor's node is cleaned up.
    dep_failed: bool,
    /// Registration order, the tie-break when several successors wake at once.
    order: u64,
    /// Result of the first completion, replayed on repeat completes.
    completion: Option<Vec<WorkerId>>,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStats {
    pub nodes: usize,
    pub waiting: usize,
    pub ready: usize,
    pub completed: usize,
    pub failed: usize,
    pub workflows: usize,
}

/// Outcome of completing a worker.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Successors that became ready, in registration order.
    pub triggered: Vec<WorkerId>,
    pub on_complete: Option<OnComplete>,
}

#[derive(Debug, Default, Clone)]
struct WorkflowTask {
    depends_on: Vec<String>,
    worker: Option<WorkerId>,
}

#[derive(Debug, Default, Clone)]
struct Workflow {
    tasks: IndexMap<String, WorkflowTask>,
    started: bool,
}

/// Tracks predecessor/successor edges, readiness, and workflow grouping.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<WorkerId, DepNode>,
    workflows: HashMap<String, Workflow>,
    next_order: u64,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker with its dependencies. Validates that every
    /// dependency is known and that the new edges close no cycle.
    /// Re-registering an existing id is a no-op (recovery replay).
    pub fn register(
        &mut self,
        id: WorkerId,
        deps: &[WorkerId],
        on_complete: Option<OnComplete>,
        workflow_id: Option<String>,
    ) -> Result<(), DependencyError> {
        if self.nodes.contains_key(&id) {
            return Ok(());
        }
        for dep in deps {
            if !self.nodes.contains_key(dep) {
                return Err(DependencyError::MissingDependency(dep.clone()));
            }
        }
        if self.would_cycle(&id, deps) {
            return Err(DependencyError::Cycle(id));
        }

        self.next_order += 1;
        let node = DepNode {
            predecessors: deps.iter().cloned().collect(),
            on_complete,
            workflow_id,
            order: self.next_order,
            ..Default::default()
        };
        for dep in deps {
            if let Some(pred) = self.nodes.get_mut(dep) {
                pred.successors.insert(id.clone());
            }
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    /// A worker can start when every remaining predecessor has completed
    /// and none has failed. Predecessors cleaned up after completion are
    /// pruned from the edge set, so absence means satisfied.
    pub fn can_start(&self, id: &WorkerId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return true;
        };
        if node.dep_failed {
            return false;
        }
        node.predecessors.iter().all(|pred| {
            self.nodes.get(pred).map(|p| p.completed).unwrap_or(true)
        })
    }

    pub fn mark_started(&mut self, id: &WorkerId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.started = true;
        }
    }

    /// Mark completed and collect successors that became ready, in
    /// registration order. Repeat completion replays the first result.
    pub fn mark_completed(&mut self, id: &WorkerId) -> Completion {
        let Some(node) = self.nodes.get(id) else {
            return Completion::default();
        };
        if node.completed {
            return Completion {
                triggered: node.completion.clone().unwrap_or_default(),
                on_complete: node.on_complete.clone(),
            };
        }

        let successors: Vec<WorkerId> = node.successors.iter().cloned().collect();
        let on_complete = node.on_complete.clone();
        if let Some(node) = self.nodes.get_mut(id) {
            node.completed = true;
        }

        let mut triggered: Vec<(u64, WorkerId)> = successors
            .into_iter()
            .filter(|succ| {
                self.nodes
                    .get(succ)
                    .map(|n| !n.started && !n.completed && !n.failed)
                    .unwrap_or(false)
                    && self.can_start(succ)
            })
            .map(|succ| (self.nodes[&succ].order, succ))
            .collect();
        triggered.sort_by_key(|(order, _)| *order);
        let triggered: Vec<WorkerId> = triggered.into_iter().map(|(_, id)| id).collect();

        if let Some(node) = self.nodes.get_mut(id) {
            node.completion = Some(triggered.clone());
        }
        Completion { triggered, on_complete }
    }

    /// Mark failed and return the successors now blocked on a failed
    /// predecessor (callers schedule the grace-then-fail policy).
    pub fn mark_failed(&mut self, id: &WorkerId) -> Vec<WorkerId> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Vec::new();
        };
        if node.completed || node.failed {
            return Vec::new();
        }
        node.failed = true;
        let successors: Vec<WorkerId> = node.successors.iter().cloned().collect();
        for succ in &successors {
            if let Some(succ_node) = self.nodes.get_mut(succ) {
                succ_node.dep_failed = true;
            }
        }
        successors
    }

    /// Whether one of the worker's predecessors failed at some point.
    /// Survives cleanup of the failed predecessor's node.
    pub fn has_failed_dependency(&self, id: &WorkerId) -> bool {
        self.nodes.get(id).map(|node| node.dep_failed).unwrap_or(false)
    }

    /// Remove a node. A completed node is pruned from its successors'
    /// predecessor sets (cleanup must not block them); an uncompleted one
    /// is first marked failed and its blocked successors returned so the
    /// caller can schedule the grace-then-fail policy before the node is
    /// gone.
    pub fn remove(&mut self, id: &WorkerId) -> Vec<WorkerId> {
        let was_completed = match self.nodes.get(id) {
            Some(node) => node.completed,
            None => return Vec::new(),
        };
        let blocked = if was_completed { Vec::new() } else { self.mark_failed(id) };

        let Some(node) = self.nodes.remove(id) else {
            return blocked;
        };
        if was_completed {
            for succ in &node.successors {
                if let Some(succ_node) = self.nodes.get_mut(succ) {
                    succ_node.predecessors.remove(id);
                }
            }
        }
        for pred in &node.predecessors {
            if let Some(pred_node) = self.nodes.get_mut(pred) {
                pred_node.successors.remove(id);
            }
        }
        blocked
    }

    /// Ids that are ready to start but not yet started.
    pub fn ready_workers(&self) -> Vec<WorkerId> {
        let mut ready: Vec<(u64, WorkerId)> = self
            .nodes
            .iter()
            .filter(|(id, n)| !n.started && !n.completed && !n.failed && self.can_start(id))
            .map(|(id, n)| (n.order, id.clone()))
            .collect();
        ready.sort_by_key(|(order, _)| *order);
        ready.into_iter().map(|(_, id)| id).collect()
    }

    /// Ids still blocked on incomplete predecessors.
    pub fn waiting_workers(&self) -> Vec<WorkerId> {
        let mut waiting: Vec<(u64, WorkerId)> = self
            .nodes
            .iter()
            .filter(|(id, n)| !n.started && !n.completed && !n.failed && !self.can_start(id))
            .map(|(id, n)| (n.order, id.clone()))
            .collect();
        waiting.sort_by_key(|(order, _)| *order);
        waiting.into_iter().map(|(_, id)| id).collect()
    }

    pub fn stats(&self) -> DependencyStats {
        DependencyStats {
            nodes: self.nodes.len(),
            waiting: self.waiting_workers().len(),
            ready: self.ready_workers().len(),
            completed: self.nodes.values().filter(|n| n.completed).count(),
            failed: self.nodes.values().filter(|n| n.failed).count(),
            workflows: self.workflows.len(),
        }
    }

    pub fn contains(&self, id: &WorkerId) -> bool {
        self.nodes.contains_key(id)
    }

    /// DFS colouring: would adding `id` with edges from `deps` close a cycle?
    fn would_cycle(&self, id: &WorkerId, deps: &[WorkerId]) -> bool {
        // A cycle requires a path from `id` back to one of `deps`. The new
        // node has no successors yet, so only self-dependency can close one
        // directly; transitive cycles would need `id` already reachable,
        // which is impossible for a fresh id. Still check the whole graph so
        // corrupted replays fail closed.
        if deps.contains(id) {
            return true;
        }
        #[derive(Clone, Copy, PartialEq)]
        enum Colour {
            White,
            Grey,
            Black,
        }
        let mut colours: HashMap<&WorkerId, Colour> =
            self.nodes.keys().map(|k| (k, Colour::White)).collect();

        fn visit<'a>(
            graph: &'a DependencyGraph,
            node: &'a WorkerId,
            colours: &mut HashMap<&'a WorkerId, Colour>,
        ) -> bool {
            match colours.get(node) {
                Some(Colour::Grey) => return true,
                Some(Colour::Black) | None => return false,
                Some(Colour::White) => {}
            }
            colours.insert(node, Colour::Grey);
            if let Some(n) = graph.nodes.get(node) {
                for succ in &n.successors {
                    if visit(graph, succ, colours) {
                        return true;
                    }
                }
            }
            colours.insert(node, Colour::Black);
            false
        }

        for dep in deps {
            if visit(self, dep, &mut colours) {
                return true;
            }
        }
        false
    }

    // === Workflow API ===

    /// Create a workflow from (task id, task dependencies) pairs.
    pub fn create_workflow(
        &mut self,
        workflow_id: impl Into<String>,
        tasks: Vec<(String, Vec<String>)>,
    ) -> Result<(), DependencyError> {
        let mut workflow = Workflow::default();
        let names: HashSet<&String> = tasks.iter().map(|(name, _)| name).collect();
        for (name, deps) in &tasks {
            for dep in deps {
                if !names.contains(dep) {
                    return Err(DependencyError::UnknownTask(format!("{name} -> {dep}")));
                }
            }
        }
        for (name, deps) in tasks {
            workflow.tasks.insert(name, WorkflowTask { depends_on: deps, worker: None });
        }
        self.workflows.insert(workflow_id.into(), workflow);
        Ok(())
    }

    /// Start a workflow: returns the initially-ready task ids.
    pub fn start_workflow(&mut self, workflow_id: &str) -> Result<Vec<String>, DependencyError> {
        let workflow = self
            .workflows
            .get_mut(workflow_id)
            .ok_or_else(|| DependencyError::UnknownWorkflow(workflow_id.to_string()))?;
        workflow.started = true;
        Ok(workflow
            .tasks
            .iter()
            .filter(|(_, task)| task.depends_on.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    pub fn register_worker_for_task(
        &mut self,
        workflow_id: &str,
        task_id: &str,
        worker: WorkerId,
    ) -> Result<(), DependencyError> {
        let workflow = self
            .workflows
            .get_mut(workflow_id)
            .ok_or_else(|| DependencyError::UnknownWorkflow(workflow_id.to_string()))?;
        let task = workflow
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DependencyError::UnknownTask(task_id.to_string()))?;
        task.worker = Some(worker);
        Ok(())
    }

    pub fn worker_for_task(
        &self,
        workflow_id: &str,
        task_id: &str,
    ) -> Result<Option<WorkerId>, DependencyError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .ok_or_else(|| DependencyError::UnknownWorkflow(workflow_id.to_string()))?;
        let task = workflow
            .tasks
            .get(task_id)
            .ok_or_else(|| DependencyError::UnknownTask(task_id.to_string()))?;
        Ok(task.worker.clone())
    }

    /// Tasks whose dependency tasks all have completed workers, and which
    /// have no worker assigned yet: the next tasks to dispatch.
    pub fn next_workflow_tasks(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<String>, DependencyError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .ok_or_else(|| DependencyError::UnknownWorkflow(workflow_id.to_string()))?;
        Ok(workflow
            .tasks
            .iter()
            .filter(|(_, task)| task.worker.is_none())
            .filter(|(_, task)| {
                task.depends_on.iter().all(|dep| {
                    workflow
                        .tasks
                        .get(dep)
                        .and_then(|t| t.worker.as_ref())
                        .map(|w| self.nodes.get(w).map(|n| n.completed).unwrap_or(true))
                        .unwrap_or(false)
                })
            })
            .map(|(name, _)| name.clone())
            .collect())
    }
}

#[cfg(test)]
#[path = "deps_tests.rs"]
mod tests;
