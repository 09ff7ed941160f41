//! Structural validation and compilation of pipeline definitions.

use crate::error::{MlError, Result};
use crate::pipeline::types::{ComponentKind, InputBinding, PipelineSpec};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Validate a pipeline and return its task indices in execution order.
///
/// Checks:
/// - At least one task exists
/// - No duplicate task ids
/// - Every component is known and every bound input is declared by it
/// - Required inputs are bound
/// - Parameter and task-output references resolve
/// - The task graph has no cycles
///
/// Among tasks that are ready at the same time, declaration order wins.
pub fn validate(spec: &PipelineSpec) -> Result<Vec<usize>> {
    if spec.tasks.is_empty() {
        return Err(MlError::pipeline(format!(
            "pipeline '{}' must have at least one task",
            spec.name
        )));
    }

    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, task) in spec.tasks.iter().enumerate() {
        if index.insert(task.id.as_str(), i).is_some() {
            return Err(MlError::pipeline(format!("duplicate task id '{}'", task.id)));
        }
    }

    let mut kinds = Vec::with_capacity(spec.tasks.len());
    for task in &spec.tasks {
        let kind = ComponentKind::from_name(&task.component).ok_or_else(|| {
            MlError::pipeline(format!(
                "task '{}' uses unknown component '{}'",
                task.id, task.component
            ))
        })?;
        kinds.push(kind);
    }

    for (task, &kind) in spec.tasks.iter().zip(&kinds) {
        for input in kind.inputs() {
            if input.required && !task.inputs.contains_key(input.name) {
                return Err(MlError::pipeline(format!(
                    "task '{}' is missing required input '{}' of {kind}",
                    task.id, input.name
                )));
            }
        }
        for (name, binding) in &task.inputs {
            if kind.input(name).is_none() {
                return Err(MlError::pipeline(format!(
                    "task '{}' binds unknown input '{name}' of {kind}",
                    task.id
                )));
            }
            match binding {
                InputBinding::Parameter { name: param } if !spec.parameters.contains_key(param) => {
                    return Err(MlError::pipeline(format!(
                        "task '{}' references unknown parameter '{param}'",
                        task.id
                    )));
                }
                InputBinding::TaskOutput {
                    task: upstream,
                    output,
                } => {
                    let &source = index.get(upstream.as_str()).ok_or_else(|| {
                        MlError::pipeline(format!(
                            "task '{}' references unknown task '{upstream}'",
                            task.id
                        ))
                    })?;
                    if !kinds[source].outputs().contains(&output.as_str()) {
                        return Err(MlError::pipeline(format!(
                            "task '{}' references unknown output '{output}' of task '{upstream}'",
                            task.id
                        )));
                    }
                }
                _ => {}
            }
        }
    }

    topological_order(spec, &index)
}

fn topological_order(spec: &PipelineSpec, index: &HashMap<&str, usize>) -> Result<Vec<usize>> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..spec.tasks.len()).map(|i| graph.add_node(i)).collect();
    for (i, task) in spec.tasks.iter().enumerate() {
        for upstream in task.upstream() {
            if let Some(&u) = index.get(upstream) {
                graph.update_edge(nodes[u], nodes[i], ());
            }
        }
    }

    if let Err(cycle) = petgraph::algo::toposort(&graph, None) {
        let task = &spec.tasks[graph[cycle.node_id()]].id;
        return Err(MlError::pipeline(format!(
            "pipeline '{}' has a cycle through task '{task}'",
            spec.name
        )));
    }

    // Kahn's algorithm over the acyclic graph; lowest declaration index first.
    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for dependent in graph.neighbors_directed(nodes[i], Direction::Outgoing) {
            let d = graph[dependent];
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.insert(d);
            }
        }
    }
    Ok(order)
}

/// Validate `spec` and write it to `path` as pretty JSON.
pub fn compile(spec: &PipelineSpec, path: &Path) -> Result<()> {
    validate(spec)?;
    mlplatform_core::persistence::atomic_write_json(path, spec)?;
    tracing::info!(pipeline = %spec.name, path = %path.display(), "Compiled pipeline");
    Ok(())
}
