//! Upstream context injection.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::graph::PlanGraph;
use crate::models::Task;

use super::EngineError;

/// Build the `input_context` a task should carry when it becomes ready.
///
/// Starts from the task's current context and adds, keyed by source task
/// key, the output of every inbound `blocks` or `informs` source that has
/// produced non-empty output.
pub fn inject_upstream_context(
    graph: &PlanGraph<'_>,
    task_id: Uuid,
) -> Result<BTreeMap<String, String>, EngineError> {
    let task = graph.task(task_id)?;
    Ok(upstream_context(graph, task))
}

pub(crate) fn upstream_context(graph: &PlanGraph<'_>, task: &Task) -> BTreeMap<String, String> {
    let mut context = task.input_context.clone();
    for source in graph.upstream_of(task) {
        if let Some(output) = source.output.as_deref().filter(|o| !o.is_empty()) {
            context.insert(source.key.clone(), output.to_owned());
        }
    }
    context
}
