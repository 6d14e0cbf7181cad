//! Workflow execution: dependency ordering and variable threading.

use crate::dynamic::config::{WorkflowConfig, WorkflowStep};
use crate::dynamic::executor::failure;
use crate::dynamic::generator::RunnerMap;
use crate::dynamic::params::{resolve_parameters, substitute_str};
use crate::error::{ConfigError, ConfigResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Validate a workflow before any tool is generated from it: every
/// dependency names a sibling step, every step task resolves against
/// the runners registered so far, and the step graph is acyclic.
pub fn validate(workflow: &WorkflowConfig, task_exists: impl Fn(&str) -> bool) -> ConfigResult<()> {
    let index: HashMap<&str, usize> = workflow
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| (step.name.as_str(), i))
        .collect();

    for step in &workflow.steps {
        if !task_exists(&step.task) {
            return Err(ConfigError::UnknownStepTask {
                workflow: workflow.name.clone(),
                step: step.name.clone(),
                task: step.task.clone(),
            });
        }
        for dependency in &step.dependencies {
            if !index.contains_key(dependency.as_str()) {
                return Err(ConfigError::UnknownDependency {
                    workflow: workflow.name.clone(),
                    step: step.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    // Colour DFS: grey on the stack, black when done.
    #[derive(Clone, Copy, PartialEq)]
    enum Colour {
        White,
        Grey,
        Black,
    }

    fn visit(
        i: usize,
        steps: &[WorkflowStep],
        index: &HashMap<&str, usize>,
        colours: &mut [Colour],
        workflow_name: &str,
    ) -> ConfigResult<()> {
        match colours[i] {
            Colour::Black => return Ok(()),
            Colour::Grey => {
                return Err(ConfigError::WorkflowCycle {
                    workflow: workflow_name.to_string(),
                    step: steps[i].name.clone(),
                });
            }
            Colour::White => {}
        }
        colours[i] = Colour::Grey;
        for dependency in &steps[i].dependencies {
            if let Some(&dep) = index.get(dependency.as_str()) {
                visit(dep, steps, index, colours, workflow_name)?;
            }
        }
        colours[i] = Colour::Black;
        Ok(())
    }

    let mut colours = vec![Colour::White; workflow.steps.len()];
    for i in 0..workflow.steps.len() {
        visit(i, &workflow.steps, &index, &mut colours, &workflow.name)?;
    }

    Ok(())
}

/// Steps in execution order: depth-first over declarations, each step
/// preceded by its transitive dependencies, revisits skipped.
pub fn topological_order(steps: &[WorkflowStep]) -> Vec<usize> {
    let index: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, step)| (step.name.as_str(), i))
        .collect();

    fn visit(
        i: usize,
        steps: &[WorkflowStep],
        index: &HashMap<&str, usize>,
        visited: &mut [bool],
        order: &mut Vec<usize>,
    ) {
        if visited[i] {
            return;
        }
        visited[i] = true;
        for dependency in &steps[i].dependencies {
            if let Some(&dep) = index.get(dependency.as_str()) {
                visit(dep, steps, index, visited, order);
            }
        }
        order.push(i);
    }

    let mut visited = vec![false; steps.len()];
    let mut order = Vec::with_capacity(steps.len());
    for i in 0..steps.len() {
        visit(i, steps, &index, &mut visited, &mut order);
    }
    order
}

/// Run a workflow to completion or to its first failing step.
///
/// The variable environment starts as the resolved input arguments and
/// accumulates mapped outputs plus each step's whole result under the
/// step's name.
pub async fn execute(workflow: &WorkflowConfig, runners: &RunnerMap, arguments: &Value) -> Value {
    let mut env = match resolve_parameters(&workflow.parameters, arguments) {
        Ok(env) => env,
        Err(e) => return failure(e.to_string()),
    };

    let order = topological_order(&workflow.steps);
    info!("Executing workflow: {}", workflow.name);

    for &i in &order {
        let step = &workflow.steps[i];
        debug!("Executing step: {} (task: {})", step.name, step.task);

        let mut step_params = env.clone();
        for (param_name, template) in &step.input_mapping {
            step_params.insert(
                param_name.clone(),
                Value::String(substitute_str(template, &env)),
            );
        }

        let Some(runner) = runners.get(&step.task).map(|r| Arc::clone(&*r)) else {
            return failure(format!("Task not found: {}", step.task));
        };

        let result = runner.run(Value::Object(step_params)).await;

        if result.get("success").and_then(Value::as_bool) == Some(false) {
            let error = result
                .get("error")
                .cloned()
                .unwrap_or_else(|| Value::String("Unknown error".into()));
            env.insert(step.name.clone(), result);
            return json!({
                "success": false,
                "failed_step": step.name,
                "error": error,
                "step_results": Value::Object(env)
            });
        }

        for (result_key, variable_name) in &step.output_mapping {
            if let Some(value) = result.get(result_key) {
                env.insert(variable_name.clone(), value.clone());
            }
        }
        env.insert(step.name.clone(), result);
    }

    json!({
        "success": true,
        "workflow": workflow.name,
        "steps_executed": order.len(),
        "step_results": Value::Object(env)
    })
}
