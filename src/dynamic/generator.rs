//! Tool synthesis: turns task and workflow configurations into
//! registered MCP tools.

use crate::dynamic::config::{DynamicConfig, TaskConfig, TaskParameter, WorkflowConfig};
use crate::dynamic::executor::{failure, ExecutorSet, TaskExecutor};
use crate::dynamic::params::{json_schema_type, resolve_parameters, substitute_value};
use crate::dynamic::workflow;
use crate::error::{ConfigError, ConfigResult, Result};
use crate::protocol::Tool;
use crate::registry::{Registry, ToolHandler};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// A callable task or workflow, invocable by name from workflow steps.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, arguments: Value) -> Value;
}

/// Shared name → runner table. Workflow steps resolve through this at
/// call time, so a workflow can invoke tasks and earlier workflows.
pub type RunnerMap = DashMap<String, Arc<dyn TaskRunner>>;

struct TaskTool {
    config: TaskConfig,
    executor: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl TaskRunner for TaskTool {
    async fn run(&self, arguments: Value) -> Value {
        debug!("Executing task: {}", self.config.name);

        let resolved = match resolve_parameters(&self.config.parameters, &arguments) {
            Ok(resolved) => resolved,
            Err(e) => return failure(e.to_string()),
        };

        let config = substitute_value(&self.config.executor_config, &resolved);
        self.executor
            .execute(&config, &Value::Object(resolved))
            .await
    }
}

struct WorkflowTool {
    config: WorkflowConfig,
    runners: Arc<RunnerMap>,
}

#[async_trait]
impl TaskRunner for WorkflowTool {
    async fn run(&self, arguments: Value) -> Value {
        workflow::execute(&self.config, &self.runners, &arguments).await
    }
}

/// Registry adapter: a synthesised tool is a definition plus a runner.
/// Business failures stay inside the result payload; the protocol layer
/// never sees them as errors.
struct DynamicTool {
    definition: Tool,
    runner: Arc<dyn TaskRunner>,
}

#[async_trait]
impl ToolHandler for DynamicTool {
    fn definition(&self) -> Tool {
        self.definition.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        Ok(self.runner.run(arguments).await)
    }
}

/// Introspection tool summarising the loaded configuration.
struct ServerInfoTool {
    payload: Value,
}

#[async_trait]
impl ToolHandler for ServerInfoTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_server_info".into(),
            description: "Get server information and available tools".into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn execute(&self, _arguments: Value) -> Result<Value> {
        Ok(self.payload.clone())
    }
}

/// Compute the JSON Schema for a parameter list. A parameter is
/// `required` iff it is declared required and carries no default.
fn build_input_schema(parameters: &[TaskParameter]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in parameters {
        properties.insert(
            param.name.clone(),
            json!({
                "type": json_schema_type(&param.param_type),
                "description": param.description,
            }),
        );
        if param.required && param.default.is_none() {
            required.push(Value::String(param.name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    Value::Object(schema)
}

fn server_info_payload(config: &DynamicConfig) -> Value {
    let tasks: Vec<Value> = config
        .tasks
        .iter()
        .map(|t| json!({"name": t.name, "type": t.operation_type.as_str()}))
        .collect();
    let workflows: Vec<Value> = config
        .workflows
        .iter()
        .map(|w| json!({"name": w.name, "steps": w.steps.len()}))
        .collect();

    let mut payload = Map::new();
    payload.insert("name".into(), Value::String(config.server_info.name.clone()));
    payload.insert(
        "version".into(),
        Value::String(config.server_info.version.clone()),
    );
    if let Some(description) = &config.server_info.description {
        payload.insert("description".into(), Value::String(description.clone()));
    }
    payload.insert("task_count".into(), json!(config.tasks.len()));
    payload.insert("workflow_count".into(), json!(config.workflows.len()));
    payload.insert("tasks".into(), Value::Array(tasks));
    payload.insert("workflows".into(), Value::Array(workflows));
    Value::Object(payload)
}

/// Synthesise and register every configured tool.
///
/// Tasks register first so that workflows can resolve their steps
/// against them; a workflow can also call any workflow declared before
/// it. Step resolution and cycle checks happen here, at generation
/// time, not at call time.
pub fn register_tools(config: &DynamicConfig, registry: &Registry) -> ConfigResult<()> {
    let executors = ExecutorSet::standard();
    let runners: Arc<RunnerMap> = Arc::new(DashMap::new());

    for task in &config.tasks {
        if runners.contains_key(&task.name) {
            return Err(ConfigError::DuplicateName(task.name.clone()));
        }

        let runner: Arc<dyn TaskRunner> = Arc::new(TaskTool {
            config: task.clone(),
            executor: executors.get(task.operation_type),
        });
        runners.insert(task.name.clone(), Arc::clone(&runner));

        registry.register_tool_arc(Arc::new(DynamicTool {
            definition: Tool {
                name: task.name.clone(),
                description: format!("{} [Operation: {}]", task.description, task.operation_type),
                input_schema: build_input_schema(&task.parameters),
            },
            runner,
        }));
        info!("Registered task: {} ({})", task.name, task.operation_type);
    }

    for wf in &config.workflows {
        if runners.contains_key(&wf.name) {
            return Err(ConfigError::DuplicateName(wf.name.clone()));
        }

        workflow::validate(wf, |task| runners.contains_key(task))?;

        let runner: Arc<dyn TaskRunner> = Arc::new(WorkflowTool {
            config: wf.clone(),
            runners: Arc::clone(&runners),
        });
        runners.insert(wf.name.clone(), Arc::clone(&runner));

        registry.register_tool_arc(Arc::new(DynamicTool {
            definition: Tool {
                name: wf.name.clone(),
                description: format!(
                    "{} [Workflow with {} steps]",
                    wf.description,
                    wf.steps.len()
                ),
                input_schema: build_input_schema(&wf.parameters),
            },
            runner,
        }));
        info!("Registered workflow: {}", wf.name);
    }

    registry.register_tool(ServerInfoTool {
        payload: server_info_payload(config),
    });

    Ok(())
}
