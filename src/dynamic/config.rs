//! Configuration file loader for the dynamic task server.
//!
//! The file is walked manually rather than derived so that every
//! validation failure can name the exact JSON path of the offending
//! element.

use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Default server identity when `server_info` is absent.
pub const DEFAULT_SERVER_NAME: &str = "DynamicTaskServer";
pub const DEFAULT_SERVER_VERSION: &str = "1.0.0";

/// Executor families a task can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Database,
    RestApi,
    Terminal,
    FileOperation,
    DataProcessing,
}

impl OperationType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "database" => Some(Self::Database),
            "rest_api" => Some(Self::RestApi),
            "terminal" => Some(Self::Terminal),
            "file_operation" => Some(Self::FileOperation),
            "data_processing" => Some(Self::DataProcessing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::RestApi => "rest_api",
            Self::Terminal => "terminal",
            Self::FileOperation => "file_operation",
            Self::DataProcessing => "data_processing",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared parameter of a task or workflow.
#[derive(Debug, Clone)]
pub struct TaskParameter {
    pub name: String,
    /// Declared type; unknown values mean "any".
    pub param_type: String,
    pub required: bool,
    pub description: String,
    pub default: Option<Value>,
}

/// A single task: one executor invocation with declared parameters.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub name: String,
    pub description: String,
    pub operation_type: OperationType,
    pub executor_config: Value,
    pub parameters: Vec<TaskParameter>,
}

/// A workflow step: one task invocation wired into the step graph.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub name: String,
    pub task: String,
    pub dependencies: Vec<String>,
    pub input_mapping: BTreeMap<String, String>,
    pub output_mapping: BTreeMap<String, String>,
}

/// A workflow: a DAG of steps exposed as a single tool.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub name: String,
    pub description: String,
    pub parameters: Vec<TaskParameter>,
    pub steps: Vec<WorkflowStep>,
}

/// Identity block from the configuration file.
#[derive(Debug, Clone)]
pub struct ServerInfoConfig {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
}

impl Default for ServerInfoConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.into(),
            version: DEFAULT_SERVER_VERSION.into(),
            description: None,
        }
    }
}

/// Parsed and validated configuration file.
#[derive(Debug, Clone, Default)]
pub struct DynamicConfig {
    pub server_info: ServerInfoConfig,
    pub tasks: Vec<TaskConfig>,
    pub workflows: Vec<WorkflowConfig>,
}

impl Default for TaskParameter {
    fn default() -> Self {
        Self {
            name: String::new(),
            param_type: "string".into(),
            required: true,
            description: String::new(),
            default: None,
        }
    }
}

impl DynamicConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_str(&raw)?;
        info!(
            "Loaded {} tasks and {} workflows from {}",
            config.tasks.len(),
            config.workflows.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse a configuration document from its JSON text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(raw: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        let root = as_object(value, "$")?;

        let server_info = match root.get("server_info") {
            Some(v) => parse_server_info(v)?,
            None => ServerInfoConfig::default(),
        };

        let mut tasks = Vec::new();
        if let Some(v) = root.get("tasks") {
            for (i, task) in as_array(v, "tasks")?.iter().enumerate() {
                tasks.push(parse_task(task, &format!("tasks[{}]", i))?);
            }
        }

        let mut workflows = Vec::new();
        if let Some(v) = root.get("workflows") {
            for (i, workflow) in as_array(v, "workflows")?.iter().enumerate() {
                workflows.push(parse_workflow(workflow, &format!("workflows[{}]", i))?);
            }
        }

        Ok(Self {
            server_info,
            tasks,
            workflows,
        })
    }
}

fn parse_server_info(value: &Value) -> ConfigResult<ServerInfoConfig> {
    let obj = as_object(value, "server_info")?;
    Ok(ServerInfoConfig {
        name: opt_string(obj, "server_info", "name")?
            .unwrap_or_else(|| DEFAULT_SERVER_NAME.into()),
        version: opt_string(obj, "server_info", "version")?
            .unwrap_or_else(|| DEFAULT_SERVER_VERSION.into()),
        description: opt_string(obj, "server_info", "description")?,
    })
}

fn parse_task(value: &Value, path: &str) -> ConfigResult<TaskConfig> {
    let obj = as_object(value, path)?;

    let name = req_string(obj, path, "name")?;
    let description = opt_string(obj, path, "description")?.unwrap_or_default();

    let op_path = format!("{}.operation_type", path);
    let op_raw = req_string(obj, path, "operation_type")?;
    let operation_type = OperationType::parse(&op_raw).ok_or(ConfigError::UnknownOperationType {
        path: op_path,
        value: op_raw,
    })?;

    let executor_config = obj
        .get("config")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let parameters = parse_parameters(obj, path)?;

    Ok(TaskConfig {
        name,
        description,
        operation_type,
        executor_config,
        parameters,
    })
}

fn parse_workflow(value: &Value, path: &str) -> ConfigResult<WorkflowConfig> {
    let obj = as_object(value, path)?;

    let name = req_string(obj, path, "name")?;
    let description = opt_string(obj, path, "description")?.unwrap_or_default();
    let parameters = parse_parameters(obj, path)?;

    let mut steps = Vec::new();
    if let Some(v) = obj.get("steps") {
        for (i, step) in as_array(v, &format!("{}.steps", path))?.iter().enumerate() {
            steps.push(parse_step(step, &format!("{}.steps[{}]", path, i))?);
        }
    }

    Ok(WorkflowConfig {
        name,
        description,
        parameters,
        steps,
    })
}

fn parse_step(value: &Value, path: &str) -> ConfigResult<WorkflowStep> {
    let obj = as_object(value, path)?;

    let name = req_string(obj, path, "name")?;
    let task = req_string(obj, path, "task")?;

    let mut dependencies = Vec::new();
    if let Some(v) = obj.get("dependencies") {
        let deps_path = format!("{}.dependencies", path);
        for (i, dep) in as_array(v, &deps_path)?.iter().enumerate() {
            let dep = dep.as_str().ok_or_else(|| ConfigError::WrongType {
                path: format!("{}[{}]", deps_path, i),
                expected: "string",
            })?;
            dependencies.push(dep.to_string());
        }
    }

    let input_mapping = parse_string_map(obj, path, "input_mapping")?;
    let output_mapping = parse_string_map(obj, path, "output_mapping")?;

    Ok(WorkflowStep {
        name,
        task,
        dependencies,
        input_mapping,
        output_mapping,
    })
}

fn parse_parameters(obj: &Map<String, Value>, path: &str) -> ConfigResult<Vec<TaskParameter>> {
    let mut parameters = Vec::new();
    if let Some(v) = obj.get("parameters") {
        let params_path = format!("{}.parameters", path);
        for (i, param) in as_array(v, &params_path)?.iter().enumerate() {
            parameters.push(parse_parameter(param, &format!("{}[{}]", params_path, i))?);
        }
    }
    Ok(parameters)
}

fn parse_parameter(value: &Value, path: &str) -> ConfigResult<TaskParameter> {
    let obj = as_object(value, path)?;

    let name = req_string(obj, path, "name")?;
    let param_type = opt_string(obj, path, "type")?.unwrap_or_else(|| "string".into());

    let required = match obj.get("required") {
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(ConfigError::WrongType {
                path: format!("{}.required", path),
                expected: "boolean",
            });
        }
        None => true,
    };

    let description = opt_string(obj, path, "description")?.unwrap_or_default();
    let default = obj.get("default").cloned();

    Ok(TaskParameter {
        name,
        param_type,
        required,
        description,
        default,
    })
}

fn parse_string_map(
    obj: &Map<String, Value>,
    path: &str,
    field: &'static str,
) -> ConfigResult<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    if let Some(v) = obj.get(field) {
        let map_path = format!("{}.{}", path, field);
        for (key, value) in as_object(v, &map_path)? {
            let value = value.as_str().ok_or_else(|| ConfigError::WrongType {
                path: format!("{}.{}", map_path, key),
                expected: "string",
            })?;
            out.insert(key.clone(), value.to_string());
        }
    }
    Ok(out)
}

fn as_object<'a>(value: &'a Value, path: &str) -> ConfigResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| ConfigError::WrongType {
        path: path.to_string(),
        expected: "object",
    })
}

fn as_array<'a>(value: &'a Value, path: &str) -> ConfigResult<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| ConfigError::WrongType {
        path: path.to_string(),
        expected: "array",
    })
}

fn req_string(obj: &Map<String, Value>, path: &str, field: &'static str) -> ConfigResult<String> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ConfigError::WrongType {
            path: format!("{}.{}", path, field),
            expected: "string",
        }),
        None => Err(ConfigError::MissingField {
            path: path.to_string(),
            field,
        }),
    }
}

fn opt_string(
    obj: &Map<String, Value>,
    path: &str,
    field: &'static str,
) -> ConfigResult<Option<String>> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::WrongType {
            path: format!("{}.{}", path, field),
            expected: "string",
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_sections() {
        let config = DynamicConfig::from_str("{}").unwrap();
        assert_eq!(config.server_info.name, "DynamicTaskServer");
        assert_eq!(config.server_info.version, "1.0.0");
        assert!(config.tasks.is_empty());
        assert!(config.workflows.is_empty());
    }

    #[test]
    fn test_full_task() {
        let config = DynamicConfig::from_str(
            r#"{
                "server_info": {"name": "ops", "version": "2.0.0"},
                "tasks": [{
                    "name": "fetch_user",
                    "description": "Fetch a user record",
                    "operation_type": "rest_api",
                    "config": {"method": "GET", "url": "https://api.example.com/users/{user_id}"},
                    "parameters": [
                        {"name": "user_id", "type": "integer"},
                        {"name": "verbose", "type": "boolean", "required": false, "default": false}
                    ]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.server_info.name, "ops");
        let task = &config.tasks[0];
        assert_eq!(task.name, "fetch_user");
        assert_eq!(task.operation_type, OperationType::RestApi);
        assert_eq!(task.parameters.len(), 2);
        assert!(task.parameters[0].required);
        assert_eq!(task.parameters[0].param_type, "integer");
        assert!(!task.parameters[1].required);
        assert_eq!(task.parameters[1].default, Some(Value::Bool(false)));
    }

    #[test]
    fn test_parameter_defaults() {
        let config = DynamicConfig::from_str(
            r#"{"tasks": [{
                "name": "t",
                "operation_type": "terminal",
                "parameters": [{"name": "p"}]
            }]}"#,
        )
        .unwrap();
        let param = &config.tasks[0].parameters[0];
        assert_eq!(param.param_type, "string");
        assert!(param.required);
        assert!(param.default.is_none());
    }

    #[test]
    fn test_wrong_type_names_the_path() {
        let err = DynamicConfig::from_str(r#"{"tasks": [{"name": 42, "operation_type": "terminal"}]}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "tasks[0].name: expected string");
    }

    #[test]
    fn test_missing_required_field() {
        let err =
            DynamicConfig::from_str(r#"{"tasks": [{"operation_type": "terminal"}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "name", .. }));
    }

    #[test]
    fn test_unknown_operation_type() {
        let err = DynamicConfig::from_str(
            r#"{"tasks": [{"name": "t", "operation_type": "telepathy"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperationType { .. }));
    }

    #[test]
    fn test_workflow_steps() {
        let config = DynamicConfig::from_str(
            r#"{"workflows": [{
                "name": "wf",
                "steps": [
                    {"name": "s1", "task": "t1"},
                    {
                        "name": "s2",
                        "task": "t2",
                        "dependencies": ["s1"],
                        "input_mapping": {"json_string": "{s1_out}"},
                        "output_mapping": {"data": "final"}
                    }
                ]
            }]}"#,
        )
        .unwrap();

        let workflow = &config.workflows[0];
        assert_eq!(workflow.steps.len(), 2);
        assert_eq!(workflow.steps[1].dependencies, vec!["s1"]);
        assert_eq!(
            workflow.steps[1].input_mapping.get("json_string").unwrap(),
            "{s1_out}"
        );
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = DynamicConfig::from_str("{oops").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
