//! In-memory registry for tools, resources, and prompts.
//!
//! Populated at start-up and treated as read-only afterwards; lookups
//! need no external locking.

use crate::error::Result;
use crate::protocol::{Prompt, Resource, Tool};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A callable tool. `execute` returns the raw result value; the protocol
/// layer is responsible for wrapping it into `tools/call` content.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> Tool;
    async fn execute(&self, arguments: Value) -> Result<Value>;
}

/// A readable resource identified by URI.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn definition(&self) -> Resource;
    async fn read(&self) -> Result<String>;
}

/// A prompt template rendering to a messages payload.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    fn definition(&self) -> Prompt;
    async fn render(&self, arguments: Value) -> Result<Value>;
}

/// Registry holding the three resource families, keyed by name / URI.
///
/// List order is unspecified; callers must not depend on it.
pub struct Registry {
    tools: DashMap<String, Arc<dyn ToolHandler>>,
    resources: DashMap<String, Arc<dyn ResourceHandler>>,
    prompts: DashMap<String, Arc<dyn PromptHandler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
            resources: DashMap::new(),
            prompts: DashMap::new(),
        }
    }

    /// Register a tool. A duplicate name overwrites the previous entry.
    pub fn register_tool<T: ToolHandler + 'static>(&self, tool: T) {
        let name = tool.definition().name;
        debug!("Registering tool: {}", name);
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn register_tool_arc(&self, tool: Arc<dyn ToolHandler>) {
        let name = tool.definition().name;
        debug!("Registering tool: {}", name);
        self.tools.insert(name, tool);
    }

    pub fn register_resource<R: ResourceHandler + 'static>(&self, resource: R) {
        let uri = resource.definition().uri;
        debug!("Registering resource: {}", uri);
        self.resources.insert(uri, Arc::new(resource));
    }

    pub fn register_prompt<P: PromptHandler + 'static>(&self, prompt: P) {
        let name = prompt.definition().name;
        debug!("Registering prompt: {}", name);
        self.prompts.insert(name, Arc::new(prompt));
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|r| Arc::clone(&*r))
    }

    pub fn get_resource(&self, uri: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.resources.get(uri).map(|r| Arc::clone(&*r))
    }

    pub fn get_prompt(&self, name: &str) -> Option<Arc<dyn PromptHandler>> {
        self.prompts.get(name).map(|r| Arc::clone(&*r))
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|r| r.value().definition()).collect()
    }

    pub fn list_resources(&self) -> Vec<Resource> {
        self.resources
            .iter()
            .map(|r| r.value().definition())
            .collect()
    }

    pub fn list_prompts(&self) -> Vec<Prompt> {
        self.prompts.iter().map(|r| r.value().definition()).collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
