//! Tools and the tool registry.
//!
//! Tools are what let the model act on the platform: search the network,
//! edit a link page, and so on. Tools are contributed by [`ToolSource`]s and
//! merged once, at startup, into an immutable [`ToolRegistry`] that is then
//! shared read-only by every turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::TurnContext;
use crate::error::ToolError;

/// Function descriptor the model sees: name, description and JSON Schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The core Tool trait.
///
/// `execute` receives the model's parameters verbatim. Argument problems the
/// model can fix should come back as an `Ok` JSON object describing the
/// problem; `Err` aborts the turn.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique id of this tool (e.g., "search_network").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, parameters: Map<String, Value>, ctx: &TurnContext)
        -> anyhow::Result<Value>;

    fn to_spec(&self) -> FunctionSpec {
        FunctionSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registered tool: its model-facing descriptor plus the handler.
///
/// A definition without a handler can still be advertised, but calling it
/// fails with [`ToolError::Invalid`].
#[derive(Clone)]
pub struct ToolDefinition {
    pub id: String,
    pub function: FunctionSpec,
    pub handler: Option<Arc<dyn Tool>>,
}

impl ToolDefinition {
    pub fn from_tool(tool: Arc<dyn Tool>) -> Self {
        Self {
            id: tool.name().to_string(),
            function: tool.to_spec(),
            handler: Some(tool),
        }
    }

    /// A descriptor-only definition.
    pub fn declared(id: impl Into<String>, function: FunctionSpec) -> Self {
        Self {
            id: id.into(),
            function,
            handler: None,
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("id", &self.id)
            .field("function", &self.function)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Something that contributes tool definitions at discovery time.
pub trait ToolSource: Send + Sync {
    fn name(&self) -> &str;

    fn tools(&self) -> Vec<ToolDefinition>;
}

/// A fixed list of definitions.
pub struct StaticToolSource {
    name: String,
    tools: Vec<ToolDefinition>,
}

impl StaticToolSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(ToolDefinition::from_tool(tool));
        self
    }

    pub fn with_definition(mut self, definition: ToolDefinition) -> Self {
        self.tools.push(definition);
        self
    }
}

impl ToolSource for StaticToolSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }
}

struct SourceEntry {
    source: Box<dyn ToolSource>,
    skip: HashSet<String>,
}

/// Collects sources in order, then merges them into a [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    sources: Vec<SourceEntry>,
    excluded: HashSet<String>,
}

impl ToolRegistryBuilder {
    pub fn source(mut self, source: impl ToolSource + 'static) -> Self {
        self.sources.push(SourceEntry {
            source: Box::new(source),
            skip: HashSet::new(),
        });
        self
    }

    /// Add a source but ignore the given ids from it only.
    pub fn source_excluding(
        mut self,
        source: impl ToolSource + 'static,
        ids: &[&str],
    ) -> Self {
        self.sources.push(SourceEntry {
            source: Box::new(source),
            skip: ids.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Drop an id from the merged result regardless of source.
    pub fn exclude(mut self, id: impl Into<String>) -> Self {
        self.excluded.insert(id.into());
        self
    }

    /// Run discovery once.
    ///
    /// On id collision the later source wins but the tool keeps the position
    /// where the id was first seen.
    pub fn build(self) -> ToolRegistry {
        let mut tools: Vec<ToolDefinition> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in self.sources {
            let source_name = entry.source.name().to_string();
            for definition in entry.source.tools() {
                if entry.skip.contains(&definition.id) || self.excluded.contains(&definition.id) {
                    debug!(tool = %definition.id, source = %source_name, "Tool excluded");
                    continue;
                }
                match index.get(&definition.id) {
                    Some(&position) => {
                        debug!(tool = %definition.id, source = %source_name, "Tool overridden");
                        tools[position] = definition;
                    }
                    None => {
                        index.insert(definition.id.clone(), tools.len());
                        tools.push(definition);
                    }
                }
            }
        }

        info!(tools = tools.len(), "Tool registry built");
        ToolRegistry { tools, index }
    }
}

/// An immutable registry of available tools.
///
/// The conversation loop uses this to:
/// 1. Get function descriptors to send to the model
/// 2. Look up and invoke tools when the model requests them
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ToolDefinition> {
        self.index.get(id).map(|&i| &self.tools[i])
    }

    /// Invoke a tool and return its raw result unchanged.
    pub async fn call(
        &self,
        id: &str,
        parameters: Map<String, Value>,
        ctx: &TurnContext,
    ) -> Result<Value, ToolError> {
        let definition = self.get(id).ok_or_else(|| ToolError::NotFound(id.to_string()))?;
        let handler = definition
            .handler
            .as_ref()
            .ok_or_else(|| ToolError::Invalid(id.to_string()))?;

        handler
            .execute(parameters, ctx)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: id.to_string(),
                reason: format!("{e:#}"),
            })
    }

    /// Descriptors to advertise to the model, in registry order.
    pub fn for_model(&self) -> Vec<FunctionSpec> {
        self.tools.iter().map(|t| t.function.clone()).collect()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
