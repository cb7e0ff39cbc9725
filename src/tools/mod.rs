//! Kibo tools exposed over MCP
//!
//! Tools are grouped by Kibo domain. The [`ToolRegistry`] routes a call by
//! exact tool name to the group that declared it, after validating the
//! arguments against that tool's input schema.

mod customers;
mod envelope;
mod inventory;
mod orders;
mod products;
pub mod query;
pub mod schema;
#[cfg(test)]
mod testing;

pub use customers::CustomerTools;
pub use envelope::ToolOutcome;
pub use inventory::InventoryTools;
pub use orders::OrderTools;
pub use products::ProductTools;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::KiboClient;
use crate::protocol::Tool;
use crate::{Error, Result};

/// A set of related tools sharing one handler
#[async_trait]
pub trait ToolGroup: Send + Sync {
    /// Group name for logs
    fn name(&self) -> &'static str;

    /// Tool definitions in this group
    fn tools(&self) -> Vec<Tool>;

    /// Run `tool` with already-validated `arguments`.
    ///
    /// Kibo failures are reported inside the [`ToolOutcome`]; an `Err` means
    /// the call could not be attempted at all.
    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutcome>;
}

struct Route {
    group: usize,
    tool: Tool,
}

/// Name-indexed catalog of every registered tool
#[derive(Default)]
pub struct ToolRegistry {
    groups: Vec<Arc<dyn ToolGroup>>,
    routes: HashMap<String, Route>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the product, order, customer and inventory tools
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if two groups declare the same tool name.
    pub fn with_kibo_tools(client: &KiboClient) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(ProductTools::new(client.clone())))?;
        registry.register(Arc::new(OrderTools::new(client.clone())))?;
        registry.register(Arc::new(CustomerTools::new(client.clone())))?;
        registry.register(Arc::new(InventoryTools::new(client.clone())))?;
        Ok(registry)
    }

    /// Add a group
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if one of its tool names is already taken.
    pub fn register(&mut self, group: Arc<dyn ToolGroup>) -> Result<()> {
        let index = self.groups.len();
        let tools = group.tools();
        for tool in &tools {
            if self.routes.contains_key(&tool.name) {
                return Err(Error::Internal(format!(
                    "Duplicate tool name: {}",
                    tool.name
                )));
            }
        }
        debug!(group = group.name(), tools = tools.len(), "Registered tool group");
        for tool in tools {
            self.order.push(tool.name.clone());
            self.routes.insert(tool.name.clone(), Route { group: index, tool });
        }
        self.groups.push(group);
        Ok(())
    }

    /// All tool definitions, in registration order
    #[must_use]
    pub fn list(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.routes.get(name))
            .map(|route| route.tool.clone())
            .collect()
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// No tools registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Validate and run a tool
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownTool`] if no tool has this exact name
    /// - [`Error::InvalidParams`] if the arguments do not fit the schema
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutcome> {
        let route = self
            .routes
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;

        let validated = schema::validate_arguments(&arguments, &route.tool.input_schema);
        if !validated.is_valid() {
            return Err(Error::InvalidParams(validated.describe()));
        }

        debug!(tool = name, "Executing tool");
        let outcome = self.groups[route.group]
            .call(name, validated.arguments)
            .await?;

        if !outcome.is_success() {
            warn!(
                tool = name,
                error = outcome.error().unwrap_or_default(),
                details = outcome.details().unwrap_or_default(),
                "Tool call failed"
            );
        }
        Ok(outcome)
    }
}

/// Every Kibo tool definition, in registration order, without a client
#[must_use]
pub fn catalog() -> Vec<Tool> {
    let mut tools = ProductTools::definitions();
    tools.extend(OrderTools::definitions());
    tools.extend(CustomerTools::definitions());
    tools.extend(InventoryTools::definitions());
    tools
}

/// Deserialize validated arguments into a typed parameter struct
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| Error::InvalidParams(e.to_string()))
}

pub(crate) fn default_page_size() -> u32 {
    20
}

pub(crate) fn default_true() -> bool {
    true
}

/// Schema for `startIndex`
pub(crate) fn start_index_schema() -> Value {
    serde_json::json!({
        "type": "integer",
        "minimum": 0,
        "default": 0,
        "description": "Starting index for pagination"
    })
}

/// Schema for `pageSize`
pub(crate) fn page_size_schema(default: u32, noun: &str) -> Value {
    serde_json::json!({
        "type": "integer",
        "minimum": 1,
        "maximum": 200,
        "default": default,
        "description": format!("Number of {noun} to return")
    })
}
