//! Capability trait: the abstraction over host-side actions.
//!
//! A capability provider (command search, script editing, documentation
//! lookup, ...) exposes an explicit action table: each [`Action`] carries its
//! name, parameter specification and a typed handler. The tool crate turns
//! these tables into [`ActionDescriptor`]s and dispatches calls against them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ActionError;
use crate::tool::ToolDefinition;

/// The type of a single action parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    /// JSON Schema type name.
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_type())
    }
}

/// One entry of an action's ordered parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            description: description.into(),
        }
    }
}

/// Immutable description of a callable action, as seen by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Unique tool name across the registry
    pub name: String,

    /// Display name of the provider that owns this action
    pub provider: String,

    /// Usage/help text
    pub description: String,

    /// Ordered parameter list
    pub params: Vec<ParamSpec>,
}

impl ActionDescriptor {
    /// JSON Schema describing this action's parameters.
    pub fn parameters_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for param in &self.params {
            let mut prop = serde_json::json!({ "type": param.ty.json_type() });
            if !param.description.is_empty() {
                prop["description"] = serde_json::Value::String(param.description.clone());
            }
            properties.insert(param.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Convert into the catalog triple handed to the chat transport.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters_schema(),
        }
    }

    /// One-line signature, e.g. `runCommand(menuPath: string)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let marker = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, marker, p.ty)
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// A coerced argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Arguments after coercion against an action's parameter list.
///
/// Handlers read them with typed accessors; a missing or mistyped value is
/// reported as [`ActionError::InvalidArgument`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: HashMap<String, ArgValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn str(&self, name: &str) -> Result<&str, ActionError> {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => Ok(s),
            Some(_) => Err(ActionError::invalid(name, "expected a string")),
            None => Err(ActionError::invalid(name, "missing")),
        }
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, ActionError> {
        match self.values.get(name) {
            Some(ArgValue::Int(i)) => Ok(*i),
            Some(_) => Err(ActionError::invalid(name, "expected an integer")),
            None => Err(ActionError::invalid(name, "missing")),
        }
    }

    pub fn opt_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Result<f64, ActionError> {
        match self.values.get(name) {
            Some(ArgValue::Float(f)) => Ok(*f),
            Some(ArgValue::Int(i)) => Ok(*i as f64),
            Some(_) => Err(ActionError::invalid(name, "expected a number")),
            None => Err(ActionError::invalid(name, "missing")),
        }
    }

    pub fn flag(&self, name: &str) -> Result<bool, ActionError> {
        match self.values.get(name) {
            Some(ArgValue::Bool(b)) => Ok(*b),
            Some(_) => Err(ActionError::invalid(name, "expected a boolean")),
            None => Err(ActionError::invalid(name, "missing")),
        }
    }

    pub fn opt_flag(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

/// Successful output of an action.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionOutput {
    /// Text handed back to the model
    pub text: String,

    /// Optional structured data
    pub data: Option<serde_json::Value>,
}

impl ActionOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<String> for ActionOutput {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for ActionOutput {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

/// The bound executor of an action. The token is cancelled when the
/// dispatcher gives up waiting (timeout) or the session is cancelled.
pub type ActionHandler = Arc<
    dyn Fn(Arguments, CancellationToken) -> BoxFuture<'static, Result<ActionOutput, ActionError>>
        + Send
        + Sync,
>;

/// One row of a provider's action table.
#[derive(Clone)]
pub struct Action {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub handler: ActionHandler,
}

impl Action {
    /// Create an action from an async handler.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arguments, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionOutput, ActionError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            handler: Arc::new(move |args, cancel| Box::pin(handler(args, cancel))),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn required(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.param(ParamSpec::required(name, ty, description))
    }

    pub fn optional(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.param(ParamSpec::optional(name, ty, description))
    }

    /// Build the immutable descriptor for this action under `provider`.
    pub fn describe(&self, provider: &str) -> ActionDescriptor {
        ActionDescriptor {
            name: self.name.clone(),
            provider: provider.to_string(),
            description: self.description.clone(),
            params: self.params.clone(),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A host-side provider of actions.
///
/// Implementations declare a display name and usage text (shown to the model
/// in the "Available Tools" section) and an explicit action table.
pub trait Capability: Send + Sync {
    /// Human-readable provider name (e.g., "Commands", "Script Editor").
    fn display_name(&self) -> &str;

    /// Usage text describing when and how to use this provider's actions.
    fn usage(&self) -> &str;

    /// The provider's action table.
    fn actions(&self) -> Vec<Action>;
}
