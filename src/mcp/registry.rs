//! Declarative tool tables and dispatch
//!
//! Each vendor declares its tools as static [`ToolSpec`] tables. The
//! registry derives the advertised JSON Schema from those tables, checks
//! incoming arguments against them and hands valid calls to the
//! [`ResponseGenerator`].

use std::fmt;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::generator::{ResponseGenerator, ToolInvocation};
use crate::protocol::{Tool, ToolsCallResult};
use crate::vendor::Vendor;

/// Name of the caller-context argument every tool requires
pub const PORT_CONTEXT: &str = "port_context";

/// JSON type accepted for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// JSON string
    String,
    /// JSON integer
    Integer,
    /// JSON object
    Object,
}

impl ParamKind {
    /// JSON Schema type name
    #[must_use]
    pub const fn schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Object => "object",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_type())
    }
}

/// One declared tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Argument name
    pub name: &'static str,
    /// Accepted JSON type
    pub kind: ParamKind,
    /// Whether the caller must supply it
    pub required: bool,
    /// String default for optional parameters; `None` means `null`
    pub default: Option<&'static str>,
}

impl ParamSpec {
    /// A required parameter
    #[must_use]
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    /// An optional parameter defaulting to `null`
    #[must_use]
    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    /// Set the default used when the caller omits this parameter
    #[must_use]
    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    fn default_value(&self) -> Value {
        self.default.map_or(Value::Null, |d| Value::String(d.to_string()))
    }

    fn schema(&self) -> Value {
        if self.required {
            json!({"type": self.kind.schema_type()})
        } else {
            json!({
                "type": [self.kind.schema_type(), "null"],
                "default": self.default_value(),
            })
        }
    }
}

/// One declared tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool name
    pub name: &'static str,
    /// One-line description shown to clients
    pub description: &'static str,
    /// Declared parameters, `port_context` excluded
    pub params: &'static [ParamSpec],
}

impl ToolSpec {
    /// Declare a tool
    #[must_use]
    pub const fn new(
        name: &'static str,
        description: &'static str,
        params: &'static [ParamSpec],
    ) -> Self {
        Self {
            name,
            description,
            params,
        }
    }

    /// JSON Schema for this tool's arguments
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in self.params {
            properties.insert(param.name.to_string(), param.schema());
            if param.required {
                required.push(Value::String(param.name.to_string()));
            }
        }
        properties.insert(PORT_CONTEXT.to_string(), json!({"type": "object"}));
        required.push(Value::String(PORT_CONTEXT.to_string()));

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Advertised MCP tool definition
    #[must_use]
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            input_schema: self.input_schema(),
        }
    }

    /// Check `arguments` and split them into parameters and caller context.
    ///
    /// Optional parameters the caller omitted are filled with their default.
    /// Unknown argument names are dropped.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first violated constraint.
    pub fn bind(&self, arguments: &Value) -> Result<(Map<String, Value>, Value), String> {
        let empty = Map::new();
        let args = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => return Err(format!("arguments must be an object, got {}", json_type(other))),
        };

        let mut parameters = Map::new();
        for param in self.params {
            match args.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(format!("missing required parameter '{}'", param.name));
                }
                None | Some(Value::Null) => {
                    parameters.insert(param.name.to_string(), param.default_value());
                }
                Some(value) if param.kind.accepts(value) => {
                    parameters.insert(param.name.to_string(), value.clone());
                }
                Some(value) => {
                    return Err(format!(
                        "parameter '{}' must be {}, got {}",
                        param.name,
                        param.kind,
                        json_type(value)
                    ));
                }
            }
        }

        let context = match args.get(PORT_CONTEXT) {
            None | Some(Value::Null) => {
                return Err(format!("missing required parameter '{PORT_CONTEXT}'"));
            }
            Some(value @ Value::Object(_)) => value.clone(),
            Some(value) => {
                return Err(format!(
                    "parameter '{PORT_CONTEXT}' must be object, got {}",
                    json_type(value)
                ));
            }
        };

        Ok((parameters, context))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One vendor's tools bound to a generator
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    vendor: Vendor,
    generator: ResponseGenerator,
}

impl ToolRegistry {
    /// Registry for `vendor`'s catalog
    #[must_use]
    pub fn new(vendor: Vendor, generator: ResponseGenerator) -> Self {
        Self { vendor, generator }
    }

    /// Vendor served by this registry
    #[must_use]
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Tool definitions for `tools/list`
    #[must_use]
    pub fn list(&self) -> Vec<Tool> {
        self.vendor.tools().iter().map(ToolSpec::to_tool).collect()
    }

    /// Look up a tool by name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&'static ToolSpec> {
        self.vendor.tools().iter().find(|t| t.name == name)
    }

    /// Run `tools/call`; every outcome is an in-band result
    pub async fn call(&self, name: &str, arguments: &Value) -> ToolsCallResult {
        let Some(spec) = self.find(name) else {
            warn!(vendor = %self.vendor, tool = %name, "Unknown tool");
            return ToolsCallResult::json_text(&json!({"error": format!("Unknown tool: {name}")}), true);
        };

        let (parameters, caller_context) = match spec.bind(arguments) {
            Ok(bound) => bound,
            Err(message) => {
                debug!(vendor = %self.vendor, tool = %name, error = %message, "Rejected tool arguments");
                return ToolsCallResult::json_text(
                    &json!({"error": format!("Invalid arguments for {name}: {message}")}),
                    true,
                );
            }
        };

        let invocation = ToolInvocation {
            vendor: self.vendor,
            tool_name: spec.name.to_string(),
            parameters,
            caller_context,
        };
        let value = self.generator.generate(&invocation).await;
        ToolsCallResult::json_text(&value, false)
    }
}
