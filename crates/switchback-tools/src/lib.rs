//! # switchback-tools
//!
//! Tool registry and dispatch for tool-calling LLM sessions.
//!
//! This crate provides the pieces that sit between a model's function-call
//! items and the code that actually runs them.
//!
//! ## Core Components
//!
//! - [`ToolImplementation`]: Trait for defining tools with execution logic
//! - [`ToolRegistry`]: Thread-safe name-to-handler map
//! - [`ToolDispatcher`]: Resolves a [`ToolCall`] to a handler, runs it, and
//!   turns every outcome (including failures) into result text
//! - [`FunctionTool`]: Wraps an async closure with typed arguments
//!
//! ## Built-in Tools
//!
//! - [`WeatherTool`]: Current temperature from the Open-Meteo forecast API
//!
//! ## Example: Registering and Dispatching a Tool
//!
//! ```rust
//! use serde::Deserialize;
//! use serde_json::json;
//! use switchback_common::ToolCall;
//! use switchback_tools::{ToolDispatcher, ToolRegistry};
//!
//! #[derive(Deserialize)]
//! struct GreetArgs {
//!     name: String,
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = ToolRegistry::new();
//! registry.register_function(
//!     "greet",
//!     "Greet a person by name",
//!     json!({
//!         "type": "object",
//!         "properties": {"name": {"type": "string"}},
//!         "required": ["name"]
//!     }),
//!     |args: GreetArgs| async move { Ok(format!("Hello, {}!", args.name)) },
//! );
//!
//! let dispatcher = ToolDispatcher::new(registry);
//! let result = dispatcher
//!     .dispatch_to_result(&ToolCall::new("call_1", "greet", r#"{"name":"Ada"}"#))
//!     .await;
//! assert_eq!(result.output, "Hello, Ada!");
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! The [`ToolRegistry`] uses `DashMap` for concurrent access; clones share the
//! same underlying map.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

use switchback_common::tools::{ToolCall, ToolDeclaration};

mod dispatcher;
mod function_tool;
mod weather;

pub use dispatcher::{DispatchError, FunctionCallResult, ToolDispatcher};
pub use function_tool::FunctionTool;
pub use weather::{WeatherConfig, WeatherTool};

/// A tool the model can call.
#[async_trait]
pub trait ToolImplementation: Send + Sync {
    /// The declaration sent to the model. Its `name` is the registry key.
    fn declaration(&self) -> ToolDeclaration;

    /// Checks parsed arguments before execution.
    ///
    /// The default requires a JSON object containing every key listed in the
    /// declaration's `required` array.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the arguments are unusable.
    fn validate_arguments(&self, args: &Value) -> std::result::Result<(), String> {
        let object = args
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {args}"))?;

        let declaration = self.declaration();
        let missing: Vec<&str> = declaration
            .required_arguments()
            .into_iter()
            .filter(|key| !object.contains_key(*key))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing required argument(s): {}", missing.join(", ")))
        }
    }

    /// Runs the tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool fails; the dispatcher reports it to the
    /// model as `error: <message>`.
    async fn execute(&self, args: &Value) -> Result<String>;
}

/// Thread-safe registry of tools keyed by declared name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn ToolImplementation>>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its declared name, replacing any previous tool
    /// with that name.
    pub fn register(&self, tool: Arc<dyn ToolImplementation>) {
        let name = tool.declaration().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!("Replaced previously registered tool '{name}'");
        }
    }

    /// Registers an async function with typed arguments.
    pub fn register_function<A, F, Fut>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: impl Into<Value>,
        handler: F,
    ) where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let declaration = ToolDeclaration::builder()
            .name(name)
            .description(description)
            .parameters(parameters)
            .build();
        self.register(Arc::new(FunctionTool::new(declaration, handler)));
    }

    /// Looks up the handler for `name`.
    #[must_use]
    pub fn get_handler(&self, name: &str) -> Option<Arc<dyn ToolImplementation>> {
        self.tools.get(name).map(|r| r.value().clone())
    }

    /// Looks up the handler a call refers to.
    #[must_use]
    pub fn resolve(&self, call: &ToolCall) -> Option<Arc<dyn ToolImplementation>> {
        self.get_handler(&call.name)
    }

    /// Declarations of all registered tools, sorted by name.
    #[must_use]
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations: Vec<ToolDeclaration> =
            self.tools.iter().map(|t| t.declaration()).collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn ToolImplementation>> {
        self.tools.remove(name).map(|(_, tool)| tool)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|t| t.key().clone()).collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;
    use switchback_common::tools::{Parameters, Property};

    struct EchoTool;

    #[async_trait]
    impl ToolImplementation for EchoTool {
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration::builder()
                .name("echo")
                .description("Echo the text back")
                .parameters(
                    Parameters::empty().with_property("text", Property::string("Text to echo"), true),
                )
                .build()
        }

        async fn execute(&self, args: &Value) -> Result<String> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(EchoTool));
        assert!(registry.contains("echo"));
        assert!(registry.get_handler("echo").is_some());
        assert!(registry.get_handler("missing").is_none());
        assert!(registry.resolve(&ToolCall::new("c", "echo", "{}")).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clones_share_tools() {
        let registry = ToolRegistry::new();
        let clone = registry.clone();
        clone.register(Arc::new(EchoTool));
        assert!(registry.contains("echo"));

        assert!(registry.remove("echo").is_some());
        assert!(!clone.contains("echo"));
    }

    #[test]
    fn test_declarations_sorted_by_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register_function("alpha", "First", json!({"type": "object"}), |_: Value| async {
            Ok(String::new())
        });

        let names: Vec<String> = registry.declarations().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "echo"]);
        assert_eq!(registry.tool_names(), vec!["alpha", "echo"]);
    }

    #[test]
    fn test_default_validation_checks_required_keys() {
        let tool = EchoTool;
        assert!(tool.validate_arguments(&json!({"text": "hi"})).is_ok());

        let err = tool.validate_arguments(&json!({})).unwrap_err();
        assert!(err.contains("text"));

        let err = tool.validate_arguments(&json!([1, 2])).unwrap_err();
        assert!(err.contains("object"));
    }
}
