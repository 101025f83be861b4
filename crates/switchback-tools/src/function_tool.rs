use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use switchback_common::tools::ToolDeclaration;

use crate::ToolImplementation;

/// A tool backed by an async function with typed arguments.
///
/// Arguments that fail to deserialize into `A` are rejected during
/// validation, so the function only ever sees well-formed input.
pub struct FunctionTool<A, F> {
    declaration: ToolDeclaration,
    handler: F,
    _args: PhantomData<fn() -> A>,
}

impl<A, F> FunctionTool<A, F> {
    pub const fn new(declaration: ToolDeclaration, handler: F) -> Self {
        Self {
            declaration,
            handler,
            _args: PhantomData,
        }
    }
}

impl<A, F> fmt::Debug for FunctionTool<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.declaration.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<A, F, Fut> ToolImplementation for FunctionTool<A, F>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    fn declaration(&self) -> ToolDeclaration {
        self.declaration.clone()
    }

    fn validate_arguments(&self, args: &Value) -> std::result::Result<(), String> {
        A::deserialize(args).map(|_| ()).map_err(|e| e.to_string())
    }

    async fn execute(&self, args: &Value) -> Result<String> {
        let args = A::deserialize(args)?;
        (self.handler)(args).await
    }
}
