// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;

/// A function exposed to the model.
///
/// `name`, `description` and `schema` are borrowed so implementations can keep
/// them in statics or struct fields.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique within an agent's tool set
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn schema(&self) -> &Value;

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>>;
}
