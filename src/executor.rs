// Concurrent tool execution with per-tool failure isolation

use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::orchestrator::PlannedCall;
use crate::types::ToolName;

/// A tool's successful, non-null output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub tool_name: ToolName,
    pub value: Value,
}

/// Runs planned calls concurrently. Each call gets its own task, so an error,
/// panic or timeout in one tool only drops that tool's output.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Execute every call; outputs come back in the order the calls were given.
    pub async fn run(&self, calls: Vec<PlannedCall>) -> Vec<ToolOutput> {
        let timeout = self.timeout;
        let handles: Vec<_> = calls
            .into_iter()
            .map(|call| {
                let name = ToolName::new(call.tool.name());
                let task = tokio::spawn(async move {
                    tokio::time::timeout(timeout, call.tool.execute(call.args)).await
                });
                (name, task)
            })
            .collect();

        let (names, tasks): (Vec<ToolName>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(tasks).await;

        names
            .into_iter()
            .zip(results)
            .filter_map(|(tool_name, joined)| match joined {
                Ok(Ok(Ok(Value::Null))) => {
                    debug!(tool = %tool_name, "Tool returned no output");
                    None
                }
                Ok(Ok(Ok(value))) => Some(ToolOutput { tool_name, value }),
                Ok(Ok(Err(e))) => {
                    warn!(tool = %tool_name, "Tool failed: {}", e);
                    None
                }
                Ok(Err(_)) => {
                    warn!(tool = %tool_name, "Tool timed out after {:?}", timeout);
                    None
                }
                Err(e) => {
                    error!(tool = %tool_name, "Tool task aborted: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
