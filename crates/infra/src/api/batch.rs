//! Batch execution over the CRM `batch` method
//!
//! Folds an ordered list of logical calls into physical `batch`
//! submissions of at most [`BATCH_COUNT`] commands each, pacing chunks so
//! large batches do not burst past the rate limiter.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use super::client::CrmClient;
use super::errors::CallError;

/// Maximum commands per physical batch submission
pub const BATCH_COUNT: usize = 50;

/// Pause between chunk submissions when more than one chunk exists
const CHUNK_PAUSE: Duration = Duration::from_millis(500);

/// One logical call inside a batch
#[derive(Debug, Clone)]
pub struct BatchCommand {
    /// Caller-supplied key the CRM echoes back in the nested results
    pub key: String,
    /// CRM method name (e.g. "crm.deal.get")
    pub method: String,
    /// Optional parameters, query-encoded into the command string
    pub params: Option<Value>,
}

impl BatchCommand {
    pub fn new(key: impl Into<String>, method: impl Into<String>) -> Self {
        Self { key: key.into(), method: method.into(), params: None }
    }

    pub fn with_params(
        key: impl Into<String>,
        method: impl Into<String>,
        params: Value,
    ) -> Self {
        Self { key: key.into(), method: method.into(), params: Some(params) }
    }
}

/// Result of one physical batch submission
///
/// Callers unpack the nested per-key results from the success payload
/// themselves; a failed chunk carries the terminal error's code and
/// message instead.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The chunk's CRM response body
    Success(Value),
    /// The chunk failed; recorded instead of a payload when halt is off
    Failed { code: String, message: String },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Executes ordered command lists as few physical calls
pub struct BatchExecutor {
    client: Arc<CrmClient>,
}

impl BatchExecutor {
    pub fn new(client: Arc<CrmClient>) -> Self {
        Self { client }
    }

    /// Execute `commands` in order as chunked `batch` submissions
    ///
    /// Returns one [`BatchOutcome`] per chunk, in chunk order. With
    /// `halt` set, the first failing chunk propagates immediately and the
    /// CRM also stops executing commands after the first failing command
    /// inside a chunk; without it, a failed chunk is recorded and the
    /// remaining chunks still run.
    ///
    /// # Errors
    ///
    /// Fails with a non-retryable `invalid_batch` error (zero HTTP) when
    /// `commands` is empty or any command carries non-object parameters,
    /// or with the first chunk failure when `halt` is set.
    #[instrument(skip(self, commands), fields(commands = commands.len(), halt))]
    pub async fn call_batch(
        &self,
        commands: &[BatchCommand],
        halt: bool,
    ) -> Result<Vec<BatchOutcome>, CallError> {
        if commands.is_empty() {
            return Err(CallError::invalid_batch("batch requires at least one command"));
        }
        if let Some(command) =
            commands.iter().find(|c| c.params.as_ref().is_some_and(|p| !p.is_object()))
        {
            return Err(CallError::invalid_batch(format!(
                "command '{}' params must be a JSON object",
                command.key
            )));
        }

        let chunks: Vec<&[BatchCommand]> = commands.chunks(BATCH_COUNT).collect();
        let mut outcomes = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(CHUNK_PAUSE).await;
            }

            debug!(chunk = index, size = chunk.len(), "submitting batch chunk");

            match self.client.call("batch", Self::chunk_payload(chunk, halt)).await {
                Ok(result) => outcomes.push(BatchOutcome::Success(result)),
                Err(error) if halt => {
                    warn!(chunk = index, code = %error.code, "batch chunk failed, halting");
                    return Err(error);
                }
                Err(error) => {
                    warn!(chunk = index, code = %error.code, "batch chunk failed, continuing");
                    outcomes.push(BatchOutcome::Failed {
                        code: error.code,
                        message: error.message,
                    });
                }
            }
        }

        Ok(outcomes)
    }

    /// Build the `{cmd, halt}` payload for one chunk
    fn chunk_payload(chunk: &[BatchCommand], halt: bool) -> Value {
        let mut cmd = Map::new();
        for command in chunk {
            cmd.insert(command.key.clone(), Value::String(Self::encode_command(command)));
        }
        json!({ "cmd": cmd, "halt": u8::from(halt) })
    }

    /// Encode one command as `method?queryString`
    ///
    /// Object- and array-valued parameters are JSON-encoded before being
    /// percent-encoded into the query string.
    fn encode_command(command: &BatchCommand) -> String {
        let Some(params) = command.params.as_ref().and_then(Value::as_object) else {
            return command.method.clone();
        };
        if params.is_empty() {
            return command.method.clone();
        }

        let query: Vec<String> = params
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(&text))
            })
            .collect();

        format!("{}?{}", command.method, query.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command_without_params() {
        let command = BatchCommand::new("profile", "profile");
        assert_eq!(BatchExecutor::encode_command(&command), "profile");
    }

    #[test]
    fn test_encode_command_with_scalar_params() {
        let command =
            BatchCommand::with_params("deal", "crm.deal.get", json!({ "id": 42, "full": true }));
        let encoded = BatchExecutor::encode_command(&command);
        assert_eq!(encoded, "crm.deal.get?full=true&id=42");
    }

    #[test]
    fn test_encode_command_json_encodes_objects() {
        let command = BatchCommand::with_params(
            "list",
            "crm.deal.list",
            json!({ "filter": { "STAGE_ID": "WON" } }),
        );
        let encoded = BatchExecutor::encode_command(&command);
        assert_eq!(
            encoded,
            "crm.deal.list?filter=%7B%22STAGE_ID%22%3A%22WON%22%7D"
        );
    }

    #[test]
    fn test_chunk_payload_shape() {
        let commands = vec![
            BatchCommand::new("a", "profile"),
            BatchCommand::with_params("b", "crm.deal.get", json!({ "id": 7 })),
        ];

        let payload = BatchExecutor::chunk_payload(&commands, true);

        assert_eq!(payload["halt"], 1);
        assert_eq!(payload["cmd"]["a"], "profile");
        assert_eq!(payload["cmd"]["b"], "crm.deal.get?id=7");

        let unhalted = BatchExecutor::chunk_payload(&commands, false);
        assert_eq!(unhalted["halt"], 0);
    }

    #[test]
    fn test_chunking_preserves_order_and_sizes() {
        let commands: Vec<BatchCommand> =
            (0..75).map(|i| BatchCommand::new(format!("cmd_{i}"), "profile")).collect();

        let chunks: Vec<&[BatchCommand]> = commands.chunks(BATCH_COUNT).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 50);
        assert_eq!(chunks[1].len(), 25);
        assert_eq!(chunks[0][0].key, "cmd_0");
        assert_eq!(chunks[1][0].key, "cmd_50");
    }
}
