//! Tool dispatcher: executes a single tool call safely.
//!
//! Every path returns a [`ToolResult`]: unknown tools, bad arguments,
//! handler failures, panics, timeouts and cancellation all become an error
//! payload the model can read. Nothing is propagated to the caller.
//!
//! Handlers run on a spawned task, so a slow host action never blocks the
//! task driving the conversation. The wait is bounded; on timeout the
//! action's [`CancellationToken`] is cancelled and the dispatcher returns
//! without waiting for the action to wind down.

use std::any::Any;
use std::time::{Duration, Instant};

use benchmate_core::capability::{ActionDescriptor, ActionOutput, ArgValue, Arguments, ParamSpec, ParamType};
use benchmate_core::error::{ActionError, ToolError};
use benchmate_core::tool::{ToolCall, ToolResult};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::descriptor::RegisteredAction;

/// Upper bound on error text handed to the model.
const MAX_ERROR_CHARS: usize = 500;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes tool calls with argument coercion and a bounded wait.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `call` against `action` (or report it unknown when `None`).
    pub async fn dispatch(
        &self,
        action: Option<&RegisteredAction>,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> ToolResult {
        let start = Instant::now();
        let outcome = match action {
            Some(action) => self.invoke(action, call, cancel).await,
            None => Err(ToolError::UnknownTool(call.name.clone())),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                debug!(tool = %call.name, call_id = %call.id, duration_ms, "Tool call succeeded");
                ToolResult {
                    call_id: call.id.clone(),
                    success: true,
                    output: output.text,
                    data: output.data,
                }
            }
            Err(e) => {
                warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    kind = e.kind(),
                    duration_ms,
                    error = %e,
                    "Tool call failed"
                );
                ToolResult::failure(&call.id, &e)
            }
        }
    }

    async fn invoke(
        &self,
        action: &RegisteredAction,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<ActionOutput, ToolError> {
        let tool = action.descriptor.name.clone();
        let args = coerce_arguments(&action.descriptor, &call.arguments)?;

        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled { tool });
        }

        let token = cancel.child_token();
        let handler = action.handler.clone();
        let child = token.clone();
        // The handler itself runs on the task, so its synchronous part is
        // bounded and panic-contained too.
        let mut task = tokio::spawn(async move { handler(args, child).await });

        tokio::select! {
            joined = tokio::time::timeout(self.timeout, &mut task) => match joined {
                Ok(Ok(Ok(output))) => Ok(output),
                Ok(Ok(Err(e))) => Err(from_action_error(&tool, e)),
                Ok(Err(join_error)) => {
                    let reason = if join_error.is_panic() {
                        format!("action panicked: {}", panic_message(join_error.into_panic()))
                    } else {
                        "action task was aborted".to_string()
                    };
                    Err(ToolError::ExecutionFailed { tool, reason: sanitize(&reason) })
                }
                Err(_) => {
                    token.cancel();
                    warn!(tool = %tool, timeout_ms = self.timeout.as_millis() as u64, "Tool call timed out, cancelling action");
                    Err(ToolError::Timeout {
                        tool,
                        timeout_ms: self.timeout.as_millis() as u64,
                    })
                }
            },
            _ = cancel.cancelled() => {
                token.cancel();
                Err(ToolError::Cancelled { tool })
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

fn from_action_error(tool: &str, error: ActionError) -> ToolError {
    match error {
        ActionError::InvalidArgument { argument, reason } => ToolError::InvalidArgument {
            tool: tool.to_string(),
            argument,
            reason: sanitize(&reason),
        },
        ActionError::Failed(reason) => ToolError::ExecutionFailed {
            tool: tool.to_string(),
            reason: sanitize(&reason),
        },
        ActionError::Cancelled => ToolError::Cancelled {
            tool: tool.to_string(),
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Strip control characters and cap the length of host error text.
pub fn sanitize(message: &str) -> String {
    let cleaned: String = message
        .chars()
        .map(|c| if c.is_control() && c != '\n' && c != '\t' { ' ' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.chars().count() > MAX_ERROR_CHARS {
        let truncated: String = cleaned.chars().take(MAX_ERROR_CHARS).collect();
        format!("{truncated}…")
    } else {
        cleaned.to_string()
    }
}

// ── Argument coercion ─────────────────────────────────────────────────────

/// Coerce the model's loosely typed arguments against a descriptor.
pub fn coerce_arguments(descriptor: &ActionDescriptor, raw: &Value) -> Result<Arguments, ToolError> {
    let invalid = |argument: &str, reason: String| ToolError::InvalidArgument {
        tool: descriptor.name.clone(),
        argument: argument.to_string(),
        reason,
    };

    let object = match raw {
        Value::Null => serde_json::Map::new(),
        Value::Object(map) => map.clone(),
        Value::String(s) if s.trim().is_empty() => serde_json::Map::new(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => return Err(invalid("arguments", "expected a JSON object".into())),
        },
        _ => return Err(invalid("arguments", "expected a JSON object".into())),
    };

    let mut args = Arguments::new();
    for param in &descriptor.params {
        match object.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(invalid(&param.name, "required argument is missing".into()));
                }
            }
            Some(value) => {
                let coerced = coerce_value(param, value).map_err(|reason| invalid(&param.name, reason))?;
                args.insert(param.name.clone(), coerced);
            }
        }
    }

    for key in object.keys() {
        if descriptor.param(key).is_none() {
            debug!(tool = %descriptor.name, argument = %key, "Ignoring unknown argument");
        }
    }

    Ok(args)
}

fn coerce_value(param: &ParamSpec, value: &Value) -> Result<ArgValue, String> {
    match param.ty {
        ParamType::String => {
            let s = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err("expected a string".into()),
            };
            if param.required && s.trim().is_empty() {
                return Err("must not be empty".into());
            }
            Ok(ArgValue::Str(s))
        }
        ParamType::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(ArgValue::Int)
                .ok_or_else(|| format!("expected an integer, got {n}")),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(ArgValue::Int)
                .map_err(|_| format!("expected an integer, got '{s}'")),
            _ => Err("expected an integer".into()),
        },
        ParamType::Number => match value {
            Value::Number(n) => n
                .as_f64()
                .map(ArgValue::Float)
                .ok_or_else(|| format!("expected a number, got {n}")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(ArgValue::Float)
                .ok_or_else(|| format!("expected a number, got '{s}'")),
            _ => Err("expected a number".into()),
        },
        ParamType::Boolean => match value {
            Value::Bool(b) => Ok(ArgValue::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(ArgValue::Bool(true)),
                "false" | "no" | "0" => Ok(ArgValue::Bool(false)),
                _ => Err(format!("expected a boolean, got '{s}'")),
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(ArgValue::Bool(false)),
                Some(1) => Ok(ArgValue::Bool(true)),
                _ => Err(format!("expected a boolean, got {n}")),
            },
            _ => Err("expected a boolean".into()),
        },
    }
}
