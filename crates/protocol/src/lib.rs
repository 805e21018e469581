use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const COMMAND_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Predict,
    Competitors,
    ValidateBonus,
    Preview,
    Policy,
}

impl CommandAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandAction::Predict => "predict",
            CommandAction::Competitors => "competitors",
            CommandAction::ValidateBonus => "validate_bonus",
            CommandAction::Preview => "preview",
            CommandAction::Policy => "policy",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct CommandRequest {
    pub action: CommandAction,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

/// Who can fix a failed request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// The end user can change their input (bonus type, score) and retry.
    UserCorrectable,
    /// Nothing to predict yet.
    NotFound,
    /// Data or configuration problem on the server side.
    Internal,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub severity: ErrorSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    Info,
    Warn,
    Action,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct Hint {
    #[serde(rename = "type")]
    pub kind: HintKind,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, JsonSchema)]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub meta: ResponseMeta,
}

impl CommandResponse {
    pub fn ok(data: Value, hints: Vec<Hint>, meta: ResponseMeta) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: None,
            error: None,
            hints,
            data,
            meta,
        }
    }

    pub fn error(error: ErrorEnvelope, meta: ResponseMeta) -> Self {
        Self {
            status: CommandStatus::Error,
            message: Some(error.message.clone()),
            error: Some(error),
            hints: Vec::new(),
            data: Value::Null,
            meta,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
