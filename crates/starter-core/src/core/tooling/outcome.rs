use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::errors::starter_error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: message.into(),
            details,
        }
    }

    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Failure,
            message: message.into(),
            details,
        }
    }

    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::UserError,
            message: message.into(),
            details,
        }
    }

    /// Classify a failed launch: an app with nothing runnable is the
    /// user's to fix, everything else is a launcher failure.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        match starter_error(err) {
            Some(typed) => {
                let details = json!({
                    "code": typed.code(),
                    "error": format!("{err:#}"),
                });
                if typed.is_entry_point_failure() {
                    Self::user_error("cannot run this app", details)
                } else {
                    Self::failure("failed to prepare the app", details)
                }
            }
            None => Self::failure(
                "failed to prepare the app",
                json!({ "error": format!("{err:#}") }),
            ),
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.status {
            CommandStatus::Ok => 0,
            CommandStatus::UserError => 1,
            CommandStatus::Failure => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
}

/// `{status, message, details}` envelope printed by `--json`.
#[must_use]
pub fn to_json_response(outcome: &ExecutionOutcome) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": outcome.message,
        "details": details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StarterError;
    use std::path::PathBuf;

    #[test]
    fn entry_point_failures_are_user_errors() {
        let err = anyhow::Error::new(StarterError::NoEntryPoint {
            folder: PathBuf::from("app"),
        });
        let outcome = ExecutionOutcome::from_error(&err);
        assert_eq!(outcome.status, CommandStatus::UserError);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.details["code"], "no_entry_point");
    }

    #[test]
    fn install_failures_survive_added_context() {
        let err = anyhow::Error::new(StarterError::InstallFailed {
            label: "app".into(),
            code: Some(1),
            stderr: "boom".into(),
        })
        .context("preparing app");
        let outcome = ExecutionOutcome::from_error(&err);
        assert_eq!(outcome.status, CommandStatus::Failure);
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(outcome.details["code"], "install_failed");
    }

    #[test]
    fn untyped_errors_are_failures() {
        let outcome = ExecutionOutcome::from_error(&anyhow::anyhow!("disk full"));
        assert_eq!(outcome.status, CommandStatus::Failure);
        assert!(outcome.details["error"]
            .as_str()
            .is_some_and(|msg| msg.contains("disk full")));
    }

    #[test]
    fn json_envelope_wraps_non_object_details() {
        let outcome = ExecutionOutcome::user_error("cannot run this app", Value::from(3));
        assert_eq!(
            to_json_response(&outcome),
            json!({
                "status": "user-error",
                "message": "cannot run this app",
                "details": { "value": 3 },
            })
        );
        let ok = ExecutionOutcome::success("started", Value::Null);
        assert_eq!(to_json_response(&ok)["details"], json!({}));
    }
}
