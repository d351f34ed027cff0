use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

/// Feedback queued for the next dashboard read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Toast {
        level: ToastLevel,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        undo_token: Option<Uuid>,
    },
    /// Transient celebratory effect (confetti) with no payload beyond its message.
    Celebration { message: String },
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Notification::Toast {
            level: ToastLevel::Success,
            message: message.into(),
            undo_token: None,
        }
    }

    pub fn with_undo(message: impl Into<String>, token: Uuid) -> Self {
        Notification::Toast {
            level: ToastLevel::Info,
            message: message.into(),
            undo_token: Some(token),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notification::Toast {
            level: ToastLevel::Error,
            message: message.into(),
            undo_token: None,
        }
    }

    pub fn celebration(message: impl Into<String>) -> Self {
        Notification::Celebration {
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notification::Toast {
                level: ToastLevel::Error,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_serializes_with_kind_tag() {
        let json = serde_json::to_value(Notification::error("Failed")).unwrap();
        assert_eq!(json["kind"], "toast");
        assert_eq!(json["level"], "error");
        assert!(json.get("undo_token").is_none());

        let json = serde_json::to_value(Notification::celebration("Done!")).unwrap();
        assert_eq!(json["kind"], "celebration");
    }
}
