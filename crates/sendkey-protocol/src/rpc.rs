//! Typed RPC definitions for the sendkey protocol.
//!
//! Method names, notification names, and the payload conventions used
//! between the coordinator and its clients.

/// RPC request methods supported by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Fetch the current settings (defaults when the store is empty).
    GetSettings,
    /// Persist new settings and fan them out to every connected context.
    SetSettings,
    /// Get the coordinator status.
    Status,
    /// Request a coordinator shutdown.
    Shutdown,
}

impl Method {
    /// Stable string name for the method when talking to MRPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GetSettings => "get_settings",
            Method::SetSettings => "set_settings",
            Method::Status => "status",
            Method::Shutdown => "shutdown",
        }
    }

    /// Parse a method name received over MRPC.
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "get_settings" => Some(Method::GetSettings),
            "set_settings" => Some(Method::SetSettings),
            "status" => Some(Method::Status),
            "shutdown" => Some(Method::Shutdown),
            _ => None,
        }
    }
}

/// One-way coordinator→client notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Generic notification channel carrying encoded [`crate::MsgToContext`]
    /// payloads.
    Notify,
}

impl Notification {
    /// Stable string name for the notification channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Notification::Notify => "notify",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_roundtrip() {
        let methods = [
            Method::GetSettings,
            Method::SetSettings,
            Method::Status,
            Method::Shutdown,
        ];
        for m in methods {
            assert_eq!(Method::try_from_str(m.as_str()), Some(m));
        }
        assert_eq!(Method::try_from_str("unknown"), None);
    }
}
