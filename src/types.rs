//! NewType wrappers for strong typing throughout the orchestrator.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a session id where a system message id is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Name of a registered tool (e.g., "financial_calculator").
    ///
    /// This is the identifier the language model sees in function specs and
    /// the key the registry uses for lookup.
    ToolName
);

newtype_string!(
    /// Conversation session identifier.
    ///
    /// Requests without an explicit session share the `"default"` session.
    SessionId
);

newtype_string!(
    /// Identifier of a stored system message (a UUID string).
    SystemMessageId
);

impl SessionId {
    /// The session used when a request does not name one.
    pub fn default_session() -> Self {
        Self::new("default")
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::default_session()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_name_creation() {
        let name = ToolName::new("financial_calculator");
        assert_eq!(name.as_str(), "financial_calculator");
        assert_eq!(name.to_string(), "financial_calculator");
    }

    #[test]
    fn test_tool_name_serde() {
        let name = ToolName::new("market_analysis");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"market_analysis\"");

        let parsed: ToolName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn test_session_id_default() {
        assert_eq!(SessionId::default().as_str(), "default");
    }

    #[test]
    fn test_borrow_lookup() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(SystemMessageId::new("abc"), 1);
        assert_eq!(map.get("abc"), Some(&1));
    }
}
