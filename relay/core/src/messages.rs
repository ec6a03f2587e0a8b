//! Identifiers and Turns
//!
//! The basic vocabulary shared by the relay and its clients: opaque ids for
//! turns, threads, responses and artifacts, plus the immutable [`Turn`].

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the identifier as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Turn identifier
    TurnId
);
string_id!(
    /// Conversation thread identifier, stable until the conversation is reset
    ThreadId
);
string_id!(
    /// Identifier of a single assistant response request
    ResponseId
);
string_id!(
    /// Identifier correlating an artifact with its follow-up edits
    ArtifactId
);

/// Who authored a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input
    User,
    /// Model output
    Assistant,
    /// Instruction prepended by the relay
    System,
}

impl Role {
    /// Wire name used by the completion API
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One message in a conversation
///
/// Fields are private so a turn cannot change after it is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    id: TurnId,
    role: Role,
    content: String,
}

impl Turn {
    /// Create a turn with a fresh id
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::with_id(TurnId::new(), role, content)
    }

    /// Create a turn with a known id (e.g. one sent by a client)
    pub fn with_id(id: TurnId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
        }
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Turn id
    #[must_use]
    pub fn id(&self) -> &TurnId {
        &self.id
    }

    /// Turn author
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Turn text
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}
