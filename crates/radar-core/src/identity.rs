//! User and session identity
//!
//! The backend hands out opaque string identifiers. Two newtypes keep the
//! roles apart:
//!
//! - [`UserId`]: the authenticated user of this client
//! - [`CounterpartId`]: the other participant of a one-to-one conversation
//!
//! [`Session`] replaces the loosely typed session object of the UI layer with
//! an explicit logged-out / logged-in distinction.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Identifier of the authenticated user
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines (first 8 characters)
    pub fn short_id(&self) -> &str {
        short(&self.0)
    }
}

/// Identifier of the other participant in a direct conversation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterpartId(String);

impl CounterpartId {
    /// Create a counterpart id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines (first 8 characters)
    pub fn short_id(&self) -> &str {
        short(&self.0)
    }

    /// Whether this counterpart is the given user
    pub fn is_user(&self, user: &UserId) -> bool {
        self.0 == user.0
    }
}

fn short(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for CounterpartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CounterpartId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CounterpartId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The sender of an inbound message is the counterpart of that conversation.
impl From<&UserId> for CounterpartId {
    fn from(user: &UserId) -> Self {
        Self(user.0.clone())
    }
}

impl From<UserId> for CounterpartId {
    fn from(user: UserId) -> Self {
        Self(user.0)
    }
}

/// Authentication state of the client
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Session {
    /// No authenticated user
    #[default]
    LoggedOut,
    /// A user is signed in
    LoggedIn {
        /// The signed-in user
        user_id: UserId,
    },
}

impl Session {
    /// Create a logged-in session
    pub fn logged_in(user_id: impl Into<UserId>) -> Self {
        Session::LoggedIn {
            user_id: user_id.into(),
        }
    }

    /// The signed-in user, if any
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Session::LoggedOut => None,
            Session::LoggedIn { user_id } => Some(user_id),
        }
    }

    /// Check if a user is signed in
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Session::LoggedIn { .. })
    }
}
