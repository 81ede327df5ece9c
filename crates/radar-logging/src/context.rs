//! Session context injection
//!
//! Thread-local storage for the signed-in user, so spans opened within a
//! scope can be attributed to a session.

use std::cell::RefCell;

use radar_core::UserId;
use uuid::Uuid;

/// Session context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContextData {
    /// Shortened id of the signed-in user
    pub user_id: String,
    /// Unique id for this client session
    pub session_id: Uuid,
}

thread_local! {
    static SESSION_CONTEXT: RefCell<Option<SessionContextData>> = const { RefCell::new(None) };
}

/// RAII guard for session context
///
/// Sets the session context for the current thread; dropping the guard
/// restores whatever was set before.
///
/// ```ignore
/// let _guard = SessionContextGuard::new(&user_id);
/// tracing::info!("Refreshing unread counts");
/// ```
pub struct SessionContextGuard {
    previous: Option<SessionContextData>,
}

impl SessionContextGuard {
    /// Attribute the current scope to `user`
    pub fn new(user: &UserId) -> Self {
        Self::with_session_id(user, Uuid::new_v4())
    }

    /// Attribute the current scope to `user` with a known session id
    pub fn with_session_id(user: &UserId, session_id: Uuid) -> Self {
        let data = SessionContextData {
            user_id: user.short_id().to_string(),
            session_id,
        };
        let previous = SESSION_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));
        Self { previous }
    }

    /// Get the current session context (if any)
    pub fn current() -> Option<SessionContextData> {
        SESSION_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current user id (if set)
    pub fn current_user_id() -> Option<String> {
        Self::current().map(|ctx| ctx.user_id)
    }
}

impl Drop for SessionContextGuard {
    fn drop(&mut self) {
        SESSION_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_context_guard() {
        assert!(SessionContextGuard::current().is_none());

        {
            let _guard = SessionContextGuard::new(&UserId::new("3f2a9c1e-77b0-4c1d"));
            assert_eq!(
                SessionContextGuard::current_user_id(),
                Some("3f2a9c1e".to_string())
            );
        }

        assert!(SessionContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_contexts() {
        let _outer = SessionContextGuard::new(&UserId::new("alice"));
        {
            let _inner = SessionContextGuard::new(&UserId::new("bob"));
            assert_eq!(SessionContextGuard::current_user_id(), Some("bob".into()));
        }
        assert_eq!(SessionContextGuard::current_user_id(), Some("alice".into()));
    }

    #[test]
    fn test_with_session_id() {
        let session_id = Uuid::new_v4();
        let _guard = SessionContextGuard::with_session_id(&UserId::new("carol"), session_id);

        assert_eq!(SessionContextGuard::current().unwrap().session_id, session_id);
    }
}
