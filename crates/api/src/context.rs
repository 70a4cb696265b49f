use labdesk_core::UserId;

/// Authenticated caller of a request.
///
/// Inserted by the auth middleware; every protected handler is scoped to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
