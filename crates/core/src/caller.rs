use serde::{Deserialize, Serialize};

use crate::{GroupId, UserId};

/// User id that anonymous submissions are attributed to.
pub const GUEST_USER_ID: UserId = UserId::new(1);

/// Caller information passed explicitly into every query and action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    user_id: Option<UserId>,
    display_name: String,
    active_group: Option<GroupId>,
}

impl CallerContext {
    /// Creates a context for a logged-in user.
    #[must_use]
    pub fn authenticated(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            display_name: display_name.into(),
            active_group: None,
        }
    }

    /// Creates a context for a caller that is not logged in.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            display_name: "anonymous".to_owned(),
            active_group: None,
        }
    }

    /// Scopes the caller to an active group.
    #[must_use]
    pub fn with_active_group(mut self, group_id: GroupId) -> Self {
        self.active_group = Some(group_id);
        self
    }

    /// Returns the logged-in user, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns the user id new entries are attributed to.
    #[must_use]
    pub fn owner_id(&self) -> UserId {
        self.user_id.unwrap_or(GUEST_USER_ID)
    }

    /// Returns whether the caller is logged in.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some()
    }

    /// Returns the display name for the caller.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the group the caller is currently acting in.
    #[must_use]
    pub fn active_group(&self) -> Option<GroupId> {
        self.active_group
    }

    /// Returns the stable subject used for grants and audit records.
    #[must_use]
    pub fn subject(&self) -> String {
        match self.user_id {
            Some(user_id) => format!("user:{user_id}"),
            None => "anonymous".to_owned(),
        }
    }
}
