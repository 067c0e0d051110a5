//! Shared types for the API layer.

use std::sync::Arc;

use uuid::Uuid;

use crate::core_state::CoreState;
use crate::models::enums::UserRole;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Resolved request actor, injected into request extensions by the actor
/// middleware after the `X-User-Id` lookup succeeds.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub name: String,
    pub role: UserRole,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_context_is_cloneable_for_extensions() {
        let actor = ActorContext {
            user_id: Uuid::new_v4(),
            name: "Asha Rahman".to_string(),
            role: UserRole::Patient,
            is_admin: false,
        };
        let copy = actor.clone();
        assert_eq!(copy.user_id, actor.user_id);
        assert_eq!(copy.role, UserRole::Patient);
    }
}
