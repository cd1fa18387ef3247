//! Identity resolved from the command line / environment.

use crate::error::{DeskError, Result};
use crate::models::{Actor, Role};

use super::traits::IdentityProvider;

/// Identity supplied up front (CLI flags, env, or a session token already verified upstream).
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    actor_id: Option<String>,
    role: Role,
}

impl StaticIdentity {
    pub fn new(actor_id: Option<String>, role: Role) -> Self {
        Self {
            actor_id: actor_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()),
            role,
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_actor(&self) -> Result<Actor> {
        let id = self.actor_id.clone().ok_or_else(|| {
            DeskError::Identity("no actor configured; pass --actor or set PROPDESK_ACTOR".to_string())
        })?;
        Ok(match self.role {
            Role::Admin => Actor::admin(id),
            Role::Trader => Actor::trader(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_configured_actor() {
        let identity = StaticIdentity::new(Some(" ops@example.com ".to_string()), Role::Admin);
        let actor = identity.current_actor().unwrap();
        assert_eq!(actor.id, "ops@example.com");
        assert!(actor.is_admin());
    }

    #[test]
    fn test_blank_actor_is_rejected() {
        let identity = StaticIdentity::new(Some("   ".to_string()), Role::Trader);
        assert!(matches!(identity.current_actor(), Err(DeskError::Identity(_))));
    }
}
