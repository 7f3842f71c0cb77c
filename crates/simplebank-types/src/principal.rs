//! Authenticated caller identity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user on whose behalf a service call runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    pub fn owns(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}
