use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    Customer,
    Wholesaler,
    Admin,
    SuperAdmin,
}

impl UserRole {
    /// Admins and super admins manage orders and review payments.
    pub fn is_staff(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }
}

/// Who is performing an operation. Passed explicitly into every engine call and
/// recorded on audit entries; `user_id` is `None` for guests and system jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Option<i32>,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: i32, role: UserRole) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    pub fn admin(user_id: i32) -> Self {
        Self::new(user_id, UserRole::Admin)
    }

    pub fn customer(user_id: i32) -> Self {
        Self::new(user_id, UserRole::Customer)
    }

    pub fn guest() -> Self {
        Self {
            user_id: None,
            role: UserRole::Customer,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Staff may act on any order; other users only on orders they placed.
    pub fn can_act_for(&self, order_owner: Option<i32>) -> bool {
        self.is_staff() || (self.user_id.is_some() && self.user_id == order_owner)
    }
}
