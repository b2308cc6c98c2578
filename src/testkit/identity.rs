//! Switchable identity source for logout/account-switch tests.

use parking_lot::RwLock;

use crate::domain::UserId;
use crate::port::IdentityProvider;

#[derive(Debug, Default)]
pub struct SwitchableIdentity {
    user: RwLock<Option<UserId>>,
}

impl SwitchableIdentity {
    #[must_use]
    pub fn logged_in(user: UserId) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    #[must_use]
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn switch_to(&self, user: UserId) {
        *self.user.write() = Some(user);
    }

    pub fn log_out(&self) {
        *self.user.write() = None;
    }
}

impl IdentityProvider for SwitchableIdentity {
    fn current_user(&self) -> Option<UserId> {
        *self.user.read()
    }
}
