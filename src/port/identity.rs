//! User identity resolution port.

use crate::domain::UserId;

/// Resolves the currently logged-in user.
///
/// Absence means: no cache, no fetches, an empty render. The bridge and the
/// session re-check this after every await to discard responses that arrive
/// after a logout or account switch.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}
