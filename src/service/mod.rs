//! Stateful cache services and the view state machine.

mod bridge;
mod detail;
mod membership;
mod session;
mod stock_view;

pub use bridge::{InvalidationBridge, RefreshEvent};
pub use detail::{DetailCache, DetailCacheEntry};
pub use membership::{MembershipBadge, MembershipCache, MembershipEvent};
pub use session::{Session, SessionDeps};
pub use stock_view::{ErrorKind, StockView, StockViewSnapshot, ViewPhase};
