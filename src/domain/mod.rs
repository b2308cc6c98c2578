//! Backend-agnostic domain types.

mod ids;
mod membership;
mod money;
mod range;
mod row;
mod series;

pub use ids::{Ticker, UserId};
pub use membership::{
    MembershipKind, MembershipSet, MutationId, MutationOp, MutationRecord, MutationState,
};
pub use money::{Price, Quantity};
pub use range::RangeToken;
pub use row::{DetailRow, SummaryRecord};
pub use series::{CombinedQuote, DividendPayment, PricePoint, QuoteSnapshot};
