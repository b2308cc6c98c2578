//! Membership sets and the optimistic mutation lifecycle.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{Ticker, UserId};

/// Which of the two tracked collections a ticker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipKind {
    Portfolio,
    Watchlist,
}

impl fmt::Display for MembershipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Portfolio => write!(f, "portfolio"),
            Self::Watchlist => write!(f, "watchlist"),
        }
    }
}

/// Direction of an optimistic membership mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Add,
    Remove,
}

impl MutationOp {
    /// The op that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::Add => Self::Remove,
            Self::Remove => Self::Add,
        }
    }
}

/// Lifecycle of an optimistic mutation.
///
/// A mutation is `Pending` from the moment it is applied locally until the
/// caller settles it based on the server's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    Committed,
    RolledBack,
}

/// Identifier handed back by `mutate_optimistic`, used to settle the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationId(Uuid);

impl MutationId {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recorded optimistic mutation with its settlement state.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub id: MutationId,
    pub kind: MembershipKind,
    pub ticker: Ticker,
    pub op: MutationOp,
    pub state: MutationState,
}

/// Per-user portfolio and watchlist membership.
///
/// Membership here is an optimistic prediction of server state: it may run
/// ahead of the server while a write is in flight, and the caller rolls it
/// back if that write fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipSet {
    pub owner: UserId,
    pub portfolio: HashSet<Ticker>,
    pub watchlist: HashSet<Ticker>,
    pub last_mutated: DateTime<Utc>,
}

impl MembershipSet {
    /// Create an empty set for a user, stamped at `now`.
    #[must_use]
    pub fn empty(owner: UserId, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            portfolio: HashSet::new(),
            watchlist: HashSet::new(),
            last_mutated: now,
        }
    }

    /// O(1) membership lookup, no I/O.
    #[must_use]
    pub fn is_member(&self, kind: MembershipKind, ticker: &Ticker) -> bool {
        self.collection(kind).contains(ticker)
    }

    /// Apply an op in place and advance `last_mutated`.
    pub fn apply(&mut self, kind: MembershipKind, ticker: Ticker, op: MutationOp, now: DateTime<Utc>) {
        let collection = self.collection_mut(kind);
        match op {
            MutationOp::Add => {
                collection.insert(ticker);
            }
            MutationOp::Remove => {
                collection.remove(&ticker);
            }
        }
        self.last_mutated = now;
    }

    fn collection(&self, kind: MembershipKind) -> &HashSet<Ticker> {
        match kind {
            MembershipKind::Portfolio => &self.portfolio,
            MembershipKind::Watchlist => &self.watchlist,
        }
    }

    fn collection_mut(&mut self, kind: MembershipKind) -> &mut HashSet<Ticker> {
        match kind {
            MembershipKind::Portfolio => &mut self.portfolio,
            MembershipKind::Watchlist => &mut self.watchlist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> MembershipSet {
        MembershipSet::empty(UserId::random(), Utc::now())
    }

    #[test]
    fn apply_add_then_remove() {
        let mut s = set();
        let t = Ticker::new("PETR4");
        let before = s.last_mutated;

        s.apply(MembershipKind::Portfolio, t.clone(), MutationOp::Add, Utc::now());
        assert!(s.is_member(MembershipKind::Portfolio, &t));
        assert!(!s.is_member(MembershipKind::Watchlist, &t));
        assert!(s.last_mutated >= before);

        s.apply(MembershipKind::Portfolio, t.clone(), MutationOp::Remove, Utc::now());
        assert!(!s.is_member(MembershipKind::Portfolio, &t));
    }

    #[test]
    fn remove_of_absent_ticker_is_harmless() {
        let mut s = set();
        s.apply(
            MembershipKind::Watchlist,
            Ticker::new("ITUB4"),
            MutationOp::Remove,
            Utc::now(),
        );
        assert!(s.watchlist.is_empty());
    }

    #[test]
    fn op_inverse_round_trips() {
        assert_eq!(MutationOp::Add.inverse(), MutationOp::Remove);
        assert_eq!(MutationOp::Remove.inverse(), MutationOp::Add);
    }
}
