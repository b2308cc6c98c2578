//! Monetary types for price and quantity representation.

use rust_decimal::Decimal;

/// Price represented as a Decimal for precision.
pub type Price = Decimal;

/// Share quantity represented as a Decimal for precision.
pub type Quantity = Decimal;
