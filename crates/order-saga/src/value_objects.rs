//! Value objects shared by the saga state and its message contracts.

use serde::{Deserialize, Serialize};

/// Declares a string-backed identifier issued by another service.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Stock keeping unit of a product.
    Sku
}

string_id! {
    /// Inventory's identifier for a stock hold.
    ReservationId
}

string_id! {
    /// Payments' identifier for a payment attempt.
    PaymentId
}

/// Money amount represented in cents to avoid floating point issues.
///
/// Serialized as a bare integer number of cents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.0.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Adds another amount, returning None on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies by a quantity, returning None on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// A priced line of an order, snapshotted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The product.
    pub sku: Sku,

    /// Number of units ordered.
    pub quantity: u32,

    /// Price per unit at checkout.
    pub unit_price: Money,

    /// `unit_price * quantity`, computed once.
    pub line_total: Money,
}

impl LineItem {
    /// Creates a line item, computing its total.
    ///
    /// Returns None if the total does not fit in a `Money`.
    pub fn new(sku: impl Into<Sku>, quantity: u32, unit_price: Money) -> Option<Self> {
        let line_total = unit_price.checked_multiply(quantity)?;
        Some(Self {
            sku: sku.into(),
            quantity,
            unit_price,
            line_total,
        })
    }
}

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Returns true if every mandatory field has content.
    pub fn is_complete(&self) -> bool {
        [
            &self.recipient,
            &self.line1,
            &self.city,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// Shipping speed chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
    Overnight,
}

impl ShippingMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "Standard",
            ShippingMethod::Express => "Express",
            ShippingMethod::Overnight => "Overnight",
        }
    }
}

impl std::fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque reference to the customer's stored payment method.
///
/// Only Payments can resolve it; the saga passes it through untouched.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethodToken(String);

impl PaymentMethodToken {
    /// Wraps a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the token is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

// Tokens stay out of logs
impl std::fmt::Debug for PaymentMethodToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PaymentMethodToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(8596).to_string(), "$85.96");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-250).to_string(), "-$2.50");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1999);
        let b = Money::from_cents(599);

        assert_eq!((a + b).cents(), 2598);
        assert_eq!((a - b).cents(), 1400);
        assert_eq!(a.checked_multiply(2), Some(Money::from_cents(3998)));
        assert_eq!(Money::from_cents(i64::MAX).checked_multiply(2), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(a), None);

        let total: Money = [a, b, Money::from_cents(1)].into_iter().sum();
        assert_eq!(total.cents(), 2599);
    }

    #[test]
    fn test_money_serializes_as_cents() {
        let json = serde_json::to_string(&Money::from_cents(1999)).unwrap();
        assert_eq!(json, "1999");
    }

    #[test]
    fn test_line_item_computes_total() {
        let item = LineItem::new("SKU-001", 2, Money::from_cents(1999)).unwrap();
        assert_eq!(item.sku, Sku::new("SKU-001"));
        assert_eq!(item.line_total, Money::from_cents(3998));
    }

    #[test]
    fn test_address_completeness() {
        let mut address = ShippingAddress {
            recipient: "Ada Lovelace".to_string(),
            line1: "12 Analytical Row".to_string(),
            line2: None,
            city: "London".to_string(),
            region: None,
            postal_code: "N1 9GU".to_string(),
            country: "GB".to_string(),
        };
        assert!(address.is_complete());

        address.city = "   ".to_string();
        assert!(!address.is_complete());
    }

    #[test]
    fn test_payment_token_is_redacted_in_debug() {
        let token = PaymentMethodToken::new("tok_visa_4242");
        assert!(!format!("{token:?}").contains("4242"));
        assert_eq!(token.as_str(), "tok_visa_4242");
        assert!(PaymentMethodToken::new(" ").is_blank());
    }

    #[test]
    fn test_string_ids_order_and_display() {
        let a = ReservationId::new("res-a");
        let b = ReservationId::from("res-b");
        assert!(a < b);
        assert_eq!(b.to_string(), "res-b");
        assert_eq!(PaymentId::from("pay-1".to_string()).as_str(), "pay-1");
    }
}
