use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the money moved for a trade.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Crypto,
    PayPal,
    MobilePay,
}

impl PaymentMethod {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_lowercase().as_str() {
            "crypto" => Some(Self::Crypto),
            "paypal" => Some(Self::PayPal),
            "mobilepay" => Some(Self::MobilePay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::PayPal => "paypal",
            Self::MobilePay => "mobilepay",
        }
    }

    pub const ALL: [PaymentMethod; 3] = [Self::Crypto, Self::PayPal, Self::MobilePay];
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded trade. Immutable once appended to the ledger; only a full
/// reset removes it.
///
/// Sign convention: a bought transaction stores a negative price (money
/// leaving), a sold one a positive price (money entering), so profit is a
/// plain sum over prices.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub amount: Decimal,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentMethod>,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// A purchase entry. The price sign the user typed is discarded.
    pub(crate) fn bought(amount: Decimal, price: Decimal, payment: Option<PaymentMethod>) -> Self {
        Self {
            amount,
            price: -price.abs(),
            payment,
            timestamp: Utc::now(),
        }
    }

    /// A sale entry. The price sign the user typed is discarded.
    pub(crate) fn sold(amount: Decimal, price: Decimal, payment: Option<PaymentMethod>) -> Self {
        Self {
            amount,
            price: price.abs(),
            payment,
            timestamp: Utc::now(),
        }
    }
}
