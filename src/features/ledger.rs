use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::transaction::{PaymentMethod, Transaction};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("You cannot sell {requested} BGL. Only {available} BGL in stock")]
    InsufficientInventory {
        requested: Decimal,
        available: Decimal,
    },

    #[error("No participant known as {0}")]
    UnknownParticipant(String),
}

/// All trades recorded for one participant key.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TradeHistory {
    pub bought: Vec<Transaction>,
    pub sold: Vec<Transaction>,
}

impl TradeHistory {
    /// Totals for this participant. Bought prices are stored negative and
    /// sold prices positive, so profit is the plain sum of both.
    pub fn summary(&self) -> ProfitSummary {
        let total_bought: Decimal = self.bought.iter().map(|tx| tx.price).sum();
        let total_sold: Decimal = self.sold.iter().map(|tx| tx.price).sum();
        ProfitSummary {
            total_bought,
            total_sold,
            profit: total_bought + total_sold,
        }
    }
}

/// The root persisted document: shared inventory plus every participant's
/// trade history. Persisted as `data.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    pub inventory: Decimal,
    pub users: BTreeMap<String, TradeHistory>,
}

impl Ledger {
    pub(crate) fn record_purchase(&mut self, key: &str, tx: Transaction) {
        self.inventory += tx.amount;
        self.users.entry(key.to_string()).or_default().bought.push(tx);
    }

    pub(crate) fn record_sale(&mut self, key: &str, tx: Transaction) -> Result<(), LedgerError> {
        if tx.amount > self.inventory {
            return Err(LedgerError::InsufficientInventory {
                requested: tx.amount,
                available: self.inventory,
            });
        }
        self.inventory -= tx.amount;
        self.users.entry(key.to_string()).or_default().sold.push(tx);
        Ok(())
    }

    /// Aggregate view over every participant. `profit_shares` is the fixed
    /// split count of the group, not the number of active participants.
    pub(crate) fn stats(&self, profit_shares: u32) -> StatsView {
        let mut view = StatsView {
            inventory: self.inventory,
            ..StatsView::default()
        };

        for (key, history) in &self.users {
            let summary = history.summary();
            view.totals.total_bought += summary.total_bought;
            view.totals.total_sold += summary.total_sold;

            for tx in &history.bought {
                if let Some(method) = tx.payment {
                    view.methods.entry(method).or_default().money += tx.price;
                }
            }
            for tx in &history.sold {
                if let Some(method) = tx.payment {
                    let bucket = view.methods.entry(method).or_default();
                    bucket.money += tx.price;
                    bucket.sold_amount += tx.amount;
                    bucket.sold_money += tx.price;
                }
            }

            view.participants.insert(key.clone(), summary);
        }

        view.totals.profit = view.totals.total_bought + view.totals.total_sold;
        view.profit_per_person = view.totals.profit / Decimal::from(profit_shares.max(1));
        view
    }
}

/// The identity registry document: external account id -> participant key.
/// Entries are only ever overwritten, never deleted. Persisted as
/// `config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Registry {
    pub users: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfitSummary {
    /// Sum of bought prices; negative or zero.
    pub total_bought: Decimal,
    /// Sum of sold prices; positive or zero.
    pub total_sold: Decimal,
    pub profit: Decimal,
}

/// Money flow through one payment method, summed over all participants.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MethodTotals {
    /// Net money through this method (bought negative, sold positive).
    pub money: Decimal,
    pub sold_amount: Decimal,
    pub sold_money: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsView {
    pub inventory: Decimal,
    pub participants: BTreeMap<String, ProfitSummary>,
    pub totals: ProfitSummary,
    pub profit_per_person: Decimal,
    pub methods: BTreeMap<PaymentMethod, MethodTotals>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn buy(ledger: &mut Ledger, key: &str, amount: Decimal, price: Decimal) {
        ledger.record_purchase(
            key,
            Transaction::bought(amount, price, Some(PaymentMethod::Crypto)),
        );
    }

    fn sell(
        ledger: &mut Ledger,
        key: &str,
        amount: Decimal,
        price: Decimal,
    ) -> Result<(), LedgerError> {
        ledger.record_sale(
            key,
            Transaction::sold(amount, price, Some(PaymentMethod::PayPal)),
        )
    }

    #[test]
    fn inventory_tracks_amount_flow() {
        let mut ledger = Ledger::default();
        buy(&mut ledger, "grilli", dec!(10), dec!(25));
        buy(&mut ledger, "masa", dec!(4), dec!(9));
        assert_eq!(ledger.inventory, dec!(14));

        sell(&mut ledger, "grilli", dec!(6), dec!(20)).unwrap();
        assert_eq!(ledger.inventory, dec!(8));

        let bought: Decimal = ledger
            .users
            .values()
            .flat_map(|h| &h.bought)
            .map(|tx| tx.amount)
            .sum();
        let sold: Decimal = ledger
            .users
            .values()
            .flat_map(|h| &h.sold)
            .map(|tx| tx.amount)
            .sum();
        assert_eq!(ledger.inventory, bought - sold);
    }

    #[test]
    fn overselling_is_rejected_without_mutation() {
        let mut ledger = Ledger::default();
        buy(&mut ledger, "grilli", dec!(5), dec!(10));

        let before = ledger.clone();
        let err = sell(&mut ledger, "grilli", dec!(6), dec!(30)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientInventory { available, .. } if available == dec!(5)
        ));
        assert_eq!(ledger, before);
    }

    #[test]
    fn stats_sum_across_participants() {
        let mut ledger = Ledger::default();
        buy(&mut ledger, "grilli", dec!(10), dec!(25));
        sell(&mut ledger, "grilli", dec!(4), dec!(20)).unwrap();
        buy(&mut ledger, "masa", dec!(2), dec!(5));

        let view = ledger.stats(2);
        assert_eq!(view.inventory, dec!(8));
        assert_eq!(view.totals.total_bought, dec!(-30));
        assert_eq!(view.totals.total_sold, dec!(20));
        assert_eq!(view.totals.profit, dec!(-10));
        assert_eq!(view.profit_per_person, dec!(-5));

        let grand: Decimal = view.participants.values().map(|s| s.profit).sum();
        assert_eq!(grand, view.totals.profit);
    }

    #[test]
    fn profit_split_ignores_activity_skew() {
        // Only one of the two parties traded; the divisor stays fixed.
        let mut ledger = Ledger::default();
        buy(&mut ledger, "grilli", dec!(10), dec!(10));
        sell(&mut ledger, "grilli", dec!(10), dec!(30)).unwrap();

        let view = ledger.stats(2);
        assert_eq!(view.totals.profit, dec!(20));
        assert_eq!(view.profit_per_person, dec!(10));
    }

    #[test]
    fn payment_methods_bucket_money_and_sold_amounts() {
        let mut ledger = Ledger::default();
        ledger.record_purchase(
            "grilli",
            Transaction::bought(dec!(10), dec!(25), Some(PaymentMethod::Crypto)),
        );
        ledger
            .record_sale(
                "grilli",
                Transaction::sold(dec!(4), dec!(18), Some(PaymentMethod::Crypto)),
            )
            .unwrap();
        ledger
            .record_sale(
                "grilli",
                Transaction::sold(dec!(2), dec!(9), Some(PaymentMethod::MobilePay)),
            )
            .unwrap();

        let view = ledger.stats(2);
        let crypto = &view.methods[&PaymentMethod::Crypto];
        assert_eq!(crypto.money, dec!(-7));
        assert_eq!(crypto.sold_amount, dec!(4));
        assert_eq!(crypto.sold_money, dec!(18));

        let mobilepay = &view.methods[&PaymentMethod::MobilePay];
        assert_eq!(mobilepay.money, dec!(9));
        assert_eq!(mobilepay.sold_amount, dec!(2));
        assert!(!view.methods.contains_key(&PaymentMethod::PayPal));
    }
}
