use rust_decimal::Decimal;
use thiserror::Error;

use super::{
    ledger::{Ledger, LedgerError, ProfitSummary, Registry, StatsView},
    parse::{parse_amount, parse_price},
    store::{Store, StoreError},
    transaction::{PaymentMethod, Transaction},
};

/// Exact, case-sensitive confirmation token required by [`LedgerOps::reset`].
pub const RESET_SENTINEL: &str = "RESET";

const DEFAULT_PROFIT_SHARES: u32 = 2;

/// How a caller's external account id resolves to a participant key.
#[derive(Debug, Clone)]
pub enum IdentityPolicy {
    /// Any caller is accepted; a registered display name becomes the key,
    /// otherwise the account id itself is used.
    Open,
    /// The caller's account must match one of the fixed keys directly.
    ClosedFixed { keys: Vec<String> },
    /// Accounts bind themselves to one of the fixed keys via `register`.
    ClosedRegistered { keys: Vec<String> },
}

#[derive(Error, Debug)]
pub enum OpError {
    #[error("Invalid amount {0:?}, expected something like 10bgl")]
    InvalidAmount(String),

    #[error("Invalid price {0:?}, expected something like 25€")]
    InvalidPrice(String),

    #[error("Unknown payment method {0:?}")]
    InvalidPayment(String),

    #[error("{key} is already registered to another account")]
    Conflict { key: String },

    #[error("This ledger uses a fixed participant set, registration is disabled")]
    RegistrationClosed,

    #[error("Type RESET exactly to confirm the reset")]
    ConfirmationMismatch,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

type OpResult<T> = Result<T, OpError>;

/// Result of one recorded trade, for the caller to render.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub key: String,
    pub amount: Decimal,
    /// As persisted: negative for purchases, positive for sales.
    pub price: Decimal,
    pub payment: Option<PaymentMethod>,
    pub inventory: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalView {
    pub key: String,
    pub summary: ProfitSummary,
}

/// The domain operations behind the command surface. Each call is one
/// load-mutate-commit transition on the persisted ledger; nothing is held
/// across commits.
pub struct LedgerOps {
    store: Store,
    policy: IdentityPolicy,
    profit_shares: u32,
}

impl LedgerOps {
    pub fn new(store: Store, policy: IdentityPolicy) -> Self {
        // The profit split is a design constant of the group, not derived
        // from recorded activity.
        let profit_shares = match &policy {
            IdentityPolicy::Open => DEFAULT_PROFIT_SHARES,
            IdentityPolicy::ClosedFixed { keys } | IdentityPolicy::ClosedRegistered { keys } => {
                keys.len().max(1) as u32
            }
        };
        Self {
            store,
            policy,
            profit_shares,
        }
    }

    pub fn with_profit_shares(mut self, shares: u32) -> Self {
        self.profit_shares = shares.max(1);
        self
    }

    /// Bind `account` to a participant key. Under the open policy the key is
    /// a free-form display name; under the registered policy it must be one
    /// of the fixed keys and must not belong to someone else. Rebinding an
    /// account evicts whatever key it previously held.
    pub fn register(&self, account: &str, key: &str) -> OpResult<String> {
        match &self.policy {
            IdentityPolicy::Open => {
                self.store
                    .update_registry(|registry: &mut Registry| -> OpResult<()> {
                        registry.users.insert(account.to_string(), key.to_string());
                        Ok(())
                    })?;
                Ok(key.to_string())
            }
            IdentityPolicy::ClosedFixed { .. } => Err(OpError::RegistrationClosed),
            IdentityPolicy::ClosedRegistered { keys } => {
                if !keys.iter().any(|k| k == key) {
                    return Err(LedgerError::UnknownParticipant(key.to_string()).into());
                }
                self.store
                    .update_registry(|registry: &mut Registry| -> OpResult<()> {
                        let held_elsewhere = registry
                            .users
                            .iter()
                            .any(|(acct, bound)| bound == key && acct != account);
                        if held_elsewhere {
                            return Err(OpError::Conflict {
                                key: key.to_string(),
                            });
                        }
                        registry.users.insert(account.to_string(), key.to_string());
                        Ok(())
                    })?;
                Ok(key.to_string())
            }
        }
    }

    pub fn record_purchase(
        &self,
        account: &str,
        amount_text: &str,
        price_text: &str,
        payment: Option<PaymentMethod>,
    ) -> OpResult<TradeOutcome> {
        let key = self.resolve(account)?;
        let amount = parse_amount(amount_text)
            .ok_or_else(|| OpError::InvalidAmount(amount_text.to_string()))?;
        let price =
            parse_price(price_text).ok_or_else(|| OpError::InvalidPrice(price_text.to_string()))?;

        let tx = Transaction::bought(amount, price, payment);
        let price = tx.price;
        let inventory = self
            .store
            .update_ledger(|ledger: &mut Ledger| -> OpResult<Decimal> {
                ledger.record_purchase(&key, tx);
                Ok(ledger.inventory)
            })?;

        Ok(TradeOutcome {
            key,
            amount,
            price,
            payment,
            inventory,
        })
    }

    pub fn record_sale(
        &self,
        account: &str,
        amount_text: &str,
        price_text: &str,
        payment: Option<PaymentMethod>,
    ) -> OpResult<TradeOutcome> {
        let key = self.resolve(account)?;
        let amount = parse_amount(amount_text)
            .ok_or_else(|| OpError::InvalidAmount(amount_text.to_string()))?;
        let price =
            parse_price(price_text).ok_or_else(|| OpError::InvalidPrice(price_text.to_string()))?;

        let tx = Transaction::sold(amount, price, payment);
        let price = tx.price;
        // The inventory check runs inside the gate, against the latest
        // committed state.
        let inventory = self
            .store
            .update_ledger(|ledger: &mut Ledger| -> OpResult<Decimal> {
                ledger.record_sale(&key, tx)?;
                Ok(ledger.inventory)
            })?;

        Ok(TradeOutcome {
            key,
            amount,
            price,
            payment,
            inventory,
        })
    }

    /// Aggregate statistics over the whole ledger. Pure read.
    pub fn stats(&self) -> OpResult<StatsView> {
        let ledger = self.store.read_ledger()?;
        Ok(ledger.stats(self.profit_shares))
    }

    /// One participant's totals. Fails if the key has no recorded trades yet.
    pub fn personal_stats(&self, account: &str) -> OpResult<PersonalView> {
        let key = self.resolve(account)?;
        let ledger = self.store.read_ledger()?;
        match ledger.users.get(&key) {
            Some(history) => Ok(PersonalView {
                summary: history.summary(),
                key,
            }),
            None => Err(LedgerError::UnknownParticipant(key).into()),
        }
    }

    /// Replace the whole ledger with the empty default. Gated on the exact
    /// sentinel; anything else is a rejected no-op.
    pub fn reset(&self, confirmation: &str) -> OpResult<()> {
        if confirmation != RESET_SENTINEL {
            return Err(OpError::ConfirmationMismatch);
        }
        self.store
            .update_ledger(|ledger: &mut Ledger| -> OpResult<()> {
                *ledger = Ledger::default();
                Ok(())
            })
    }

    fn resolve(&self, account: &str) -> OpResult<String> {
        match &self.policy {
            IdentityPolicy::Open => {
                let registry = self.store.read_registry()?;
                Ok(registry
                    .users
                    .get(account)
                    .cloned()
                    .unwrap_or_else(|| account.to_string()))
            }
            IdentityPolicy::ClosedFixed { keys } => keys
                .iter()
                .find(|k| k.eq_ignore_ascii_case(account))
                .cloned()
                .ok_or_else(|| LedgerError::UnknownParticipant(account.to_string()).into()),
            IdentityPolicy::ClosedRegistered { .. } => {
                let registry = self.store.read_registry()?;
                registry
                    .users
                    .get(account)
                    .cloned()
                    .ok_or_else(|| LedgerError::UnknownParticipant(account.to_string()).into())
            }
        }
    }
}
