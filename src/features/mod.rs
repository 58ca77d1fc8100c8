mod ledger;
mod ops;
mod parse;
mod store;
mod transaction;

pub use self::{
    ledger::{Ledger, LedgerError, MethodTotals, ProfitSummary, Registry, StatsView, TradeHistory},
    ops::{IdentityPolicy, LedgerOps, OpError, PersonalView, TradeOutcome, RESET_SENTINEL},
    parse::{parse_amount, parse_price},
    store::{Store, StoreError},
    transaction::{PaymentMethod, Transaction},
};
