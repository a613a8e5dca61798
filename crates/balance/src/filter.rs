use rust_decimal::Decimal;
use shared::models::{BalanceItem, Token};
use std::sync::Arc;

/// Decides which tokens stay listed even with an empty balance
pub type AlwaysVisible = Arc<dyn Fn(&Token) -> bool + Send + Sync>;

/// Native chain assets are always listed
pub fn native_tokens() -> AlwaysVisible {
    Arc::new(|token: &Token| token.native)
}

/// Zero-balance filter applied after every sort
#[derive(Clone)]
pub struct BalanceFilter {
    always_visible: AlwaysVisible,
}

impl BalanceFilter {
    pub fn new(always_visible: AlwaysVisible) -> Self {
        Self { always_visible }
    }

    pub fn is_visible(&self, item: &BalanceItem, hide_zero_balances: bool) -> bool {
        !hide_zero_balances
            || (self.always_visible)(&item.wallet.token)
            || item.balance_data.total() > Decimal::ZERO
    }

    /// Keep visible items, preserving their order
    pub fn apply(&self, items: Vec<BalanceItem>, hide_zero_balances: bool) -> Vec<BalanceItem> {
        if !hide_zero_balances {
            return items;
        }

        items
            .into_iter()
            .filter(|item| self.is_visible(item, hide_zero_balances))
            .collect()
    }
}

impl Default for BalanceFilter {
    fn default() -> Self {
        Self::new(native_tokens())
    }
}
