use rust_decimal::Decimal;
use shared::models::{BalanceItem, BalanceSnapshot};

/// Portfolio-wide fiat total over the listed items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TotalBalance {
    pub fiat_value: Decimal,
    /// Some item is not synced yet, so the figure may move
    pub dimmed: bool,
    /// Some item holds coins but has no price, so the figure undercounts
    pub has_unknown_prices: bool,
}

impl TotalBalance {
    pub fn from_items(items: &[BalanceItem]) -> Self {
        let mut total = TotalBalance::default();

        for item in items {
            match item.fiat_value() {
                Some(value) => total.fiat_value += value,
                None if item.balance_data.total() > Decimal::ZERO => {
                    total.has_unknown_prices = true
                }
                None => {}
            }

            if !item.state.is_synced() {
                total.dimmed = true;
            }
        }

        total
    }
}

impl From<&BalanceSnapshot> for TotalBalance {
    fn from(snapshot: &BalanceSnapshot) -> Self {
        Self::from_items(&snapshot.items)
    }
}
