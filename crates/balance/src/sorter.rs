//! Deterministic ordering of balance items
//!
//! Every mode ends in [`identity_order`], so two items compare equal only when
//! they are the same wallet. The result never depends on the input order.

use rust_decimal::Decimal;
use shared::models::{BalanceItem, SortType};
use std::cmp::Ordering;

/// Sort items in place for the given mode
pub fn sort(items: &mut [BalanceItem], sort_type: SortType) {
    match sort_type {
        SortType::Value => items.sort_by(by_value),
        SortType::Name => items.sort_by(by_name),
        SortType::PercentGrowth => items.sort_by(by_percent_growth),
    }
}

pub fn sorted(mut items: Vec<BalanceItem>, sort_type: SortType) -> Vec<BalanceItem> {
    sort(&mut items, sort_type);
    items
}

/// Nonzero balances first, then by fiat value, coin amount, chain priority and name
pub fn by_value(a: &BalanceItem, b: &BalanceItem) -> Ordering {
    let a_total = a.balance_data.total();
    let b_total = b.balance_data.total();
    let a_fiat = a.fiat_value().unwrap_or(Decimal::ZERO);
    let b_fiat = b.fiat_value().unwrap_or(Decimal::ZERO);

    (b_total > Decimal::ZERO)
        .cmp(&(a_total > Decimal::ZERO))
        .then_with(|| (b_fiat > Decimal::ZERO).cmp(&(a_fiat > Decimal::ZERO)))
        .then_with(|| b_fiat.cmp(&a_fiat))
        .then_with(|| b_total.cmp(&a_total))
        .then_with(|| {
            a.wallet
                .token
                .blockchain
                .priority()
                .cmp(&b.wallet.token.blockchain.priority())
        })
        .then_with(|| name_order(a, b))
        .then_with(|| identity_order(a, b))
}

pub fn by_name(a: &BalanceItem, b: &BalanceItem) -> Ordering {
    name_order(a, b).then_with(|| identity_order(a, b))
}

/// Price change descending; items without a known change go last, by name
pub fn by_percent_growth(a: &BalanceItem, b: &BalanceItem) -> Ordering {
    match (change_percent(a), change_percent(b)) {
        (Some(a_change), Some(b_change)) => b_change
            .cmp(&a_change)
            .then_with(|| name_order(a, b))
            .then_with(|| identity_order(a, b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => by_name(a, b),
    }
}

fn change_percent(item: &BalanceItem) -> Option<Decimal> {
    item.coin_price.as_ref().and_then(|price| price.change_percent)
}

fn name_order(a: &BalanceItem, b: &BalanceItem) -> Ordering {
    let a_token = &a.wallet.token;
    let b_token = &b.wallet.token;

    a_token
        .coin_name
        .to_lowercase()
        .cmp(&b_token.coin_name.to_lowercase())
        .then_with(|| a_token.coin_name.cmp(&b_token.coin_name))
        .then_with(|| a_token.coin_code.cmp(&b_token.coin_code))
}

fn identity_order(a: &BalanceItem, b: &BalanceItem) -> Ordering {
    a.wallet
        .token
        .blockchain
        .priority()
        .cmp(&b.wallet.token.blockchain.priority())
        .then_with(|| a.wallet.token.query_id.cmp(&b.wallet.token.query_id))
        .then_with(|| a.wallet.account.id.cmp(&b.wallet.account.id))
}
