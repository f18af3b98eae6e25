use rust_decimal::{Decimal, RoundingStrategy};

/// 통화 소수 자릿수 (EUR 기준 센트 단위)
pub const MONEY_SCALE: u32 = 2;

/// 금액을 통화 단위로 반올림 (half-up, 0.005 → 0.01)
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount` 에서 `percent`% 만큼 할인한 금액
pub fn apply_percent_discount(amount: Decimal, percent: Decimal) -> Decimal {
    round_money(amount * (Decimal::ONE_HUNDRED - percent) / Decimal::ONE_HUNDRED)
}
