use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::domains::orders::models::{
    CartItem, CatalogGame, CheckoutRequest, KeySource, Quote, QuotedLine,
};
use crate::shared::database::{CatalogStore, KeyPool};
use crate::shared::errors::FulfillmentError;
use crate::shared::utils::money::round_money;

/// 장바구니 검증 + 가격 확정
/// Validates a cart against the catalog and fixes the amount to charge
///
/// 가격은 항상 카탈로그(games.price, games.discount_percent)에서 다시 읽는다.
/// 화면에 표시된 가격은 비교용으로만 사용한다.
#[derive(Clone)]
pub struct CartValidator {
    catalog: Arc<dyn CatalogStore>,
    keys: Arc<dyn KeyPool>,
    currency: String,
    max_line_quantity: u32,
}

/// 같은 게임 라인 병합 (순서 유지)
fn merge_lines(items: &[CartItem]) -> Result<Vec<CartItem>, FulfillmentError> {
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(FulfillmentError::InvalidCart(format!(
                "quantity for game {} must be at least 1",
                item.game_id
            )));
        }
        match merged.iter_mut().find(|m| m.game_id == item.game_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                match (existing.expected_price, item.expected_price) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(FulfillmentError::InvalidCart(format!(
                            "conflicting prices for game {}",
                            item.game_id
                        )));
                    }
                    (None, Some(b)) => existing.expected_price = Some(b),
                    _ => {}
                }
            }
            None => merged.push(item.clone()),
        }
    }
    Ok(merged)
}

impl CartValidator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        keys: Arc<dyn KeyPool>,
        currency: impl Into<String>,
        max_line_quantity: u32,
    ) -> Self {
        Self {
            catalog,
            keys,
            currency: currency.into(),
            max_line_quantity,
        }
    }

    /// 장바구니 검증
    ///
    /// # Errors
    /// * `InvalidCart` - 빈 장바구니, 수량 0 또는 한도 초과
    /// * `GameNotFound` - 없는 게임 또는 판매 중지
    /// * `PriceMismatch` - 클라이언트 가격과 현재 가격이 다름
    /// * `OutOfStock` - 재고 부족
    /// * `InvalidPromoCode` - 없거나 만료/소진된 코드
    pub async fn quote(&self, request: &CheckoutRequest) -> Result<Quote, FulfillmentError> {
        if request.items.is_empty() {
            return Err(FulfillmentError::InvalidCart("cart is empty".to_string()));
        }

        let items = merge_lines(&request.items)?;
        let mut lines = Vec::with_capacity(items.len());

        for item in items {
            if item.quantity > self.max_line_quantity {
                return Err(FulfillmentError::InvalidCart(format!(
                    "quantity {} for game {} exceeds the limit of {}",
                    item.quantity, item.game_id, self.max_line_quantity
                )));
            }

            let game = self
                .catalog
                .game(item.game_id)
                .await?
                .filter(|g| g.active)
                .ok_or(FulfillmentError::GameNotFound { game_id: item.game_id })?;

            if game.currency != self.currency {
                return Err(FulfillmentError::InvalidCart(format!(
                    "game {} is priced in {}, expected {}",
                    game.id, game.currency, self.currency
                )));
            }

            let unit_price = game.unit_price();
            if let Some(expected) = item.expected_price {
                if round_money(expected) != unit_price {
                    return Err(FulfillmentError::PriceMismatch {
                        game_id: game.id,
                        expected,
                        current: unit_price,
                    });
                }
            }

            self.check_stock(&game, item.quantity).await?;

            lines.push(QuotedLine {
                game,
                quantity: item.quantity,
                unit_price,
            });
        }

        let subtotal: Decimal = lines.iter().map(QuotedLine::line_total).sum();

        let promo = match request.promo_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let promo = self
                    .catalog
                    .promo(code)
                    .await?
                    .filter(|p| p.is_usable(Utc::now()))
                    .ok_or_else(|| FulfillmentError::InvalidPromoCode {
                        code: code.to_string(),
                    })?;
                Some(promo)
            }
            _ => None,
        };

        let discount = promo
            .as_ref()
            .map(|p| round_money(subtotal * p.discount_percent / Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO);
        let total = subtotal - discount;

        if total <= Decimal::ZERO {
            return Err(FulfillmentError::InvalidCart(
                "order total must be positive".to_string(),
            ));
        }

        Ok(Quote {
            lines,
            subtotal,
            discount,
            total,
            promo,
        })
    }

    async fn check_stock(&self, game: &CatalogGame, quantity: u32) -> Result<(), FulfillmentError> {
        let wanted = i64::from(quantity);
        let in_stock = match game.key_source {
            KeySource::Local => self.keys.available(game.id).await? >= wanted,
            KeySource::Supplier => game.supplier_product_id.is_some() && game.supplier_stock >= wanted,
        };
        if in_stock {
            Ok(())
        } else {
            Err(FulfillmentError::OutOfStock { game_id: game.id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(game_id: Uuid, quantity: u32, price: Option<i64>) -> CartItem {
        CartItem {
            game_id,
            quantity,
            expected_price: price.map(|p| Decimal::new(p, 2)),
        }
    }

    #[test]
    fn merges_duplicate_lines() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_lines(&[item(a, 1, None), item(b, 2, None), item(a, 2, Some(1999))]).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].game_id, a);
        assert_eq!(merged[0].quantity, 3);
        assert_eq!(merged[0].expected_price, Some(Decimal::new(1999, 2)));
    }

    #[test]
    fn rejects_zero_quantity_and_conflicting_prices() {
        let a = Uuid::new_v4();
        assert!(matches!(
            merge_lines(&[item(a, 0, None)]),
            Err(FulfillmentError::InvalidCart(_))
        ));
        assert!(matches!(
            merge_lines(&[item(a, 1, Some(100)), item(a, 1, Some(200))]),
            Err(FulfillmentError::InvalidCart(_))
        ));
    }
}
