// Billing repositories (ledger, orders, reservations, catalog)
pub mod catalog_repository;
pub mod ledger_repository;
pub mod order_repository;
pub mod reservation_repository;

pub use catalog_repository::*;
pub use ledger_repository::*;
pub use order_repository::*;
pub use reservation_repository::*;

use std::str::FromStr;

use crate::shared::errors::StoreError;

/// DB 의 소문자 상태/종류 문자열을 enum 으로 변환
fn parse_column<T>(value: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(StoreError::Database)
}
