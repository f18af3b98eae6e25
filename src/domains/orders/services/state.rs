// Orders domain state
// 주문 도메인 상태
use crate::domains::orders::services::{FulfillmentService, RefundService};

/// Orders domain state
/// 주문 도메인에서 필요한 서비스들을 포함하는 상태
#[derive(Clone)]
pub struct OrdersState {
    pub fulfillment_service: FulfillmentService,
    pub refund_service: RefundService,
}

impl OrdersState {
    pub fn new(fulfillment_service: FulfillmentService, refund_service: RefundService) -> Self {
        Self {
            fulfillment_service,
            refund_service,
        }
    }
}
