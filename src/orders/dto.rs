use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    pub address: String,
}

/// Status arrives as a string and is parsed against the enum so an unknown
/// value reports as a 400, not a body-decode rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusRequest {
    pub order_id: Uuid,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_order_request_parses() {
        let req: CreateOrderRequest = serde_json::from_str(
            r#"{"items":[{"productId":"7f1a9f6e-8e5c-4a87-9ed3-0d9d2a6c3f11","quantity":2}],"address":"1 Main St"}"#,
        )
        .unwrap();
        assert_eq!(req.items.len(), 1);
        assert_eq!(req.items[0].quantity, 2);
        assert_eq!(req.address, "1 Main St");
    }

    #[test]
    fn set_status_request_is_camel_case() {
        let req: SetStatusRequest = serde_json::from_str(
            r#"{"orderId":"7f1a9f6e-8e5c-4a87-9ed3-0d9d2a6c3f11","status":"PAID"}"#,
        )
        .unwrap();
        assert_eq!(req.status, "PAID");
    }
}
