use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::CartLine;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// `id` is the product id, matching what the storefront renders.
#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            id: line.product_id,
            name: line.name,
            price: line.price,
            quantity: line.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case() {
        let req: AddToCartRequest = serde_json::from_str(
            r#"{"productId":"7f1a9f6e-8e5c-4a87-9ed3-0d9d2a6c3f11","quantity":2}"#,
        )
        .unwrap();
        assert_eq!(req.quantity, 2);
    }

    #[test]
    fn missing_quantity_is_rejected() {
        assert!(serde_json::from_str::<AddToCartRequest>(
            r#"{"productId":"7f1a9f6e-8e5c-4a87-9ed3-0d9d2a6c3f11"}"#
        )
        .is_err());
    }

    #[test]
    fn line_response_exposes_product_id_as_id() {
        let line = CartLine {
            product_id: Uuid::new_v4(),
            name: "Mug".into(),
            price: Decimal::new(999, 2),
            quantity: 3,
        };
        let resp = CartLineResponse::from(line.clone());
        assert_eq!(resp.id, line.product_id);
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("id").is_some());
        assert!(json.get("product_id").is_none());
    }
}
