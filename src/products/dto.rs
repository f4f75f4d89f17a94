use rust_decimal::Decimal;
use serde::Deserialize;

/// `id` stays a string here; an unparseable id reads as a missing product,
/// not a malformed request.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_accepts_json_numbers() {
        let req: CreateProductRequest =
            serde_json::from_str(r#"{"name":"Mug","price":9.99}"#).unwrap();
        assert_eq!(req.price, Decimal::new(999, 2));
        assert!(req.description.is_none());
        assert!(req.image.is_none());
    }

    #[test]
    fn optional_fields_deserialize() {
        let req: CreateProductRequest = serde_json::from_str(
            r#"{"name":"Mug","price":"12.50","description":"blue","image":"https://cdn.example.com/mug.png"}"#,
        )
        .unwrap();
        assert_eq!(req.price, Decimal::new(1250, 2));
        assert_eq!(req.description.as_deref(), Some("blue"));
    }
}
