//! Coerces decoded values into what the destination column expects.
//!
//! The coercion is driven by the *destination* field name, not by a schema:
//! date-looking names get parsed dates, money-looking names get decimal
//! strings, everything else passes through with light normalization. It is
//! a pragmatic default for weakly-typed legacy data; the single entry point
//! means a schema-driven transform can replace it later without touching
//! the importer.

use crate::bson::{BsonValue, Document};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid regex"));

fn is_date_field(name: &str) -> bool {
    name.contains("date") || name.contains("Date") || name.ends_with("_at")
}

fn is_money_field(name: &str) -> bool {
    name.contains("price")
        || name.contains("Price")
        || name.contains("amount")
        || name.contains("Amount")
        || name.contains("valor")
        || name.contains("Valor")
        || name.contains("cost")
        || name.contains("Cost")
}

/// Renders a numeric value the way the monetary columns store it: a plain
/// decimal string, without a trailing `.0` for whole numbers.
fn money_string(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Coerces one decoded value for the destination field `target_field`.
///
/// Rules, in order: elided/null values are null; date-ish fields keep only
/// ISO-looking date strings; money-ish fields become decimal strings with a
/// `"0"` fallback; booleans and numbers pass through; strings are trimmed;
/// documents and arrays are serialized to a JSON string.
pub fn transform_value(value: &BsonValue, target_field: &str) -> serde_json::Value {
    if value.is_elided() || matches!(value, BsonValue::Null) {
        return serde_json::Value::Null;
    }

    // the decoder renders unrepresentable datetimes as "timestamp:<n>"
    if let BsonValue::DateTime(s) = value {
        if s.starts_with("timestamp:") {
            return serde_json::Value::Null;
        }
    }

    if is_date_field(target_field) {
        let text = match value {
            BsonValue::DateTime(s) => Some(s.as_str()),
            BsonValue::String(s) => Some(s.as_str()),
            _ => None,
        };
        return match text {
            Some(s) if ISO_DATE_RE.is_match(s) => serde_json::Value::String(s.to_string()),
            _ => serde_json::Value::Null,
        };
    }

    if is_money_field(target_field) {
        return match value {
            BsonValue::Double(_) | BsonValue::Int32(_) | BsonValue::Int64(_) => {
                serde_json::Value::String(money_string(value.as_f64().unwrap_or(0.0)))
            }
            BsonValue::String(s) => serde_json::Value::String(s.clone()),
            _ => serde_json::Value::String("0".to_string()),
        };
    }

    match value {
        BsonValue::Bool(b) => serde_json::Value::Bool(*b),
        BsonValue::Double(_) | BsonValue::Int32(_) | BsonValue::Int64(_) => value.to_json(),
        BsonValue::String(s) => serde_json::Value::String(s.trim().to_string()),
        BsonValue::DateTime(s) => serde_json::Value::String(s.clone()),
        BsonValue::ObjectId(hex) => serde_json::Value::String(hex.clone()),
        BsonValue::Document(_) | BsonValue::Array(_) => {
            serde_json::Value::String(value.to_json().to_string())
        }
        // Null and the elided variants were handled above
        other => serde_json::Value::String(other.to_json().to_string()),
    }
}

/// Applies the mapping's field renames and coerces every value. Source
/// fields absent from the document are skipped, not nulled.
pub fn map_document(
    doc: &Document,
    field_mappings: &HashMap<String, String>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut mapped = serde_json::Map::new();
    for (source_field, target_field) in field_mappings {
        if let Some(value) = doc.get(source_field) {
            mapped.insert(target_field.clone(), transform_value(value, target_field));
        }
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_fields_require_iso_looking_strings() {
        assert_eq!(
            transform_value(&BsonValue::String("not-a-date".into()), "createdDate"),
            serde_json::Value::Null
        );
        assert_eq!(
            transform_value(&BsonValue::String("2021-03-15".into()), "due_date"),
            serde_json::Value::String("2021-03-15".into())
        );
        assert_eq!(
            transform_value(
                &BsonValue::DateTime("2020-01-01T00:00:00.000Z".into()),
                "created_at"
            ),
            serde_json::Value::String("2020-01-01T00:00:00.000Z".into())
        );
        assert_eq!(
            transform_value(&BsonValue::Int32(5), "updatedDate"),
            serde_json::Value::Null
        );
    }

    #[test]
    fn money_fields_become_decimal_strings() {
        assert_eq!(
            transform_value(&BsonValue::Double(12.5), "totalAmount"),
            serde_json::Value::String("12.5".into())
        );
        assert_eq!(
            transform_value(&BsonValue::Int32(150), "valor_pago"),
            serde_json::Value::String("150".into())
        );
        assert_eq!(
            transform_value(&BsonValue::String("99.90".into()), "sell_price"),
            serde_json::Value::String("99.90".into())
        );
        // non-numeric, non-string input defaults to "0"
        assert_eq!(
            transform_value(&BsonValue::Bool(true), "cost_price"),
            serde_json::Value::String("0".into())
        );
    }

    #[test]
    fn elided_and_null_values_map_to_null() {
        assert_eq!(transform_value(&BsonValue::Null, "name"), serde_json::Value::Null);
        assert_eq!(transform_value(&BsonValue::Binary, "name"), serde_json::Value::Null);
        assert_eq!(
            transform_value(&BsonValue::Timestamp, "totalAmount"),
            serde_json::Value::Null
        );
        assert_eq!(
            transform_value(&BsonValue::Decimal128, "name"),
            serde_json::Value::Null
        );
        assert_eq!(
            transform_value(&BsonValue::Unknown(0x7f), "name"),
            serde_json::Value::Null
        );
        assert_eq!(
            transform_value(&BsonValue::DateTime("timestamp:99999999999999999".into()), "name"),
            serde_json::Value::Null
        );
    }

    #[test]
    fn plain_values_pass_through_normalized() {
        assert_eq!(
            transform_value(&BsonValue::String("  Loja Centro  ".into()), "name"),
            serde_json::Value::String("Loja Centro".into())
        );
        assert_eq!(
            transform_value(&BsonValue::Bool(false), "is_active"),
            serde_json::Value::Bool(false)
        );
        assert_eq!(
            transform_value(&BsonValue::Int64(7), "quantity"),
            serde_json::json!(7)
        );

        let mut doc = Document::default();
        doc.push("Rua".into(), BsonValue::String("Augusta".into()));
        let out = transform_value(&BsonValue::Document(doc), "extra");
        assert_eq!(out, serde_json::Value::String(r#"{"Rua":"Augusta"}"#.into()));
    }

    #[test]
    fn map_document_renames_and_skips_missing_fields() {
        let mut doc = Document::default();
        doc.push("NomeFantasia".into(), BsonValue::String("Oficina X".into()));
        doc.push("ValorTotal".into(), BsonValue::Double(10.0));

        let mut fm = HashMap::new();
        fm.insert("NomeFantasia".to_string(), "name".to_string());
        fm.insert("ValorTotal".to_string(), "total_amount".to_string());
        fm.insert("Inexistente".to_string(), "ghost".to_string());

        let mapped = map_document(&doc, &fm);
        assert_eq!(mapped.get("name"), Some(&serde_json::Value::String("Oficina X".into())));
        assert_eq!(
            mapped.get("total_amount"),
            Some(&serde_json::Value::String("10".into()))
        );
        assert!(!mapped.contains_key("ghost"));
    }
}
