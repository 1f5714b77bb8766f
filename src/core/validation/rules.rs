//! Declarative per-field rule sets
//!
//! A [`RuleSet`] lists, per field, the filters to apply and the validators to
//! run. Every field is evaluated; within a field, validation stops at the
//! first failing validator so each field reports at most one message.

use super::extractor::ValidatedPayload;
use super::{filters, validators};
use crate::core::error::FieldValidationError;
use crate::core::order::{
    CONTACT_INFO_MAX_LEN, CONTACT_INFO_MIN_LEN, ORDER_ID_LEN, OrderDraft, OrderStatus,
    PIZZA_MAX_LEN, PIZZA_MIN_LEN, PizzaSize,
};
use serde_json::{Map, Value};
use std::sync::Arc;

type FilterFn = Arc<dyn Fn(&str, Value) -> Value + Send + Sync>;
type ValidatorFn = Arc<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;

/// Filters and validators for one field
#[derive(Clone)]
pub struct FieldRules {
    field: &'static str,
    filters: Vec<FilterFn>,
    validators: Vec<ValidatorFn>,
}

impl FieldRules {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            filters: Vec::new(),
            validators: Vec::new(),
        }
    }

    pub fn filter(mut self, f: impl Fn(&str, Value) -> Value + Send + Sync + 'static) -> Self {
        self.filters.push(Arc::new(f));
        self
    }

    pub fn validate(
        mut self,
        v: impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validators.push(Arc::new(v));
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }
}

/// Ordered collection of field rules
#[derive(Clone, Default)]
pub struct RuleSet {
    fields: Vec<FieldRules>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, rules: FieldRules) -> Self {
        self.fields.push(rules);
        self
    }

    /// Filter and validate a JSON object
    ///
    /// Returns the object with filtered values, or every violation found.
    /// Non-object payloads are validated as if empty.
    pub fn validate_and_filter(&self, payload: Value) -> Result<Value, Vec<FieldValidationError>> {
        let mut object = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut errors = Vec::new();

        for rules in &self.fields {
            let raw = object.remove(rules.field).unwrap_or(Value::Null);
            let value = rules
                .filters
                .iter()
                .fold(raw, |value, filter| filter(rules.field, value));

            if let Some(message) = rules
                .validators
                .iter()
                .find_map(|validator| validator(rules.field, &value).err())
            {
                errors.push(FieldValidationError::new(rules.field, message));
            }

            object.insert(rules.field.to_string(), value);
        }

        if errors.is_empty() {
            Ok(Value::Object(object))
        } else {
            Err(errors)
        }
    }
}

// =============================================================================
// Route rule sets
// =============================================================================

/// Body of `POST /api/orders`
pub fn create_order_rules() -> RuleSet {
    RuleSet::new()
        .field(
            FieldRules::new("pizza")
                .filter(filters::trim())
                .validate(validators::required())
                .validate(validators::string_length(PIZZA_MIN_LEN, PIZZA_MAX_LEN)),
        )
        .field(
            FieldRules::new("size")
                .filter(filters::trim())
                .validate(validators::required())
                .validate(validators::in_list(PizzaSize::values())),
        )
        .field(
            FieldRules::new("contactInfo")
                .filter(filters::trim())
                .validate(validators::required())
                .validate(validators::string_length(
                    CONTACT_INFO_MIN_LEN,
                    CONTACT_INFO_MAX_LEN,
                )),
        )
}

impl ValidatedPayload for OrderDraft {
    fn rules() -> RuleSet {
        create_order_rules()
    }
}

/// `{id}` path parameter of the by-id routes
pub fn order_id_rules() -> RuleSet {
    RuleSet::new().field(
        FieldRules::new("id")
            .filter(filters::trim())
            .validate(validators::required())
            .validate(validators::exact_length(
                ORDER_ID_LEN as u64,
                "invalid order id",
            )),
    )
}

/// Body of `PATCH /api/orders/{id}/status`
pub fn update_status_rules() -> RuleSet {
    RuleSet::new().field(
        FieldRules::new("status")
            .filter(filters::trim())
            .validate(validators::required())
            .validate(validators::in_list(OrderStatus::values())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_rules_accept_and_trim() {
        let filtered = create_order_rules()
            .validate_and_filter(json!({
                "pizza": "  Margherita ",
                "size": "mediana",
                "contactInfo": " 5551234 "
            }))
            .expect("payload should be valid");

        assert_eq!(filtered["pizza"], "Margherita");
        assert_eq!(filtered["contactInfo"], "5551234");
    }

    #[test]
    fn test_create_rules_report_every_field() {
        let errors = create_order_rules()
            .validate_and_filter(json!({ "pizza": "Hi", "size": "huge" }))
            .unwrap_err();

        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["pizza", "size", "contactInfo"]);
        assert!(errors[0].message.contains("between 3 and 100"));
        assert_eq!(errors[2].message, "contactInfo is required");
    }

    #[test]
    fn test_one_message_per_field() {
        let errors = create_order_rules()
            .validate_and_filter(json!({ "pizza": "   ", "size": "grande", "contactInfo": "x" }))
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "pizza is required");
    }

    #[test]
    fn test_non_object_payload_reports_missing_fields() {
        let errors = create_order_rules()
            .validate_and_filter(json!(["not", "an", "object"]))
            .unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_order_id_rules() {
        assert!(
            order_id_rules()
                .validate_and_filter(json!({ "id": "65f1c0ffee0000000000abcd" }))
                .is_ok()
        );
        let errors = order_id_rules()
            .validate_and_filter(json!({ "id": "12345678901" }))
            .unwrap_err();
        assert_eq!(errors[0].field, "id");
        assert_eq!(errors[0].message, "invalid order id");
    }

    #[test]
    fn test_update_status_rules() {
        assert!(
            update_status_rules()
                .validate_and_filter(json!({ "status": "listo" }))
                .is_ok()
        );
        let errors = update_status_rules()
            .validate_and_filter(json!({ "status": "ready" }))
            .unwrap_err();
        assert!(errors[0].message.contains("pendiente"));
    }
}
