//! Order record model
//!
//! Defines the shape of an order and the pure functions that validate a
//! client draft and turn it into something the repository can store. Nothing
//! in this module performs I/O.
//!
//! Enumeration values travel over the wire in Spanish (`mediana`,
//! `pendiente`, ...), the vocabulary the storefront and the admin panel
//! already speak.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::ValidateLength;

use crate::core::error::FieldValidationError;

/// Length bounds for the `pizza` field (after trimming)
pub const PIZZA_MIN_LEN: u64 = 3;
pub const PIZZA_MAX_LEN: u64 = 100;

/// Length bounds for the `contactInfo` field (after trimming)
pub const CONTACT_INFO_MIN_LEN: u64 = 1;
pub const CONTACT_INFO_MAX_LEN: u64 = 50;

/// Hex length of a datastore-assigned order identifier
pub const ORDER_ID_LEN: usize = 24;

// =============================================================================
// Enumerations
// =============================================================================

/// Raised when a string is not a member of one of the closed enumerations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Pizza size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PizzaSize {
    #[serde(rename = "pequeña")]
    Small,
    #[serde(rename = "mediana")]
    Medium,
    #[serde(rename = "grande")]
    Large,
}

impl PizzaSize {
    pub const ALL: [PizzaSize; 3] = [PizzaSize::Small, PizzaSize::Medium, PizzaSize::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            PizzaSize::Small => "pequeña",
            PizzaSize::Medium => "mediana",
            PizzaSize::Large => "grande",
        }
    }

    /// Wire values of every size, in declaration order
    pub fn values() -> Vec<&'static str> {
        Self::ALL.iter().map(PizzaSize::as_str).collect()
    }
}

impl fmt::Display for PizzaSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PizzaSize {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "size",
                value: s.to_string(),
            })
    }
}

/// Order status
///
/// Transitions are unconstrained: any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "en_preparacion")]
    InPreparation,
    #[serde(rename = "listo")]
    Ready,
    #[serde(rename = "entregado")]
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::InPreparation,
        OrderStatus::Ready,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pendiente",
            OrderStatus::InPreparation => "en_preparacion",
            OrderStatus::Ready => "listo",
            OrderStatus::Delivered => "entregado",
        }
    }

    pub fn values() -> Vec<&'static str> {
        Self::ALL.iter().map(OrderStatus::as_str).collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "status",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Identifier
// =============================================================================

/// The identifier was not a 24-character hex string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid order id '{0}'")]
pub struct InvalidOrderId(pub String);

/// Datastore-assigned order identifier
///
/// Serialized as its 24-character hex form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(ObjectId);

impl OrderId {
    /// Mint a fresh identifier (used by stores that assign ids themselves)
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl From<ObjectId> for OrderId {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl FromStr for OrderId {
    type Err = InvalidOrderId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ORDER_ID_LEN {
            return Err(InvalidOrderId(s.to_string()));
        }
        ObjectId::parse_str(s)
            .map(Self)
            .map_err(|_| InvalidOrderId(s.to_string()))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl Serialize for OrderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_hex())
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// UTC timestamp truncated to millisecond precision
///
/// Stored as `YYYY-MM-DDTHH:MM:SS.mmmZ`, which sorts lexicographically in
/// chronological order.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

pub(crate) mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Records
// =============================================================================

/// Client-submitted order, exactly as received
///
/// Fields are kept raw so that every rule violation can be reported; missing
/// fields deserialize to empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderDraft {
    pub pizza: String,
    pub size: String,
    pub contact_info: String,
}

impl OrderDraft {
    pub fn new(
        pizza: impl Into<String>,
        size: impl Into<String>,
        contact_info: impl Into<String>,
    ) -> Self {
        Self {
            pizza: pizza.into(),
            size: size.into(),
            contact_info: contact_info.into(),
        }
    }
}

/// Order ready to be inserted; the datastore assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDocument {
    pub pizza: String,
    pub size: PizzaSize,
    pub contact_info: String,
    pub status: OrderStatus,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub updated_at: DateTime<Utc>,
}

impl OrderDocument {
    /// Attach the identifier the datastore assigned on insert
    pub fn with_id(self, id: OrderId) -> Order {
        Order {
            id,
            pizza: self.pizza,
            size: self.size,
            contact_info: self.contact_info,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A stored order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub pizza: String,
    pub size: PizzaSize,
    pub contact_info: String,
    pub status: OrderStatus,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Apply a status update in place
    pub fn apply(&mut self, update: &OrderUpdate) {
        self.status = update.status;
        self.updated_at = update.updated_at;
    }
}

/// Partial replacement applied by the status-update operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub status: OrderStatus,
    #[serde(with = "iso8601")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Pure operations
// =============================================================================

/// Outcome of [`validate_order`]: one violation per failed rule, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderValidation {
    pub is_valid: bool,
    pub errors: Vec<FieldValidationError>,
}

impl OrderValidation {
    /// The violation messages alone
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }
}

fn length_within(value: &str, min: u64, max: u64) -> bool {
    value.validate_length(Some(min), Some(max), None)
}

/// Check a draft against the field constraints
///
/// Every failed rule is reported; validation does not stop at the first one.
pub fn validate_order(draft: &OrderDraft) -> OrderValidation {
    let mut errors = Vec::new();

    let pizza = draft.pizza.trim();
    if pizza.is_empty() {
        errors.push(FieldValidationError::new("pizza", "pizza is required"));
    } else if !length_within(pizza, PIZZA_MIN_LEN, PIZZA_MAX_LEN) {
        errors.push(FieldValidationError::new(
            "pizza",
            format!(
                "pizza must be between {} and {} characters",
                PIZZA_MIN_LEN, PIZZA_MAX_LEN
            ),
        ));
    }

    if draft.size.parse::<PizzaSize>().is_err() {
        errors.push(FieldValidationError::new(
            "size",
            format!("size must be one of: {}", PizzaSize::values().join(", ")),
        ));
    }

    let contact_info = draft.contact_info.trim();
    if contact_info.is_empty() {
        errors.push(FieldValidationError::new(
            "contactInfo",
            "contactInfo is required",
        ));
    } else if !length_within(contact_info, CONTACT_INFO_MIN_LEN, CONTACT_INFO_MAX_LEN) {
        errors.push(FieldValidationError::new(
            "contactInfo",
            format!(
                "contactInfo must be between {} and {} characters",
                CONTACT_INFO_MIN_LEN, CONTACT_INFO_MAX_LEN
            ),
        ));
    }

    OrderValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Whether `status` is a member of the status enumeration
pub fn validate_order_status(status: &str) -> bool {
    status.parse::<OrderStatus>().is_ok()
}

/// Build the document to insert for a draft
///
/// Strings are trimmed, the status is always `pendiente` and both timestamps
/// carry the same instant. Invalid drafts are rejected with the full
/// validation report.
pub fn create_order_document(draft: &OrderDraft) -> Result<OrderDocument, OrderValidation> {
    let validation = validate_order(draft);
    let size = match draft.size.parse::<PizzaSize>() {
        Ok(size) if validation.is_valid => size,
        _ => return Err(validation),
    };

    let now = now();
    Ok(OrderDocument {
        pizza: draft.pizza.trim().to_string(),
        size,
        contact_info: draft.contact_info.trim().to_string(),
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
    })
}

/// Build the partial update for a status change
pub fn create_order_update(status: OrderStatus) -> OrderUpdate {
    OrderUpdate {
        status,
        updated_at: now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(pizza: &str, size: &str, contact: &str) -> OrderDraft {
        OrderDraft::new(pizza, size, contact)
    }

    #[test]
    fn test_valid_draft_passes() {
        let result = validate_order(&draft("Margherita", "mediana", "5551234"));
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_pizza_outside_bounds_is_rejected() {
        let long = "x".repeat(101);
        for pizza in ["", "  ", "Hi", "  ab  ", long.as_str()] {
            let result = validate_order(&draft(pizza, "grande", "5551234"));
            assert!(!result.is_valid, "pizza {:?} should be rejected", pizza);
            assert!(result.errors.iter().any(|e| e.field == "pizza"));
        }
    }

    #[test]
    fn test_pizza_bounds_are_inclusive() {
        assert!(validate_order(&draft("abc", "grande", "x")).is_valid);
        assert!(validate_order(&draft(&"x".repeat(100), "grande", "x")).is_valid);
    }

    #[test]
    fn test_pizza_length_counts_characters() {
        // 3 characters, 6 bytes
        assert!(validate_order(&draft("ñññ", "grande", "x")).is_valid);
    }

    #[test]
    fn test_unknown_size_is_rejected() {
        for size in ["", "medium", "MEDIANA", "familiar"] {
            let result = validate_order(&draft("Margherita", size, "5551234"));
            assert!(!result.is_valid);
            assert!(result.errors.iter().any(|e| e.field == "size"));
        }
    }

    #[test]
    fn test_contact_info_bounds() {
        assert!(!validate_order(&draft("Margherita", "mediana", "   ")).is_valid);
        assert!(!validate_order(&draft("Margherita", "mediana", &"9".repeat(51))).is_valid);
        assert!(validate_order(&draft("Margherita", "mediana", &"9".repeat(50))).is_valid);
    }

    #[test]
    fn test_all_failures_reported_in_field_order() {
        let result = validate_order(&OrderDraft::default());
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
        let fields: Vec<_> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["pizza", "size", "contactInfo"]);
        assert_eq!(result.messages()[0], "pizza is required");
    }

    #[test]
    fn test_validate_order_status() {
        for status in OrderStatus::values() {
            assert!(validate_order_status(status));
        }
        assert!(!validate_order_status("pending"));
        assert!(!validate_order_status(""));
    }

    #[test]
    fn test_create_order_document_trims_and_stamps() {
        let doc = create_order_document(&draft("  Hawaiana ", "pequeña", " 555 "))
            .expect("draft should be valid");
        assert_eq!(doc.pizza, "Hawaiana");
        assert_eq!(doc.contact_info, "555");
        assert_eq!(doc.size, PizzaSize::Small);
        assert_eq!(doc.status, OrderStatus::Pending);
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[test]
    fn test_create_order_document_rejects_invalid_draft() {
        let err = create_order_document(&draft("Hi", "mediana", "5551234")).unwrap_err();
        assert!(!err.is_valid);
        assert_eq!(err.errors.len(), 1);
    }

    #[test]
    fn test_create_order_update_only_touches_status_and_updated_at() {
        let doc = create_order_document(&draft("Margherita", "mediana", "5551234")).unwrap();
        let mut order = doc.with_id(OrderId::generate());
        let created_at = order.created_at;

        let update = create_order_update(OrderStatus::Ready);
        order.apply(&update);

        assert_eq!(order.status, OrderStatus::Ready);
        assert_eq!(order.created_at, created_at);
        assert!(order.created_at <= order.updated_at);
    }

    #[test]
    fn test_order_id_parsing() {
        let id = OrderId::generate();
        assert_eq!(id.to_hex().parse::<OrderId>().unwrap(), id);
        assert!("abc".parse::<OrderId>().is_err());
        assert!("zzzzzzzzzzzzzzzzzzzzzzzz".parse::<OrderId>().is_err());
    }

    #[test]
    fn test_order_serializes_wire_format() {
        let doc = create_order_document(&draft("Margherita", "mediana", "5551234")).unwrap();
        let id = OrderId::generate();
        let json = serde_json::to_value(doc.with_id(id)).unwrap();

        assert_eq!(json["id"], id.to_hex());
        assert_eq!(json["size"], "mediana");
        assert_eq!(json["status"], "pendiente");
        assert_eq!(json["contactInfo"], "5551234");
        let created = json["createdAt"].as_str().unwrap();
        assert!(created.ends_with('Z'));
        assert_eq!(created.len(), "2024-01-01T00:00:00.000Z".len());
    }

    #[test]
    fn test_enum_round_trip_through_strings() {
        assert_eq!("pequeña".parse::<PizzaSize>().unwrap(), PizzaSize::Small);
        assert_eq!(
            "en_preparacion".parse::<OrderStatus>().unwrap(),
            OrderStatus::InPreparation
        );
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }
}
