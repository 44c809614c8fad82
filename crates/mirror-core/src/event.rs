//! Mirror events: the unit of work passed from producer to executor.

use crate::attributes::Attributes;
use crate::values::MirrorValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of write that was committed on the primary.
///
/// Anything other than `create`, `update` or `destroy` is kept as
/// [`Operation::Unknown`] so the executor can log it and move on instead of
/// failing the job at deserialization time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Create,
    Update,
    Destroy,
    Unknown(String),
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Destroy => "destroy",
            Operation::Unknown(other) => other,
        }
    }
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "create" => Operation::Create,
            "update" => Operation::Update,
            "destroy" => Operation::Destroy,
            _ => Operation::Unknown(value),
        }
    }
}

impl From<&str> for Operation {
    fn from(value: &str) -> Self {
        Operation::from(value.to_string())
    }
}

impl From<Operation> for String {
    fn from(value: Operation) -> Self {
        match value {
            Operation::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized description of one committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorEvent {
    /// Logical record type, e.g. `Account`.
    pub entity_name: String,

    /// Primary key of the written record.
    #[serde(default)]
    pub record_id: Option<MirrorValue>,

    pub operation: Operation,

    #[serde(default)]
    pub attributes: Attributes,
}

impl MirrorEvent {
    pub fn new(
        entity_name: impl Into<String>,
        record_id: impl Into<MirrorValue>,
        operation: impl Into<Operation>,
        attributes: Attributes,
    ) -> Self {
        let record_id = match record_id.into() {
            MirrorValue::Null => None,
            id => Some(id),
        };
        Self {
            entity_name: entity_name.into(),
            record_id,
            operation: operation.into(),
            attributes,
        }
    }

    /// Parse a JSON job payload.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// `Entity#id` label used in log lines.
    pub fn label(&self) -> String {
        match &self.record_id {
            Some(id) => format!("{}#{}", self.entity_name, id),
            None => format!("{}#<none>", self.entity_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_parsing() {
        assert_eq!(Operation::from("create"), Operation::Create);
        assert_eq!(Operation::from("update"), Operation::Update);
        assert_eq!(Operation::from("destroy"), Operation::Destroy);
        assert_eq!(
            Operation::from("truncate"),
            Operation::Unknown("truncate".to_string())
        );
    }

    #[test]
    fn test_unknown_operation_survives_deserialization() {
        let event: MirrorEvent = serde_json::from_value(json!({
            "entity_name": "Account",
            "record_id": {"kind": "text", "value": "id-1"},
            "operation": "archive",
            "attributes": {}
        }))
        .unwrap();
        assert_eq!(event.operation, Operation::Unknown("archive".to_string()));
        assert_eq!(
            serde_json::to_value(&event).unwrap()["operation"],
            json!("archive")
        );
    }

    #[test]
    fn test_payload_roundtrip() {
        let event = MirrorEvent::new(
            "Account",
            "id-1",
            Operation::Create,
            Attributes::new().with("id", "id-1").with("name", "Test"),
        );
        let payload = event.to_json().unwrap();
        assert_eq!(MirrorEvent::from_json(&payload).unwrap(), event);
    }

    #[test]
    fn test_missing_fields_default() {
        let event = MirrorEvent::from_json(r#"{"entity_name":"Account","operation":"destroy"}"#)
            .unwrap();
        assert!(event.record_id.is_none());
        assert!(event.attributes.is_empty());
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(MirrorEvent::from_json(r#"{"operation":"create"}"#).is_err());
        assert!(MirrorEvent::from_json("not json").is_err());
    }

    #[test]
    fn test_null_record_id_is_none() {
        let event = MirrorEvent::new("Account", MirrorValue::Null, "update", Attributes::new());
        assert!(event.record_id.is_none());
        assert_eq!(event.label(), "Account#<none>");
    }
}
