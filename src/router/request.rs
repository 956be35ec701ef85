//! Routing requests built from incident context

use super::RoutingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The matchable context of an incident
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingContext {
    pub incident_priorities: BTreeSet<String>,
    pub incident_types: BTreeSet<String>,
    pub terms: Vec<String>,
}

/// A query describing an incident for the route matcher
///
/// `text` may be empty; the context collections are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRoutingRequest")]
pub struct RoutingRequest {
    pub text: String,
    pub context: RoutingContext,
}

impl RoutingRequest {
    pub fn builder() -> RoutingRequestBuilder {
        RoutingRequestBuilder::default()
    }

    /// Request for a single incident type and priority, as used by the
    /// resolver plugins
    pub fn for_incident(
        incident_type: &str,
        incident_priority: &str,
        description: &str,
    ) -> Result<Self, RoutingError> {
        Self::builder()
            .text(description)
            .incident_type(incident_type)
            .incident_priority(incident_priority)
            .build()
    }

    /// Parse and validate a JSON request body
    pub fn from_json(json: &str) -> Result<Self, RoutingError> {
        serde_json::from_str(json).map_err(|e| RoutingError::InvalidRequest(e.to_string()))
    }

    /// Nothing to match on: no text, no types, no priorities, no terms
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
            && self.context.incident_priorities.is_empty()
            && self.context.incident_types.is_empty()
            && self.context.terms.is_empty()
    }
}

/// Raw request as received over the wire, before validation
///
/// Every field is required; a missing collection is rejected rather than
/// defaulted.
#[derive(Debug, Deserialize)]
pub struct RawRoutingRequest {
    pub text: String,
    pub context: RawRoutingContext,
}

#[derive(Debug, Deserialize)]
pub struct RawRoutingContext {
    #[serde(alias = "incidentPriorities")]
    pub incident_priorities: Vec<String>,
    #[serde(alias = "incidentTypes")]
    pub incident_types: Vec<String>,
    pub terms: Vec<String>,
}

impl TryFrom<RawRoutingRequest> for RoutingRequest {
    type Error = RoutingError;

    fn try_from(raw: RawRoutingRequest) -> Result<Self, Self::Error> {
        let incident_priorities =
            validate_entries("incident_priorities", raw.context.incident_priorities)?
                .into_iter()
                .collect();
        let incident_types = validate_entries("incident_types", raw.context.incident_types)?
            .into_iter()
            .collect();
        let terms = validate_entries("terms", raw.context.terms)?;

        Ok(Self {
            text: raw.text,
            context: RoutingContext {
                incident_priorities,
                incident_types,
                terms,
            },
        })
    }
}

fn validate_entries(field: &str, entries: Vec<String>) -> Result<Vec<String>, RoutingError> {
    entries
        .into_iter()
        .map(|entry| {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                Err(RoutingError::InvalidRequest(format!(
                    "{} contains a blank entry",
                    field
                )))
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

/// Typed builder for [`RoutingRequest`]
#[derive(Debug, Default)]
pub struct RoutingRequestBuilder {
    text: String,
    incident_priorities: Vec<String>,
    incident_types: Vec<String>,
    terms: Vec<String>,
}

impl RoutingRequestBuilder {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn incident_type(mut self, incident_type: impl Into<String>) -> Self {
        self.incident_types.push(incident_type.into());
        self
    }

    pub fn incident_priority(mut self, priority: impl Into<String>) -> Self {
        self.incident_priorities.push(priority.into());
        self
    }

    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.terms.push(term.into());
        self
    }

    pub fn terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms.extend(terms.into_iter().map(Into::into));
        self
    }

    /// Validate and build the request
    pub fn build(self) -> Result<RoutingRequest, RoutingError> {
        RawRoutingRequest {
            text: self.text,
            context: RawRoutingContext {
                incident_priorities: self.incident_priorities,
                incident_types: self.incident_types,
                terms: self.terms,
            },
        }
        .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let request = RoutingRequest::builder()
            .text("database outage")
            .incident_type("infra")
            .incident_priority("P1")
            .term("postgres")
            .build()
            .unwrap();

        assert_eq!(request.text, "database outage");
        assert!(request.context.incident_types.contains("infra"));
        assert!(request.context.incident_priorities.contains("P1"));
        assert_eq!(request.context.terms, vec!["postgres".to_string()]);
    }

    #[test]
    fn test_builder_rejects_blank_entries() {
        let result = RoutingRequest::builder().incident_type("  ").build();
        assert!(matches!(result, Err(RoutingError::InvalidRequest(_))));
    }

    #[test]
    fn test_empty_request_is_blank() {
        let request = RoutingRequest::builder().build().unwrap();
        assert!(request.is_blank());
        assert!(request.context.terms.is_empty());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "text": "payments are failing",
            "context": {
                "incident_priorities": ["P2"],
                "incident_types": ["payments"],
                "terms": []
            }
        }"#;

        let request = RoutingRequest::from_json(json).unwrap();
        assert_eq!(request.text, "payments are failing");
        assert!(request.context.incident_types.contains("payments"));
    }

    #[test]
    fn test_from_json_accepts_camel_case() {
        let json = r#"{
            "text": "",
            "context": {"incidentPriorities": ["P1"], "incidentTypes": [], "terms": ["dns"]}
        }"#;

        let request = RoutingRequest::from_json(json).unwrap();
        assert!(request.context.incident_priorities.contains("P1"));
        assert_eq!(request.context.terms, vec!["dns".to_string()]);
    }

    #[test]
    fn test_from_json_missing_field_fails() {
        let json = r#"{"text": "x", "context": {"incident_types": [], "terms": []}}"#;
        let err = RoutingRequest::from_json(json).unwrap_err();
        assert!(err.to_string().contains("incident_priorities"));
    }

    #[test]
    fn test_from_json_blank_entry_fails() {
        let json = r#"{"text": "x", "context": {"incident_priorities": [""], "incident_types": [], "terms": []}}"#;
        let err = RoutingRequest::from_json(json).unwrap_err();
        assert!(err.to_string().contains("blank entry"));
    }
}
