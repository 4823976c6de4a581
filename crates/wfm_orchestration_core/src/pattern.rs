//! Content-based event matching.
//!
//! A [`DispatchRule`] is the conjunction of three independent predicates:
//! a detail-type allow-list, a source exclusion list ("anything-but"), and
//! detail field presence checks. Each predicate is exposed on its own so the
//! exclusion matcher in particular can be tested in isolation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::envelope::EventEnvelope;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchRule {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    detail_types: BTreeSet<String>,
    #[serde(default)]
    excluded_sources: BTreeSet<String>,
    #[serde(default)]
    required_detail_fields: BTreeSet<String>,
}

impl DispatchRule {
    /// A rule with every predicate unconfigured, which matches any event.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            detail_types: BTreeSet::new(),
            excluded_sources: BTreeSet::new(),
            required_detail_fields: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_detail_type(mut self, detail_type: impl Into<String>) -> Self {
        self.detail_types.insert(detail_type.into());
        self
    }

    pub fn excluding_source(mut self, source: impl Into<String>) -> Self {
        self.excluded_sources.insert(source.into());
        self
    }

    pub fn requiring_field(mut self, field: impl Into<String>) -> Self {
        self.required_detail_fields.insert(field.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn detail_types(&self) -> &BTreeSet<String> {
        &self.detail_types
    }

    pub fn excluded_sources(&self) -> &BTreeSet<String> {
        &self.excluded_sources
    }

    pub fn required_detail_fields(&self) -> &BTreeSet<String> {
        &self.required_detail_fields
    }

    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        matches(envelope, self)
    }

    /// Renders the rule in the bus's JSON pattern language.
    ///
    /// Unconfigured predicates are omitted. A single excluded source renders
    /// as a scalar `anything-but`, several as a list.
    pub fn to_event_pattern(&self) -> Value {
        let mut pattern = Map::new();

        if !self.excluded_sources.is_empty() {
            let excluded = if self.excluded_sources.len() == 1 {
                json!(self.excluded_sources.iter().next())
            } else {
                json!(self.excluded_sources)
            };
            pattern.insert("source".to_string(), json!([{ "anything-but": excluded }]));
        }

        if !self.detail_types.is_empty() {
            pattern.insert("detail-type".to_string(), json!(self.detail_types));
        }

        if !self.required_detail_fields.is_empty() {
            let detail: Map<String, Value> = self
                .required_detail_fields
                .iter()
                .map(|field| (field.clone(), json!([{ "exists": true }])))
                .collect();
            pattern.insert("detail".to_string(), Value::Object(detail));
        }

        Value::Object(pattern)
    }
}

/// Evaluates `rule` against `envelope`: the AND of all three predicates.
pub fn matches(envelope: &EventEnvelope, rule: &DispatchRule) -> bool {
    matches_detail_type(envelope.detail_type(), &rule.detail_types)
        && matches_anything_but(envelope.source(), &rule.excluded_sources)
        && has_required_fields(envelope, &rule.required_detail_fields)
}

/// An empty allow-list is a wildcard.
pub fn matches_detail_type(detail_type: &str, detail_types: &BTreeSet<String>) -> bool {
    detail_types.is_empty() || detail_types.contains(detail_type)
}

/// Negated set membership: matches every value not in `excluded`.
pub fn matches_anything_but(value: &str, excluded: &BTreeSet<String>) -> bool {
    !excluded.contains(value)
}

/// Presence only; field values are never inspected.
pub fn has_required_fields(envelope: &EventEnvelope, fields: &BTreeSet<String>) -> bool {
    fields.iter().all(|field| envelope.has_detail_field(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(source: &str, detail_type: &str, detail: Value) -> EventEnvelope {
        EventEnvelope::new(
            source,
            detail_type,
            detail.as_object().cloned().unwrap_or_default(),
        )
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn anything_but_matches_values_outside_the_set() {
        let excluded = set(&["orcabus.workflowmanager"]);

        assert!(matches_anything_but("external.lims", &excluded));
        assert!(!matches_anything_but("orcabus.workflowmanager", &excluded));
    }

    #[test]
    fn anything_but_is_not_an_allow_list() {
        let excluded = set(&["orcabus.workflowmanager", "orcabus.other"]);

        assert!(matches_anything_but("", &excluded));
        assert!(matches_anything_but("ORCABUS.WORKFLOWMANAGER", &excluded));
        assert!(!matches_anything_but("orcabus.other", &excluded));
    }

    #[test]
    fn empty_exclusion_set_excludes_nothing() {
        assert!(matches_anything_but("orcabus.workflowmanager", &BTreeSet::new()));
    }

    #[test]
    fn empty_detail_type_set_is_wildcard() {
        assert!(matches_detail_type("Anything", &BTreeSet::new()));
        assert!(!matches_detail_type("Anything", &set(&["WorkflowRunUpdate"])));
    }

    #[test]
    fn required_fields_check_presence_not_value() {
        let fields = set(&["workflowName", "workflowVersion"]);

        let present = envelope(
            "external.x",
            "WorkflowRunStateChange",
            json!({"workflowName": "", "workflowVersion": false}),
        );
        let missing = envelope(
            "external.x",
            "WorkflowRunStateChange",
            json!({"workflowName": "qc"}),
        );

        assert!(has_required_fields(&present, &fields));
        assert!(!has_required_fields(&missing, &fields));
    }

    #[test]
    fn rule_match_is_conjunction_of_predicates() {
        let rule = DispatchRule::new("EventRule")
            .with_detail_type("WorkflowRunStateChange")
            .excluding_source("orcabus.workflowmanager")
            .requiring_field("workflowName");

        let ok = envelope(
            "external.lims",
            "WorkflowRunStateChange",
            json!({"workflowName": "qc"}),
        );
        let wrong_type = envelope(
            "external.lims",
            "WorkflowRunUpdate",
            json!({"workflowName": "qc"}),
        );
        let own_source = envelope(
            "orcabus.workflowmanager",
            "WorkflowRunStateChange",
            json!({"workflowName": "qc"}),
        );
        let missing_field = envelope("external.lims", "WorkflowRunStateChange", json!({}));

        assert!(rule.matches(&ok));
        assert!(!rule.matches(&wrong_type));
        assert!(!rule.matches(&own_source));
        assert!(!rule.matches(&missing_field));
    }

    #[test]
    fn unconfigured_rule_matches_everything() {
        let rule = DispatchRule::new("catch-all");
        assert!(rule.matches(&envelope("any.source", "AnyType", json!({}))));
    }

    #[test]
    fn renders_bus_event_pattern() {
        let rule = DispatchRule::new("EventRule")
            .with_detail_type("WorkflowRunStateChange")
            .excluding_source("orcabus.workflowmanager")
            .requiring_field("workflowName")
            .requiring_field("workflowVersion");

        assert_eq!(
            rule.to_event_pattern(),
            json!({
                "source": [{"anything-but": "orcabus.workflowmanager"}],
                "detail-type": ["WorkflowRunStateChange"],
                "detail": {
                    "workflowName": [{"exists": true}],
                    "workflowVersion": [{"exists": true}]
                }
            })
        );
    }

    #[test]
    fn renders_multiple_exclusions_as_list_and_omits_empty_predicates() {
        let rule = DispatchRule::new("EventRule2")
            .excluding_source("b.source")
            .excluding_source("a.source");

        assert_eq!(
            rule.to_event_pattern(),
            json!({"source": [{"anything-but": ["a.source", "b.source"]}]})
        );
    }
}
