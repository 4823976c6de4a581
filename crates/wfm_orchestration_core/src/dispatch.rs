use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::envelope::EventEnvelope;
use crate::error::ConfigurationError;
use crate::pattern::DispatchRule;

/// Identifies the handler a rule routes to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(String);

impl HandlerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBinding {
    rule: DispatchRule,
    handler_id: HandlerId,
}

impl HandlerBinding {
    pub fn new(rule: DispatchRule, handler_id: impl Into<HandlerId>) -> Self {
        Self {
            rule,
            handler_id: handler_id.into(),
        }
    }

    pub fn rule(&self) -> &DispatchRule {
        &self.rule
    }

    pub fn handler_id(&self) -> &HandlerId {
        &self.handler_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision<'a> {
    Matched(&'a HandlerBinding),
    /// Not relevant to this domain. Dropped without error.
    NoMatch,
}

impl DispatchDecision<'_> {
    pub fn handler_id(&self) -> Option<&HandlerId> {
        match self {
            Self::Matched(binding) => Some(binding.handler_id()),
            Self::NoMatch => None,
        }
    }
}

/// A known event shape and the handler it must reach (`None` = dropped).
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueEntry {
    pub envelope: EventEnvelope,
    pub expected: Option<HandlerId>,
}

/// Ordered, immutable set of rule-to-handler bindings for one domain.
///
/// Construction rejects rule sets that could route one event to two handlers
/// or let a handler's own output re-trigger it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRuleSet {
    own_source: String,
    bindings: Vec<HandlerBinding>,
}

impl DispatchRuleSet {
    pub fn new(
        own_source: impl Into<String>,
        bindings: Vec<HandlerBinding>,
    ) -> Result<Self, ConfigurationError> {
        let own_source = own_source.into();
        if own_source.trim().is_empty() {
            return Err(ConfigurationError::EmptyOwnSource);
        }
        if bindings.is_empty() {
            return Err(ConfigurationError::EmptyRuleSet);
        }

        let mut rule_names = BTreeSet::new();
        let mut handler_ids = BTreeSet::new();
        for binding in &bindings {
            let name = binding.rule.name();
            if name.trim().is_empty() {
                return Err(ConfigurationError::UnnamedRule);
            }
            if !rule_names.insert(name) {
                return Err(ConfigurationError::DuplicateRuleName {
                    name: name.to_string(),
                });
            }
            if !handler_ids.insert(&binding.handler_id) {
                return Err(ConfigurationError::DuplicateHandler {
                    handler_id: binding.handler_id.clone(),
                });
            }
            if !binding.rule.excluded_sources().contains(&own_source) {
                return Err(ConfigurationError::SelfTriggeringRule {
                    rule: name.to_string(),
                    own_source,
                });
            }
        }

        check_disjoint_detail_types(&bindings)?;

        Ok(Self {
            own_source,
            bindings,
        })
    }

    pub fn own_source(&self) -> &str {
        &self.own_source
    }

    pub fn bindings(&self) -> &[HandlerBinding] {
        &self.bindings
    }

    /// Every binding whose rule matches, in declaration order.
    pub fn matching(&self, envelope: &EventEnvelope) -> Vec<&HandlerBinding> {
        self.bindings
            .iter()
            .filter(|binding| binding.rule.matches(envelope))
            .collect()
    }

    /// Selects at most one handler for `envelope`.
    ///
    /// Several matches are a configuration error; the event is not routed to
    /// any of them.
    pub fn dispatch(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<DispatchDecision<'_>, ConfigurationError> {
        let matched = self.matching(envelope);
        match matched.as_slice() {
            [] => Ok(DispatchDecision::NoMatch),
            [binding] => Ok(DispatchDecision::Matched(*binding)),
            _ => Err(ConfigurationError::AmbiguousDispatch {
                detail_type: envelope.detail_type().to_string(),
                event_source: envelope.source().to_string(),
                handlers: matched
                    .iter()
                    .map(|binding| binding.handler_id.clone())
                    .collect(),
            }),
        }
    }

    /// Checks a catalogue of known events against the rule set: every entry
    /// must dispatch unambiguously to exactly its expected handler.
    pub fn verify_catalogue(&self, catalogue: &[CatalogueEntry]) -> Result<(), ConfigurationError> {
        for entry in catalogue {
            let actual = self.dispatch(&entry.envelope)?.handler_id().cloned();
            if actual != entry.expected {
                return Err(ConfigurationError::UnexpectedDispatch {
                    detail_type: entry.envelope.detail_type().to_string(),
                    event_source: entry.envelope.source().to_string(),
                    expected: entry.expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Rule name -> `{handler, description, pattern}` for provisioning.
    pub fn event_patterns(&self) -> Value {
        let rules: Map<String, Value> = self
            .bindings
            .iter()
            .map(|binding| {
                (
                    binding.rule.name().to_string(),
                    json!({
                        "handler": binding.handler_id,
                        "description": binding.rule.description(),
                        "pattern": binding.rule.to_event_pattern(),
                    }),
                )
            })
            .collect();
        Value::Object(rules)
    }
}

// Source filters are negative and field checks are existence-only, so any
// two rules that share a detail type can both be satisfied by one event.
fn check_disjoint_detail_types(bindings: &[HandlerBinding]) -> Result<(), ConfigurationError> {
    for (index, first) in bindings.iter().enumerate() {
        for second in &bindings[index + 1..] {
            let a = first.rule.detail_types();
            let b = second.rule.detail_types();
            let overlap = if a.is_empty() || b.is_empty() {
                Some("*".to_string())
            } else {
                a.intersection(b).next().cloned()
            };
            if let Some(detail_type) = overlap {
                return Err(ConfigurationError::OverlappingRules {
                    first: first.rule.name().to_string(),
                    second: second.rule.name().to_string(),
                    detail_type,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: &str = "orcabus.workflowmanager";

    fn envelope(source: &str, detail_type: &str) -> EventEnvelope {
        EventEnvelope::new(source, detail_type, Map::new())
    }

    fn rule(name: &str, detail_type: &str) -> DispatchRule {
        DispatchRule::new(name)
            .with_detail_type(detail_type)
            .excluding_source(OWN)
    }

    #[test]
    fn rejects_rule_that_does_not_exclude_own_source() {
        let error = DispatchRuleSet::new(
            OWN,
            vec![HandlerBinding::new(
                DispatchRule::new("EventRule").with_detail_type("WorkflowRunUpdate"),
                "handle_wru_event",
            )],
        )
        .expect_err("rule set should fail");

        assert_eq!(
            error,
            ConfigurationError::SelfTriggeringRule {
                rule: "EventRule".to_string(),
                own_source: OWN.to_string(),
            }
        );
    }

    #[test]
    fn rejects_overlapping_detail_types() {
        let error = DispatchRuleSet::new(
            OWN,
            vec![
                HandlerBinding::new(
                    rule("EventRule", "WorkflowRunStateChange").requiring_field("workflowName"),
                    "legacy",
                ),
                HandlerBinding::new(rule("EventRuleNew", "WorkflowRunStateChange"), "current"),
            ],
        )
        .expect_err("overlap should fail");

        match error {
            ConfigurationError::OverlappingRules { detail_type, .. } => {
                assert_eq!(detail_type, "WorkflowRunStateChange");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_wildcard_rule_next_to_any_other_rule() {
        let error = DispatchRuleSet::new(
            OWN,
            vec![
                HandlerBinding::new(rule("EventRule2", "WorkflowRunUpdate"), "wru"),
                HandlerBinding::new(DispatchRule::new("catch-all").excluding_source(OWN), "all"),
            ],
        )
        .expect_err("wildcard overlaps everything");

        assert!(matches!(
            error,
            ConfigurationError::OverlappingRules { ref detail_type, .. } if detail_type == "*"
        ));
    }

    #[test]
    fn rejects_duplicate_handlers_and_rule_names() {
        let duplicate_handler = DispatchRuleSet::new(
            OWN,
            vec![
                HandlerBinding::new(rule("A", "WorkflowRunUpdate"), "same"),
                HandlerBinding::new(rule("B", "AnalysisRunUpdate"), "same"),
            ],
        )
        .expect_err("handler reuse should fail");
        assert_eq!(
            duplicate_handler,
            ConfigurationError::DuplicateHandler {
                handler_id: HandlerId::from("same")
            }
        );

        let duplicate_name = DispatchRuleSet::new(
            OWN,
            vec![
                HandlerBinding::new(rule("A", "WorkflowRunUpdate"), "one"),
                HandlerBinding::new(rule("A", "AnalysisRunUpdate"), "two"),
            ],
        )
        .expect_err("rule name reuse should fail");
        assert_eq!(
            duplicate_name,
            ConfigurationError::DuplicateRuleName {
                name: "A".to_string()
            }
        );
    }

    #[test]
    fn rejects_empty_rule_set_and_blank_source() {
        assert_eq!(
            DispatchRuleSet::new(OWN, Vec::new()).expect_err("empty"),
            ConfigurationError::EmptyRuleSet
        );
        assert_eq!(
            DispatchRuleSet::new(" ", vec![HandlerBinding::new(rule("A", "X"), "a")])
                .expect_err("blank source"),
            ConfigurationError::EmptyOwnSource
        );
    }

    #[test]
    fn unmatched_event_is_dropped_without_error() {
        let rules = DispatchRuleSet::new(
            OWN,
            vec![HandlerBinding::new(rule("EventRule2", "WorkflowRunUpdate"), "wru")],
        )
        .expect("rule set should build");

        let decision = rules
            .dispatch(&envelope("external.x", "FastqListRowStateChange"))
            .expect("no match is not an error");
        assert_eq!(decision, DispatchDecision::NoMatch);
    }

    #[test]
    fn verify_catalogue_reports_gaps() {
        let rules = DispatchRuleSet::new(
            OWN,
            vec![HandlerBinding::new(rule("EventRule2", "WorkflowRunUpdate"), "wru")],
        )
        .expect("rule set should build");

        let error = rules
            .verify_catalogue(&[CatalogueEntry {
                envelope: envelope("external.x", "AnalysisRunUpdate"),
                expected: Some(HandlerId::from("aru")),
            }])
            .expect_err("uncovered event should fail");

        assert_eq!(
            error,
            ConfigurationError::UnexpectedDispatch {
                detail_type: "AnalysisRunUpdate".to_string(),
                event_source: "external.x".to_string(),
                expected: Some(HandlerId::from("aru")),
                actual: None,
            }
        );
    }

    #[test]
    fn event_patterns_are_keyed_by_rule_name() {
        let rules = DispatchRuleSet::new(
            OWN,
            vec![HandlerBinding::new(
                rule("EventRule2", "WorkflowRunUpdate").with_description("WRU events"),
                "handle_wru_event",
            )],
        )
        .expect("rule set should build");

        assert_eq!(
            rules.event_patterns(),
            json!({
                "EventRule2": {
                    "handler": "handle_wru_event",
                    "description": "WRU events",
                    "pattern": {
                        "source": [{"anything-but": OWN}],
                        "detail-type": ["WorkflowRunUpdate"]
                    }
                }
            })
        );
    }
}
