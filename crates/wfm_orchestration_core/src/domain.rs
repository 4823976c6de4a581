//! The workflow manager's own routing table and event vocabulary.

use serde_json::{json, Map, Value};

use crate::dispatch::{CatalogueEntry, DispatchRuleSet, HandlerBinding, HandlerId};
use crate::envelope::EventEnvelope;
use crate::error::ConfigurationError;
use crate::pattern::DispatchRule;

pub const WORKFLOW_MANAGER_SOURCE: &str = "orcabus.workflowmanager";

pub const WORKFLOW_RUN_STATE_CHANGE: &str = "WorkflowRunStateChange";
pub const WORKFLOW_RUN_UPDATE: &str = "WorkflowRunUpdate";
pub const ANALYSIS_RUN_UPDATE: &str = "AnalysisRunUpdate";
pub const ANALYSIS_RUN_STATE_CHANGE: &str = "AnalysisRunStateChange";

pub const LEGACY_STATE_CHANGE_HANDLER: &str = "handle_wrsc_event_legacy";
pub const WORKFLOW_RUN_UPDATE_HANDLER: &str = "handle_wru_event";
pub const ANALYSIS_RUN_UPDATE_HANDLER: &str = "handle_aru_event";

pub const LEGACY_STATE_CHANGE_RULE: &str = "EventRule";
pub const WORKFLOW_RUN_UPDATE_RULE: &str = "EventRule2";
pub const ANALYSIS_RUN_UPDATE_RULE: &str = "EventRuleARU";

/// Builds the three domain bindings and checks them against the known event
/// catalogue before handing them out.
pub fn domain_rule_set(own_source: &str) -> Result<DispatchRuleSet, ConfigurationError> {
    let rules = DispatchRuleSet::new(
        own_source,
        vec![
            HandlerBinding::new(
                DispatchRule::new(LEGACY_STATE_CHANGE_RULE)
                    .with_description(
                        "Send WorkflowRunStateChange events to the legacy state-change handler",
                    )
                    .with_detail_type(WORKFLOW_RUN_STATE_CHANGE)
                    .excluding_source(own_source)
                    .requiring_field("workflowName")
                    .requiring_field("workflowVersion"),
                LEGACY_STATE_CHANGE_HANDLER,
            ),
            HandlerBinding::new(
                DispatchRule::new(WORKFLOW_RUN_UPDATE_RULE)
                    .with_description("Send WorkflowRunUpdate events to the update handler")
                    .with_detail_type(WORKFLOW_RUN_UPDATE)
                    .excluding_source(own_source),
                WORKFLOW_RUN_UPDATE_HANDLER,
            ),
            HandlerBinding::new(
                DispatchRule::new(ANALYSIS_RUN_UPDATE_RULE)
                    .with_description("Send AnalysisRunUpdate events to the analysis handler")
                    .with_detail_type(ANALYSIS_RUN_UPDATE)
                    .excluding_source(own_source),
                ANALYSIS_RUN_UPDATE_HANDLER,
            ),
        ],
    )?;

    rules.verify_catalogue(&domain_catalogue(own_source))?;
    Ok(rules)
}

/// Representative events seen on the shared bus and where each must go.
pub fn domain_catalogue(own_source: &str) -> Vec<CatalogueEntry> {
    let external = "orcabus.executionservice";
    let legacy_detail = json!({
        "portalRunId": "20240501abcdef01",
        "executionId": "wfr.01J0000000000000000000000",
        "workflowName": "qc",
        "workflowVersion": "1.0",
        "status": "SUCCEEDED"
    });

    vec![
        entry(
            external,
            WORKFLOW_RUN_STATE_CHANGE,
            legacy_detail.clone(),
            Some(LEGACY_STATE_CHANGE_HANDLER),
        ),
        entry(
            external,
            WORKFLOW_RUN_STATE_CHANGE,
            json!({"workflowName": "qc", "status": "RUNNING"}),
            None,
        ),
        entry(own_source, WORKFLOW_RUN_STATE_CHANGE, legacy_detail, None),
        entry(
            external,
            WORKFLOW_RUN_UPDATE,
            json!({"portalRunId": "20240501abcdef02", "status": "READY"}),
            Some(WORKFLOW_RUN_UPDATE_HANDLER),
        ),
        entry(
            own_source,
            WORKFLOW_RUN_UPDATE,
            json!({"status": "READY"}),
            None,
        ),
        entry(
            "orcabus.analysisglue",
            ANALYSIS_RUN_UPDATE,
            json!({"analysisRunName": "tn-umccrise", "status": "DRAFT"}),
            Some(ANALYSIS_RUN_UPDATE_HANDLER),
        ),
        entry(
            own_source,
            ANALYSIS_RUN_UPDATE,
            json!({"status": "READY"}),
            None,
        ),
        entry(
            own_source,
            ANALYSIS_RUN_STATE_CHANGE,
            json!({"status": "READY"}),
            None,
        ),
        entry(external, "FastqListRowStateChange", json!({}), None),
    ]
}

fn entry(source: &str, detail_type: &str, detail: Value, expected: Option<&str>) -> CatalogueEntry {
    CatalogueEntry {
        envelope: EventEnvelope::new(
            source,
            detail_type,
            detail.as_object().cloned().unwrap_or_default(),
        ),
        expected: expected.map(HandlerId::from),
    }
}

/// Event types the workflow manager itself publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundEventType {
    WorkflowRunStateChange,
    AnalysisRunStateChange,
}

impl OutboundEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkflowRunStateChange => WORKFLOW_RUN_STATE_CHANGE,
            Self::AnalysisRunStateChange => ANALYSIS_RUN_STATE_CHANGE,
        }
    }
}

/// An event as this service publishes it: always stamped with the rule
/// set's own source, so it can never re-enter its own handlers.
pub fn outbound_event(
    rules: &DispatchRuleSet,
    event_type: OutboundEventType,
    detail: Map<String, Value>,
) -> EventEnvelope {
    EventEnvelope::new(rules.own_source(), event_type.as_str(), detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_rule_set_builds_for_default_source() {
        let rules = domain_rule_set(WORKFLOW_MANAGER_SOURCE).expect("domain rules should build");
        assert_eq!(rules.bindings().len(), 3);
        assert_eq!(rules.own_source(), WORKFLOW_MANAGER_SOURCE);
    }

    #[test]
    fn domain_rule_set_follows_configured_source() {
        let rules = domain_rule_set("orcabus.workflowmanager.dev").expect("rules should build");

        let own = EventEnvelope::new(
            "orcabus.workflowmanager.dev",
            WORKFLOW_RUN_UPDATE,
            Map::new(),
        );
        assert_eq!(rules.dispatch(&own).expect("dispatch").handler_id(), None);
    }

    #[test]
    fn renders_domain_patterns() {
        let rules = domain_rule_set(WORKFLOW_MANAGER_SOURCE).expect("domain rules should build");
        let patterns = rules.event_patterns();

        assert_eq!(
            patterns["EventRule"]["pattern"],
            json!({
                "source": [{"anything-but": "orcabus.workflowmanager"}],
                "detail-type": ["WorkflowRunStateChange"],
                "detail": {
                    "workflowName": [{"exists": true}],
                    "workflowVersion": [{"exists": true}]
                }
            })
        );
        assert_eq!(
            patterns["EventRuleARU"]["handler"],
            json!("handle_aru_event")
        );
    }

    #[test]
    fn outbound_events_never_reenter_own_rules() {
        let rules = domain_rule_set(WORKFLOW_MANAGER_SOURCE).expect("domain rules should build");

        for event_type in [
            OutboundEventType::WorkflowRunStateChange,
            OutboundEventType::AnalysisRunStateChange,
        ] {
            let detail = json!({"workflowName": "qc", "workflowVersion": "1.0", "status": "READY"});
            let event = outbound_event(
                &rules,
                event_type,
                detail.as_object().cloned().unwrap_or_default(),
            );

            assert_eq!(event.source(), WORKFLOW_MANAGER_SOURCE);
            assert!(rules.matching(&event).is_empty());
        }
    }
}
