//! Error types shared across routing and orchestration.

use crate::dispatch::HandlerId;
use crate::run::RunPhase;

/// A rule set or registry that cannot route events unambiguously.
///
/// These are setup-time failures. If one reaches runtime the event must not
/// be routed at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("own event source cannot be empty")]
    EmptyOwnSource,

    #[error("rule set must contain at least one binding")]
    EmptyRuleSet,

    #[error("dispatch rule names must be non-empty")]
    UnnamedRule,

    #[error("duplicate rule name: {name}")]
    DuplicateRuleName { name: String },

    #[error("handler {handler_id} is bound to more than one rule")]
    DuplicateHandler { handler_id: HandlerId },

    #[error("rule {rule} does not exclude own source {own_source}; its handler would re-trigger itself")]
    SelfTriggeringRule { rule: String, own_source: String },

    #[error("rules {first} and {second} overlap on detail type {detail_type}")]
    OverlappingRules {
        first: String,
        second: String,
        detail_type: String,
    },

    #[error("event {detail_type} from {event_source} matches several handlers: {handlers:?}")]
    AmbiguousDispatch {
        detail_type: String,
        event_source: String,
        handlers: Vec<HandlerId>,
    },

    #[error("event {detail_type} from {event_source} dispatched to {actual:?}, expected {expected:?}")]
    UnexpectedDispatch {
        detail_type: String,
        event_source: String,
        expected: Option<HandlerId>,
        actual: Option<HandlerId>,
    },

    #[error("handler {handler_id} is registered more than once")]
    DuplicateRegistration { handler_id: HandlerId },

    #[error("rule set binds handler {handler_id} but nothing is registered for it")]
    UnregisteredHandler { handler_id: HandlerId },

    #[error("handler {handler_id} is registered but no rule routes to it")]
    UnboundHandler { handler_id: HandlerId },
}

/// An inbound payload that is not a well-formed bus event.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("event payload must be a JSON object")]
    NotAnObject,

    #[error("malformed event JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),

    #[error("invalid event envelope: {0}")]
    InvalidShape(#[source] serde_json::Error),
}

/// Failure reported by a handler. The dispatcher does not retry; the bus's
/// own redelivery and dead-letter handling owns that.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerInvocationError {
    message: String,
}

impl HandlerInvocationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("handler {handler_id} failed: {source}")]
    HandlerFailed {
        handler_id: HandlerId,
        #[source]
        source: HandlerInvocationError,
    },
}

/// An execution graph definition that breaks the backup-before-migration
/// shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("graph name cannot be empty")]
    UnnamedGraph,

    #[error("step names must be non-empty")]
    UnnamedStep,

    #[error("duplicate step name: {name}")]
    DuplicateStep { name: String },

    #[error("graph requires exactly one backup step followed by exactly one migration step")]
    InvalidShape,

    #[error("step {name} must run in {expected} mode")]
    WrongMode { name: String, expected: String },

    #[error("step {name} has no invocation target")]
    MissingTarget { name: String },
}

/// Attempted run transition that the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid run transition: {from} -> {to}")]
    InvalidTransition { from: RunPhase, to: RunPhase },

    #[error("step report for {step} cannot complete the {phase} phase")]
    WrongStep { step: String, phase: RunPhase },
}

/// The trigger could not get a run accepted by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerError {
    #[error("execution engine unavailable for run {run_id}: {reason}")]
    Unavailable { run_id: String, reason: String },

    #[error("execution engine did not accept run {run_id} (status {status_code})")]
    NotAccepted { run_id: String, status_code: u16 },
}

/// A poll policy under which a running job would never reach its timeout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollPolicyError {
    #[error("poll interval must be positive")]
    ZeroInterval,
}
