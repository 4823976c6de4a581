use std::collections::BTreeMap;

use crate::dispatch::{DispatchDecision, DispatchRuleSet, HandlerId};
use crate::envelope::EventEnvelope;
use crate::error::{ConfigurationError, HandlerInvocationError, RouteError};

/// Receives the full envelope of every event routed to it.
///
/// Delivery is at-least-once, so implementations must tolerate seeing the
/// same event more than once.
pub trait EventHandler: Send + Sync {
    fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerInvocationError>;
}

impl<F> EventHandler for F
where
    F: Fn(&EventEnvelope) -> Result<(), HandlerInvocationError> + Send + Sync,
{
    fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerInvocationError> {
        self(envelope)
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<HandlerId, Box<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        handler_id: impl Into<HandlerId>,
        handler: impl EventHandler + 'static,
    ) -> Result<(), ConfigurationError> {
        let handler_id = handler_id.into();
        if self.handlers.contains_key(&handler_id) {
            return Err(ConfigurationError::DuplicateRegistration { handler_id });
        }
        self.handlers.insert(handler_id, Box::new(handler));
        Ok(())
    }

    pub fn get(&self, handler_id: &HandlerId) -> Option<&dyn EventHandler> {
        self.handlers
            .get(handler_id)
            .map(|handler| handler.as_ref())
    }

    pub fn handler_ids(&self) -> impl Iterator<Item = &HandlerId> {
        self.handlers.keys()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Routed {
        handler_id: HandlerId,
        rule: String,
        fingerprint: String,
    },
    Ignored {
        fingerprint: String,
    },
}

/// A rule set paired with the handlers its bindings name.
#[derive(Debug)]
pub struct Dispatcher {
    rules: DispatchRuleSet,
    registry: HandlerRegistry,
}

impl Dispatcher {
    /// Fails when a binding has no registered handler or a registered
    /// handler is unreachable from every rule.
    pub fn new(
        rules: DispatchRuleSet,
        registry: HandlerRegistry,
    ) -> Result<Self, ConfigurationError> {
        for binding in rules.bindings() {
            if registry.get(binding.handler_id()).is_none() {
                return Err(ConfigurationError::UnregisteredHandler {
                    handler_id: binding.handler_id().clone(),
                });
            }
        }

        for handler_id in registry.handler_ids() {
            let bound = rules
                .bindings()
                .iter()
                .any(|binding| binding.handler_id() == handler_id);
            if !bound {
                return Err(ConfigurationError::UnboundHandler {
                    handler_id: handler_id.clone(),
                });
            }
        }

        Ok(Self { rules, registry })
    }

    pub fn rules(&self) -> &DispatchRuleSet {
        &self.rules
    }

    /// Routes one event to at most one handler.
    ///
    /// Events matching no rule are ignored. Handler failures are returned to
    /// the caller unchanged so the bus can redeliver or dead-letter them.
    pub fn route(&self, envelope: &EventEnvelope) -> Result<RouteOutcome, RouteError> {
        let fingerprint = envelope.fingerprint();

        let binding = match self.rules.dispatch(envelope) {
            Ok(DispatchDecision::Matched(binding)) => binding,
            Ok(DispatchDecision::NoMatch) => {
                tracing::debug!(
                    component = "event_router",
                    source = envelope.source(),
                    detail_type = envelope.detail_type(),
                    fingerprint = %fingerprint,
                    "event ignored"
                );
                return Ok(RouteOutcome::Ignored { fingerprint });
            }
            Err(error) => {
                tracing::error!(
                    component = "event_router",
                    source = envelope.source(),
                    detail_type = envelope.detail_type(),
                    fingerprint = %fingerprint,
                    error = %error,
                    "ambiguous dispatch"
                );
                return Err(error.into());
            }
        };

        let handler_id = binding.handler_id();
        let handler = self
            .registry
            .get(handler_id)
            .ok_or_else(|| ConfigurationError::UnregisteredHandler {
                handler_id: handler_id.clone(),
            })?;

        tracing::info!(
            component = "event_router",
            rule = binding.rule().name(),
            handler_id = %handler_id,
            source = envelope.source(),
            detail_type = envelope.detail_type(),
            event_id = envelope.id().unwrap_or_default(),
            fingerprint = %fingerprint,
            "event dispatched"
        );

        handler.handle(envelope).map_err(|source| {
            tracing::error!(
                component = "event_router",
                handler_id = %handler_id,
                fingerprint = %fingerprint,
                error = %source,
                "handler failed"
            );
            RouteError::HandlerFailed {
                handler_id: handler_id.clone(),
                source,
            }
        })?;

        Ok(RouteOutcome::Routed {
            handler_id: handler_id.clone(),
            rule: binding.rule().name().to_string(),
            fingerprint,
        })
    }
}
