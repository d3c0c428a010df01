//! Task orchestrator: the entry point invoked once per authorization request.

use std::sync::Arc;

use stationauth_audit::AuditLogger;
use stationauth_core::{
    AuditRecord, AuthorizationRequest, CallbackReceipt, Clock, DecisionOutcome, DecisionPayload,
    MonotonicClock, validate_callback_url,
};
use tracing::info;

use crate::dispatcher::CallbackDispatcher;
use crate::resolver::DecisionResolver;

/// What one invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub outcome: DecisionOutcome,
    pub receipt: CallbackReceipt,
}

/// Runs `decide -> dispatch -> audit` for one request.
///
/// Shared by all concurrent invocations; holds no per-request state.
pub struct AuthorizationTask {
    resolver: DecisionResolver,
    dispatcher: Arc<dyn CallbackDispatcher>,
    audit: AuditLogger,
    /// Source of start times; strictly increasing so record keys never collide
    clock: MonotonicClock,
}

impl AuthorizationTask {
    pub fn new(
        resolver: DecisionResolver,
        dispatcher: Arc<dyn CallbackDispatcher>,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            audit,
            clock: MonotonicClock::new(clock),
        }
    }

    /// Process one request. Always writes exactly one audit record.
    pub async fn run(&self, request: AuthorizationRequest) -> TaskSummary {
        let start_time = self.clock.now();
        let deadline = request.deadline();

        let outcome = self.resolver.resolve(&request, deadline).await;
        let payload = DecisionPayload::new(&request, outcome);

        let receipt = if validate_callback_url(&request.callback_url) {
            self.dispatcher.dispatch(&request.callback_url, &payload).await
        } else {
            CallbackReceipt::Skipped
        };

        info!(
            station_id = %request.station_id,
            outcome = %outcome,
            callback_status = %receipt,
            "Authorization task finished"
        );

        let record = AuditRecord::new(start_time, payload, &receipt, request.callback_url);
        self.audit.log(&record).await;

        TaskSummary { outcome, receipt }
    }
}
