//! Observability helpers for manager flows.
//!
//! Every flow runs inside a `token_lifecycle.flow` span carrying the `flow` and `stage` fields.
//! With the `metrics` feature enabled, the `token_lifecycle_flow_total` counter is incremented
//! for every attempt, success, and failure, labeled by `flow` and `outcome`.

// crates.io
use tracing::{Instrument, Span};
// self
use crate::_prelude::*;

/// Flow kinds observed by the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Password grant, including layout probing.
	Acquire,
	/// Refresh grant with password fallback.
	Refresh,
	/// Bounded background renewal.
	Renew,
	/// Session termination.
	Logout,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Acquire => "acquire",
			FlowKind::Refresh => "refresh",
			FlowKind::Renew => "renew",
			FlowKind::Logout => "logout",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a manager operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure reported back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Span wrapping one manager flow.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	span: Span,
}
impl FlowSpan {
	/// Creates a span tagged with the flow kind and stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		let span = tracing::info_span!("token_lifecycle.flow", flow = kind.as_str(), stage);

		Self { kind, span }
	}

	/// Runs `fut` inside the span and records its attempt and outcome.
	///
	/// `succeeded` decides which outcome the output counts as.
	pub async fn observe<Fut, F>(&self, fut: Fut, succeeded: F) -> Fut::Output
	where
		Fut: Future,
		F: FnOnce(&Fut::Output) -> bool,
	{
		record(self.kind, FlowOutcome::Attempt);

		let output = fut.instrument(self.span.clone()).await;
		let outcome = if succeeded(&output) { FlowOutcome::Success } else { FlowOutcome::Failure };

		record(self.kind, outcome);

		output
	}
}

#[cfg(feature = "metrics")]
fn record(kind: FlowKind, outcome: FlowOutcome) {
	metrics::counter!(
		"token_lifecycle_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record(_: FlowKind, _: FlowOutcome) {}
