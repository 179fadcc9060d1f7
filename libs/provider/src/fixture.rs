//! Recorded provider client.
//!
//! A `FixtureProvider` holds an ordered script of expected requests and the
//! responses to return for them. Each call must match the next recording
//! exactly; anything else fails with [`ProviderError::UnexpectedRequest`].
//! Every call is recorded, so tests can assert on the full call sequence
//! afterwards.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::client::CloudProvider;
use crate::error::{ProviderError, ProviderResult};
use crate::request::{Operation, ProviderRequest, ProviderResponse};

/// How a recording decides whether a request is the one it expects.
#[derive(Debug, Clone)]
pub enum RequestMatcher {
    /// Parameters must be identical.
    Exact(ProviderRequest),

    /// Any request for this operation matches.
    Operation(Operation),
}

impl RequestMatcher {
    fn matches(&self, request: &ProviderRequest) -> bool {
        match self {
            Self::Exact(expected) => expected == request,
            Self::Operation(op) => *op == request.operation(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Exact(expected) => format!("{} {}", expected.operation(), expected.params()),
            Self::Operation(op) => format!("{op} (any parameters)"),
        }
    }
}

struct Recording {
    matcher: RequestMatcher,
    response: ProviderResult<ProviderResponse>,
}

#[derive(Default)]
struct FixtureState {
    script: VecDeque<Recording>,
    calls: Vec<ProviderRequest>,
}

/// Provider client that replays recorded responses.
#[derive(Default)]
pub struct FixtureProvider {
    state: Mutex<FixtureState>,
}

impl FixtureProvider {
    /// Create an empty fixture.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FixtureState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn push(&self, matcher: RequestMatcher, response: ProviderResult<ProviderResponse>) {
        self.with_state(|s| s.script.push_back(Recording { matcher, response }));
    }

    /// Expect exactly `request` next and answer with `response`.
    pub fn expect(&self, request: ProviderRequest, response: ProviderResponse) -> &Self {
        self.push(RequestMatcher::Exact(request), Ok(response));
        self
    }

    /// Expect any request for `operation` next and answer with `response`.
    pub fn expect_operation(&self, operation: Operation, response: ProviderResponse) -> &Self {
        self.push(RequestMatcher::Operation(operation), Ok(response));
        self
    }

    /// Expect exactly `request` next and fail it with `error`.
    pub fn expect_error(&self, request: ProviderRequest, error: ProviderError) -> &Self {
        self.push(RequestMatcher::Exact(request), Err(error));
        self
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<ProviderRequest> {
        self.with_state(|s| s.calls.clone())
    }

    /// Requests seen so far that change provider state.
    pub fn mutating_calls(&self) -> Vec<ProviderRequest> {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter(|r| r.operation().is_mutating())
                .cloned()
                .collect()
        })
    }

    /// Number of requests seen for one operation.
    pub fn call_count(&self, operation: Operation) -> usize {
        self.with_state(|s| s.calls.iter().filter(|r| r.operation() == operation).count())
    }

    /// Number of recordings not yet consumed.
    pub fn remaining(&self) -> usize {
        self.with_state(|s| s.script.len())
    }

    /// Returns true if every recording was consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Forget the call log, keeping unconsumed recordings.
    pub fn clear_calls(&self) {
        self.with_state(|s| s.calls.clear());
    }
}

#[async_trait]
impl CloudProvider for FixtureProvider {
    async fn call(&self, request: ProviderRequest) -> ProviderResult<ProviderResponse> {
        debug!(operation = %request.operation(), "[FIXTURE] provider call");

        self.with_state(|s| {
            s.calls.push(request.clone());

            let Some(next) = s.script.front() else {
                return Err(ProviderError::NoRecording(request.operation()));
            };

            if !next.matcher.matches(&request) {
                return Err(ProviderError::UnexpectedRequest {
                    expected: next.matcher.describe(),
                    actual: format!("{} {}", request.operation(), request.params()),
                });
            }

            match s.script.pop_front() {
                Some(recording) => recording.response,
                None => Err(ProviderError::NoRecording(request.operation())),
            }
        })
    }
}
