//! Provider wrapper that counts mutating calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fleet_provider::{CloudProvider, ProviderRequest, ProviderResponse, ProviderResult};

pub struct CountingProvider {
    inner: Arc<dyn CloudProvider>,
    mutating: AtomicUsize,
}

impl CountingProvider {
    pub fn new(inner: Arc<dyn CloudProvider>) -> Self {
        Self {
            inner,
            mutating: AtomicUsize::new(0),
        }
    }

    /// Mutating calls attempted so far, including failed ones.
    pub fn mutating_calls(&self) -> usize {
        self.mutating.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CloudProvider for CountingProvider {
    async fn call(&self, request: ProviderRequest) -> ProviderResult<ProviderResponse> {
        if request.operation().is_mutating() {
            self.mutating.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.call(request).await
    }
}
