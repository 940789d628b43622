//! A backend wrapping [`InMemoryStore`] that can fail reads on demand and records how
//! many calls are in flight at once.

#![allow(dead_code)]

use async_trait::async_trait;
use docmodel::{
    memory::InMemoryStore,
    prelude::*,
    request::{
        DocumentTarget, Hit, IndexRequest, MultiGetRequest, SearchRequest, SearchResponse,
        UpdateRequest, WriteResponse,
    },
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

#[derive(Debug, Default)]
pub struct Calls {
    failing_reads: AtomicBool,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    multi_gets: AtomicUsize,
}

impl Calls {
    pub fn fail_reads(&self) {
        self.failing_reads.store(true, Ordering::SeqCst);
    }

    /// The largest number of backend calls observed running together.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn multi_gets(&self) -> usize {
        self.multi_gets.load(Ordering::SeqCst)
    }

    pub fn reset_peak(&self) {
        self.peak.store(0, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackedStore {
    inner: InMemoryStore,
    calls: Arc<Calls>,
}

impl TrackedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Arc<Calls> {
        Arc::clone(&self.calls)
    }

    /// Marks a call as running, yields a few times so sibling calls can start, then
    /// runs `call`.
    async fn tracked<T>(&self, call: impl Future<Output = T>) -> T {
        let running = self.calls.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.peak.fetch_max(running, Ordering::SeqCst);

        for _ in 0..16 {
            tokio::task::yield_now().await;
        }

        let output = call.await;
        self.calls.in_flight.fetch_sub(1, Ordering::SeqCst);
        output
    }

    fn check_reads(&self) -> DocumentStoreResult<()> {
        if self.calls.failing_reads.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::Backend("read refused".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for TrackedStore {
    async fn index_document(&self, request: IndexRequest) -> DocumentStoreResult<WriteResponse> {
        self.tracked(StoreBackend::index_document(&self.inner, request)).await
    }

    async fn update_document(&self, request: UpdateRequest) -> DocumentStoreResult<WriteResponse> {
        self.tracked(StoreBackend::update_document(&self.inner, request)).await
    }

    async fn delete_document(&self, target: DocumentTarget) -> DocumentStoreResult<()> {
        self.tracked(StoreBackend::delete_document(&self.inner, target)).await
    }

    async fn multi_get(&self, request: MultiGetRequest) -> DocumentStoreResult<Vec<Hit>> {
        self.calls.multi_gets.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        self.tracked(StoreBackend::multi_get(&self.inner, request)).await
    }

    async fn search(&self, request: SearchRequest) -> DocumentStoreResult<SearchResponse> {
        self.check_reads()?;
        self.tracked(StoreBackend::search(&self.inner, request)).await
    }
}
