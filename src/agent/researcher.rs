//! Researcher sub-graph: one plan step in, a batch of documents out.
//!
//! ```text
//! step → QueryGenerator → [q1, q2, q3]
//!          ├── retrieve(q1) ┐
//!          ├── retrieve(q2) ├── merge (completion order) → documents
//!          └── retrieve(q3) ┘
//! ```
//!
//! Each retrieval task searches every candidate collection in order through
//! a [`ScopedRetriever`], which is released before the next collection is
//! acquired.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::capability::QueryGenerator;
use super::config::FanOutPolicy;
use super::queries::bound_queries;
use crate::core::{Document, DocumentCorpus, DocumentUpdate};
use crate::error::AgentError;
use crate::retrieval::{RetrieverProvider, SearchOptions};

/// State of one researcher invocation.
#[derive(Debug, Clone, Default)]
pub struct ResearcherState {
    /// Plan step being researched.
    pub step: String,
    /// Collections searched for every query.
    pub collections: Vec<String>,
    /// Generated queries, at most three.
    pub queries: Vec<String>,
    /// Documents merged from every retrieval task.
    pub documents: DocumentCorpus,
    /// Queries whose retrieval failed and were skipped.
    pub failed_queries: Vec<String>,
}

/// Runs the generate → fan-out → fan-in pipeline for a single step.
pub struct Researcher {
    query_generator: Arc<dyn QueryGenerator>,
    retrievers: Arc<dyn RetrieverProvider>,
    search: SearchOptions,
    max_concurrency: usize,
    policy: FanOutPolicy,
}

impl Researcher {
    /// Creates a researcher.
    ///
    /// `max_concurrency` bounds the number of retrieval tasks in flight and
    /// is clamped to at least one.
    pub fn new(
        query_generator: Arc<dyn QueryGenerator>,
        retrievers: Arc<dyn RetrieverProvider>,
        search: SearchOptions,
        max_concurrency: usize,
        policy: FanOutPolicy,
    ) -> Self {
        Self {
            query_generator,
            retrievers,
            search,
            max_concurrency: max_concurrency.max(1),
            policy,
        }
    }

    /// Researches one step across `collections`.
    ///
    /// # Errors
    ///
    /// Returns the generator's error, or [`AgentError::FanOut`] when a
    /// retrieval task fails under [`FanOutPolicy::FailFast`] or every task
    /// fails under [`FanOutPolicy::BestEffort`].
    pub async fn run(
        &self,
        step: &str,
        collections: &[String],
    ) -> Result<ResearcherState, AgentError> {
        let start = Instant::now();
        let mut state = ResearcherState {
            step: step.to_string(),
            collections: collections.to_vec(),
            ..ResearcherState::default()
        };

        state.queries = self.generate_queries(step, collections).await?;
        self.fan_out(&mut state).await?;

        info!(
            step,
            queries = state.queries.len(),
            documents = state.documents.len(),
            failed = state.failed_queries.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "research step complete"
        );
        Ok(state)
    }

    async fn generate_queries(
        &self,
        step: &str,
        collections: &[String],
    ) -> Result<Vec<String>, AgentError> {
        let raw = self.query_generator.generate(step, collections).await?;
        let queries = bound_queries(raw);
        debug!(step, ?queries, "generated queries");
        Ok(queries)
    }

    /// Spawns one retrieval task per query and merges results as tasks
    /// complete.
    ///
    /// Returns only after every task has finished or been cancelled, so no
    /// scoped retriever outlives the step. Under fail-fast the first failure
    /// cancels the remaining tasks and waits for them to unwind.
    async fn fan_out(&self, state: &mut ResearcherState) -> Result<(), AgentError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let collections: Arc<[String]> = Arc::from(state.collections.as_slice());
        let total = state.queries.len();

        let mut tasks = JoinSet::new();
        for query in &state.queries {
            let sem = Arc::clone(&semaphore);
            let retrievers = Arc::clone(&self.retrievers);
            let colls = Arc::clone(&collections);
            let options = self.search;
            let q = query.clone();

            tasks.spawn(async move {
                let result = match sem.acquire().await {
                    Ok(_permit) => retrieve_documents(&*retrievers, &q, &colls, &options).await,
                    Err(e) => Err(AgentError::orchestration(format!(
                        "semaphore acquire failed: {e}"
                    ))),
                };
                (q, result)
            });
        }

        let mut failed = 0;
        let mut first_error: Option<String> = None;
        while let Some(joined) = tasks.join_next().await {
            let (query, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tasks.shutdown().await;
                    return Err(AgentError::orchestration(format!(
                        "retrieval task panicked: {e}"
                    )));
                }
            };
            match result {
                Ok(docs) => {
                    let found = docs.len();
                    let added = state.documents.merge(DocumentUpdate::documents(docs));
                    debug!(query = %query, found, added, "retrieval task merged");
                }
                Err(e) => {
                    failed += 1;
                    match self.policy {
                        FanOutPolicy::FailFast => {
                            let cancelled = tasks.len();
                            tasks.shutdown().await;
                            warn!(
                                query = %query,
                                error = %e,
                                cancelled,
                                "retrieval task failed, cancelled remaining tasks"
                            );
                            return Err(AgentError::FanOut {
                                failed,
                                total,
                                first: e.to_string(),
                            });
                        }
                        FanOutPolicy::BestEffort => {
                            warn!(query = %query, error = %e, "retrieval task failed, skipping");
                            first_error.get_or_insert_with(|| e.to_string());
                            state.failed_queries.push(query);
                        }
                    }
                }
            }
        }

        if total > 0 && failed == total {
            return Err(AgentError::FanOut {
                failed,
                total,
                first: first_error.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Researcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Researcher")
            .field("retrievers", &self.retrievers.name())
            .field("search", &self.search)
            .field("max_concurrency", &self.max_concurrency)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Searches every collection for `query`, concatenating results in
/// collection order.
///
/// # Errors
///
/// Returns the first acquisition or search error. The retriever acquired
/// for the failing collection is still released.
pub async fn retrieve_documents(
    retrievers: &dyn RetrieverProvider,
    query: &str,
    collections: &[String],
    options: &SearchOptions,
) -> Result<Vec<Document>, AgentError> {
    let mut documents = Vec::new();
    for collection in collections {
        let retriever = retrievers.acquire(collection).await?;
        let found = retriever.search(query, options).await;
        drop(retriever);
        documents.extend(found?);
    }
    Ok(documents)
}
