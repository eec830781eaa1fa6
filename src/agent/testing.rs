//! Test doubles for the LLM boundary.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Provider that replays canned replies and records every request.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| Err("no scripted reply left".to_string()));

        next.map(|content| ChatResponse {
            content,
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
        .map_err(|message| AgentError::ApiRequest {
            message,
            status: None,
        })
    }
}

/// Doubles for the leaf capabilities and the retrieval backend.
pub mod fakes {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::agent::capability::{
        Capabilities, PlanBuilder, QueryClassifier, QueryGenerator, ResponseSynthesizer,
    };
    use crate::agent::message::ChatMessage;
    use crate::agent::router::{Category, RouterResult};
    use crate::core::{Document, Metadata};
    use crate::error::AgentError;
    use crate::retrieval::{Retriever, RetrieverProvider, ScopedRetriever, SearchOptions};

    pub fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    pub fn doc(id: &str) -> Document {
        let metadata: Metadata = json!({
            "source": format!("https://docs.example.com/{id}"),
            "title": id,
        })
        .as_object()
        .cloned()
        .unwrap_or_default();
        Document::with_id(id, format!("content of {id}"), metadata)
    }

    pub struct FakeClassifier {
        pub result: RouterResult,
        pub calls: AtomicUsize,
        pub seen_collections: Mutex<Vec<String>>,
    }

    impl FakeClassifier {
        pub fn new(category: Category, collections: &[&str], response: Option<&str>) -> Self {
            Self {
                result: RouterResult {
                    category,
                    logic: format!("classified as {category}"),
                    collections: strings(collections),
                    response: response.map(ToString::to_string),
                },
                calls: AtomicUsize::new(0),
                seen_collections: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QueryClassifier for FakeClassifier {
        async fn classify(
            &self,
            _messages: &[ChatMessage],
            collections: &[String],
        ) -> Result<RouterResult, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen_collections.lock() {
                *seen = collections.to_vec();
            }
            Ok(self.result.clone())
        }
    }

    pub struct FakePlanner {
        pub steps: Vec<String>,
        pub calls: AtomicUsize,
    }

    impl FakePlanner {
        pub fn new(steps: &[&str]) -> Self {
            Self {
                steps: strings(steps),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PlanBuilder for FakePlanner {
        async fn plan(&self, _messages: &[ChatMessage]) -> Result<Vec<String>, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.steps.clone())
        }
    }

    /// Generates `count` queries named `<step> q<n>`.
    pub struct FakeQueryGenerator {
        pub count: usize,
        pub calls: AtomicUsize,
    }

    impl FakeQueryGenerator {
        pub const fn new(count: usize) -> Self {
            Self {
                count,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QueryGenerator for FakeQueryGenerator {
        async fn generate(
            &self,
            step: &str,
            _collections: &[String],
        ) -> Result<Vec<String>, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((1..=self.count).map(|n| format!("{step} q{n}")).collect())
        }
    }

    pub struct FakeSynthesizer {
        pub answer: String,
        pub calls: AtomicUsize,
        pub context: Mutex<String>,
    }

    impl FakeSynthesizer {
        pub fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                calls: AtomicUsize::new(0),
                context: Mutex::new(String::new()),
            }
        }

        pub fn context(&self) -> String {
            self.context.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ResponseSynthesizer for FakeSynthesizer {
        async fn respond(
            &self,
            _messages: &[ChatMessage],
            context: &str,
            _collections: &[String],
        ) -> Result<String, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut c) = self.context.lock() {
                *c = context.to_string();
            }
            Ok(self.answer.clone())
        }
    }

    /// Retrieval backend returning synthetic documents.
    ///
    /// Each search returns `per_search` documents with ids
    /// `<collection>/<query>/<n>`, or a single document with `shared_id`
    /// when set. Searches for `fail_query` fail at once; the others wait
    /// `delay` first.
    #[derive(Default)]
    pub struct FakeRetrievers {
        pub collections: Vec<String>,
        pub per_search: usize,
        pub shared_id: Option<String>,
        pub fail_query: Option<String>,
        pub delay: Duration,
        pub acquired: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
        pub in_flight: Arc<AtomicUsize>,
        pub max_in_flight: Arc<AtomicUsize>,
    }

    impl FakeRetrievers {
        pub fn new(collections: &[&str], per_search: usize) -> Self {
            Self {
                collections: strings(collections),
                per_search,
                ..Self::default()
            }
        }

        pub fn acquired(&self) -> usize {
            self.acquired.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    struct FakeRetriever {
        collection: String,
        per_search: usize,
        shared_id: Option<String>,
        fail_query: Option<String>,
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn search(
            &self,
            query: &str,
            _options: &SearchOptions,
        ) -> Result<Vec<Document>, AgentError> {
            if self.fail_query.as_deref() == Some(query) {
                return Err(AgentError::Retrieval {
                    collection: self.collection.clone(),
                    message: format!("backend down for '{query}'"),
                });
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Some(id) = &self.shared_id {
                return Ok(vec![doc(id)]);
            }
            Ok((0..self.per_search)
                .map(|n| doc(&format!("{}/{query}/{n}", self.collection)))
                .collect())
        }
    }

    #[async_trait]
    impl RetrieverProvider for FakeRetrievers {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn acquire(&self, collection: &str) -> Result<ScopedRetriever, AgentError> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            let released = Arc::clone(&self.released);
            let retriever = FakeRetriever {
                collection: collection.to_string(),
                per_search: self.per_search,
                shared_id: self.shared_id.clone(),
                fail_query: self.fail_query.clone(),
                delay: self.delay,
                in_flight: Arc::clone(&self.in_flight),
                max_in_flight: Arc::clone(&self.max_in_flight),
            };
            Ok(
                ScopedRetriever::new(collection, Box::new(retriever)).on_release(move || {
                    released.fetch_add(1, Ordering::SeqCst);
                }),
            )
        }

        async fn list_collections(&self) -> Result<Vec<String>, AgentError> {
            Ok(self.collections.clone())
        }
    }

    pub struct FakeCapabilities {
        pub classifier: Arc<FakeClassifier>,
        pub planner: Arc<FakePlanner>,
        pub query_generator: Arc<FakeQueryGenerator>,
        pub synthesizer: Arc<FakeSynthesizer>,
    }

    impl FakeCapabilities {
        pub fn new(classifier: FakeClassifier, planner: FakePlanner, queries: usize) -> Self {
            Self {
                classifier: Arc::new(classifier),
                planner: Arc::new(planner),
                query_generator: Arc::new(FakeQueryGenerator::new(queries)),
                synthesizer: Arc::new(FakeSynthesizer::new("Use the installer [1].")),
            }
        }

        pub fn capabilities(&self) -> Capabilities {
            Capabilities {
                classifier: self.classifier.clone(),
                planner: self.planner.clone(),
                query_generator: self.query_generator.clone(),
                synthesizer: self.synthesizer.clone(),
            }
        }
    }
}
