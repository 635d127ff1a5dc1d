//! Shared test doubles for workflow integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use docanalyst_core::prelude::*;
use docanalyst_integrations::mongo::MongoShellDialect;
use docanalyst_workflow::prelude::Orchestrator;

mock! {
    pub Executor {}

    #[async_trait]
    impl QueryExecutor for Executor {
        async fn execute(&self, query: &CandidateQuery) -> Result<ResultSet>;
    }
}

mock! {
    pub Schema {}

    #[async_trait]
    impl SchemaProvider for Schema {
        async fn schema(&self) -> Result<SchemaSnapshot>;
    }
}

impl std::fmt::Debug for MockExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockExecutor")
    }
}

impl std::fmt::Debug for MockSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockSchema")
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Oracle that answers from per-purpose scripts.
///
/// Each purpose has a queue of replies; the last one repeats once the queue
/// is down to it.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<PromptPurpose, VecDeque<Reply>>>,
    prompts: Mutex<Vec<Prompt>>,
    cancel_on: Mutex<Option<(PromptPurpose, CancellationToken)>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, purpose: PromptPurpose, replies: &[&str]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(purpose)
            .or_default()
            .extend(replies.iter().map(|r| Reply::Text((*r).to_string())));
        self
    }

    pub fn fail(self, purpose: PromptPurpose, message: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(purpose)
            .or_default()
            .push_back(Reply::Fail(message.to_string()));
        self
    }

    /// Cancel `token` while answering the first prompt with `purpose`.
    pub fn cancel_on(self, purpose: PromptPurpose, token: CancellationToken) -> Self {
        *self.cancel_on.lock().unwrap() = Some((purpose, token));
        self
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn calls_for(&self, purpose: PromptPurpose) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.purpose == purpose)
            .count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedOracle {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());

        if let Some((purpose, token)) = self.cancel_on.lock().unwrap().as_ref() {
            if *purpose == prompt.purpose {
                token.cancel();
            }
        }

        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            let queue = scripts
                .get_mut(&prompt.purpose)
                .ok_or_else(|| AnalystError::oracle(format!("no script for {}", prompt.purpose)))?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(AnalystError::oracle(message)),
            None => Err(AnalystError::oracle("script exhausted")),
        }
    }
}

pub fn customers_schema() -> SchemaSnapshot {
    SchemaSnapshot::new()
        .with_database("shop")
        .with_collection("customers", ["name", "city"])
        .with_collection("products", ["sku", "price"])
}

pub fn static_schema(snapshot: SchemaSnapshot) -> MockSchema {
    let mut schema = MockSchema::new();
    schema
        .expect_schema()
        .returning(move || Ok(snapshot.clone()));
    schema
}

pub fn returning(results: ResultSet) -> MockExecutor {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .returning(move |_| Ok(results.clone()));
    executor
}

pub fn new_yorkers(n: usize) -> ResultSet {
    ResultSet::from_values((0..n).map(|i| json!({"name": format!("Customer {i}"), "city": "New York"})))
}

pub fn orchestrator(
    oracle: Arc<ScriptedOracle>,
    schema: MockSchema,
    executor: MockExecutor,
    config: WorkflowConfig,
) -> Orchestrator {
    Orchestrator::builder()
        .oracle(oracle)
        .dialect(Arc::new(MongoShellDialect::new()))
        .schema_provider(Arc::new(schema))
        .executor(Arc::new(executor))
        .config(config)
        .build()
        .unwrap()
}

pub fn fixed_config() -> WorkflowConfig {
    WorkflowConfig::new().with_reference_date(chrono::NaiveDate::from_ymd_opt(2024, 10, 24).unwrap())
}
