//! Wiring configuration into a ready orchestrator.

use std::sync::Arc;

use docanalyst_core::{
    AnalystConfig, AnalystError, LanguageModel, QueryDialect, QueryExecutor, Result,
    SchemaProvider,
};
use docanalyst_integrations::{
    CachedSchemaProvider, MongoShellDialect, RateLimitedOracle, RateLimiter, SiumaiOracle,
};
use docanalyst_workflow::{metrics::WorkflowMetrics, orchestrator::Orchestrator};
use tracing::info;

/// Builds an [`Orchestrator`] from an [`AnalystConfig`].
///
/// The store is reached only through the caller's [`QueryExecutor`] and
/// [`SchemaProvider`]. Everything else comes from configuration:
///
/// - the oracle is a [`SiumaiOracle`] for `config.llm`, wrapped in a
///   [`RateLimitedOracle`] when `config.rate_limit.enabled`
/// - the schema provider is wrapped in a [`CachedSchemaProvider`] living for
///   `config.store.effective_schema_ttl()`
/// - the dialect defaults to [`MongoShellDialect`]
///
/// # Examples
///
/// ```rust,no_run
/// use docanalyst::prelude::*;
/// use std::sync::Arc;
///
/// # fn example(executor: Arc<dyn QueryExecutor>, schema: Arc<dyn SchemaProvider>) -> Result<()> {
/// let config = AnalystConfig::from_env()?;
/// let orchestrator = AnalystBuilder::new(config)
///     .executor(executor)
///     .schema_provider(schema)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AnalystBuilder {
    config: AnalystConfig,
    executor: Option<Arc<dyn QueryExecutor>>,
    schema_provider: Option<Arc<dyn SchemaProvider>>,
    oracle: Option<Arc<dyn LanguageModel>>,
    dialect: Option<Arc<dyn QueryDialect>>,
    metrics: Option<Arc<WorkflowMetrics>>,
}

impl AnalystBuilder {
    /// Start from a configuration.
    pub fn new(config: AnalystConfig) -> Self {
        Self {
            config,
            executor: None,
            schema_provider: None,
            oracle: None,
            dialect: None,
            metrics: None,
        }
    }

    /// Set the query executor.
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the schema provider. It is cached by the built orchestrator.
    #[must_use]
    pub fn schema_provider(mut self, provider: Arc<dyn SchemaProvider>) -> Self {
        self.schema_provider = Some(provider);
        self
    }

    /// Use this oracle instead of one built from `config.llm`.
    ///
    /// Rate limiting still applies when enabled.
    #[must_use]
    pub fn oracle(mut self, oracle: Arc<dyn LanguageModel>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Use a dialect other than the MongoDB shell.
    #[must_use]
    pub fn dialect(mut self, dialect: Arc<dyn QueryDialect>) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Share metrics with other orchestrators.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<WorkflowMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The configuration being built from.
    pub fn config(&self) -> &AnalystConfig {
        &self.config
    }

    /// Validate the configuration and assemble the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid configuration, an
    /// unsupported oracle provider, or a missing executor or schema provider.
    pub fn build(self) -> Result<Orchestrator> {
        let Self {
            config,
            executor,
            schema_provider,
            oracle,
            dialect,
            metrics,
        } = self;

        config.validate()?;

        let executor =
            executor.ok_or_else(|| AnalystError::configuration("Query executor is required"))?;
        let schema_provider = schema_provider
            .ok_or_else(|| AnalystError::configuration("Schema provider is required"))?;

        let oracle: Arc<dyn LanguageModel> = match oracle {
            Some(oracle) => oracle,
            None => Arc::new(SiumaiOracle::from_config(config.llm.clone())?),
        };
        let oracle: Arc<dyn LanguageModel> = if config.rate_limit.enabled {
            Arc::new(RateLimitedOracle::new(
                oracle,
                RateLimiter::from_config(&config.rate_limit),
            ))
        } else {
            oracle
        };

        let ttl = config.store.effective_schema_ttl();
        let schema_provider: Arc<dyn SchemaProvider> =
            Arc::new(CachedSchemaProvider::new(schema_provider, ttl));
        let dialect = dialect.unwrap_or_else(|| Arc::new(MongoShellDialect::new()));

        info!(
            provider = %config.llm.provider,
            model = %config.llm.model,
            database = %config.store.database,
            rate_limited = config.rate_limit.enabled,
            schema_ttl_secs = ttl.as_secs(),
            "Assembling analyst"
        );

        let mut builder = Orchestrator::builder()
            .oracle(oracle)
            .dialect(dialect)
            .schema_provider(schema_provider)
            .executor(executor)
            .config(config.workflow);
        if let Some(metrics) = metrics {
            builder = builder.metrics(metrics);
        }
        builder.build()
    }
}
