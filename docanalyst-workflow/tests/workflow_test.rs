//! End-to-end runs of the workflow against scripted collaborators.

mod common;

use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use common::{
    MockExecutor, MockSchema, ScriptedOracle, customers_schema, fixed_config, new_yorkers,
    orchestrator, returning, static_schema,
};
use docanalyst_workflow::prelude::*;

use docanalyst_core::PromptPurpose::{
    EmptySummarization, QueryGeneration, QueryIntent, SummaryGrounding, Summarization,
};

#[tokio::test]
async fn test_new_york_customers_end_to_end() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(
                QueryGeneration,
                &[
                    "db.customers.countDocuments({location: 'New York'})",
                    "```javascript\ndb.customers.find({city: 'New York'})\n```",
                ],
            )
            .script(QueryIntent, &["VALID"])
            .script(Summarization, &["There are 12 customers in New York."])
            .script(SummaryGrounding, &["VALID"]),
    );
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(SchemaSnapshot::new().with_collection("customers", ["name", "city"])),
        returning(new_yorkers(12)),
        fixed_config(),
    );

    let run = orchestrator
        .run("How many customers are in New York?")
        .await
        .unwrap();

    let TerminalOutcome::Answered(answer) = &run.outcome else {
        panic!("expected a clean answer, got {:?}", run.outcome);
    };
    assert_eq!(answer.summary, "There are 12 customers in New York.");
    assert_eq!(answer.query.text, "db.customers.find({city: 'New York'})");
    assert_eq!(answer.result_set.len(), 12);
    assert_eq!(run.state.query_retry_count, 1);
    assert_eq!(run.state.summary_retry_count, 0);
    assert_eq!(
        run.trace,
        vec![
            Stage::Start,
            Stage::ValidatingInput,
            Stage::GeneratingQuery,
            Stage::ValidatingQuery,
            Stage::RetryQuery,
            Stage::GeneratingQuery,
            Stage::ValidatingQuery,
            Stage::ExecutingQuery,
            Stage::GeneratingSummary,
            Stage::ValidatingSummary,
            Stage::Done,
            Stage::End,
        ]
    );

    // the schema check short-circuits the first intent call
    assert_eq!(oracle.calls_for(QueryIntent), 1);
    assert_eq!(oracle.calls(), 5);

    let retry_prompt = &oracle.prompts()[1];
    assert_eq!(retry_prompt.purpose, QueryGeneration);
    assert!(retry_prompt.user.contains("field 'location' not in schema"));
    assert!(retry_prompt.user.contains("db.customers.countDocuments({location: 'New York'})"));
}

#[tokio::test]
async fn test_valid_first_attempt_keeps_counter_at_zero() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'New York'})"])
            .script(QueryIntent, &["VALID"])
            .script(Summarization, &["Customer 0 and Customer 1 live in New York."])
            .script(SummaryGrounding, &["VALID"]),
    );
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(2)),
        fixed_config(),
    );

    let run = orchestrator.run("Who lives in New York?").await.unwrap();
    assert!(matches!(run.outcome, TerminalOutcome::Answered(_)));
    assert_eq!(run.state.query_retry_count, 0);
    assert_eq!(oracle.calls_for(QueryGeneration), 1);
}

#[tokio::test]
async fn test_query_retries_are_bounded_and_degrade() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'Boston'})"])
            .script(QueryIntent, &["INVALID: filters on the wrong city"])
            .script(Summarization, &["Nobody from New York was found among 3 customers."])
            .script(SummaryGrounding, &["VALID"]),
    );
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(3)),
        fixed_config(),
    );

    let run = orchestrator.run("Who lives in New York?").await.unwrap();

    assert_eq!(run.state.query_retry_count, 3);
    assert_eq!(oracle.calls_for(QueryGeneration), 4);
    assert_eq!(oracle.calls_for(QueryIntent), 4);
    assert!(run.trace.contains(&Stage::ExecutingQuery));

    let TerminalOutcome::AnsweredWithWarning { answer, warnings } = &run.outcome else {
        panic!("expected a flagged answer, got {:?}", run.outcome);
    };
    assert!(!answer.query.is_blank());
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].stage, ValidationLoop::Query);
    assert_eq!(warnings[0].retries, 3);
    assert_eq!(warnings[0].reasons, vec!["filters on the wrong city".to_string()]);

    let metrics = orchestrator.metrics();
    assert_eq!(metrics.query_retries, 3);
    assert_eq!(metrics.query_hallucinations, 4);
    assert_eq!(metrics.answered_with_warning, 1);
}

#[tokio::test]
async fn test_unknown_collection_is_named_without_intent_call() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.orders.find({})"])
            .script(Summarization, &["There are 2 orders."])
            .script(SummaryGrounding, &["VALID"]),
    );
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(2)),
        fixed_config(),
    );

    let run = orchestrator.run("How many orders were placed?").await.unwrap();

    assert_eq!(oracle.calls_for(QueryIntent), 0);
    let TerminalOutcome::AnsweredWithWarning { warnings, .. } = &run.outcome else {
        panic!("expected a flagged answer, got {:?}", run.outcome);
    };
    assert_eq!(
        warnings[0].reasons,
        vec!["collection 'orders' not in schema".to_string()]
    );
}

#[tokio::test]
async fn test_wrong_count_is_rejected_and_paraphrase_accepted() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'New York'})"])
            .script(QueryIntent, &["VALID"])
            .script(
                Summarization,
                &[
                    "There are 42 customers in New York.",
                    "There are seven customers in New York.",
                ],
            )
            .script(SummaryGrounding, &["VALID"]),
    );
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(7)),
        fixed_config(),
    );

    let run = orchestrator
        .run("How many customers are in New York?")
        .await
        .unwrap();

    let TerminalOutcome::Answered(answer) = &run.outcome else {
        panic!("expected a clean answer, got {:?}", run.outcome);
    };
    assert_eq!(answer.summary, "There are seven customers in New York.");
    assert_eq!(run.state.summary_retry_count, 1);
    // the wrong count never reaches the fact-checking oracle
    assert_eq!(oracle.calls_for(SummaryGrounding), 1);

    let retry_prompt = oracle
        .prompts()
        .into_iter()
        .filter(|p| p.purpose == Summarization)
        .nth(1)
        .unwrap();
    assert!(retry_prompt.user.contains("the count 42 customers does not match the 7 result(s)"));
}

#[tokio::test]
async fn test_derived_figures_reach_the_fact_check() {
    let summary = "There are 4 customers in New York, 100 percent of those returned, \
                   roughly 0.4 dozen.";
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'New York'})"])
            .script(QueryIntent, &["VALID"])
            .script(Summarization, &[summary])
            .script(SummaryGrounding, &["VALID"]),
    );
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(4)),
        fixed_config(),
    );

    let run = orchestrator
        .run("How many customers are in New York?")
        .await
        .unwrap();

    let TerminalOutcome::Answered(answer) = &run.outcome else {
        panic!("expected a clean answer, got {:?}", run.outcome);
    };
    assert_eq!(answer.summary, summary);
    assert_eq!(run.state.summary_retry_count, 0);
    assert_eq!(oracle.calls_for(SummaryGrounding), 1);
}

#[tokio::test]
async fn test_summary_retries_are_bounded() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'New York'})"])
            .script(QueryIntent, &["VALID"])
            .script(Summarization, &["Most customers are loyal."])
            .script(SummaryGrounding, &["INVALID: loyalty is not in the data"]),
    );
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(4)),
        fixed_config(),
    );

    let run = orchestrator.run("Are New York customers loyal?").await.unwrap();

    assert_eq!(run.state.summary_retry_count, 3);
    assert_eq!(run.state.query_retry_count, 0);
    assert_eq!(oracle.calls_for(Summarization), 4);
    let TerminalOutcome::AnsweredWithWarning { warnings, .. } = &run.outcome else {
        panic!("expected a flagged answer, got {:?}", run.outcome);
    };
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].stage, ValidationLoop::Summary);
}

#[tokio::test]
async fn test_execution_error_fails_without_retry() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'New York'})"])
            .script(QueryIntent, &["VALID"]),
    );
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .times(1)
        .returning(|_| Err(AnalystError::execution("unknown operator: $foo")));
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        executor,
        fixed_config(),
    );

    let run = orchestrator.run("Who lives in New York?").await.unwrap();

    assert_eq!(
        run.outcome,
        TerminalOutcome::Failed {
            stage: Stage::ExecutingQuery,
            cause: FailureCause::Execution("unknown operator: $foo".into()),
        }
    );
    assert_eq!(oracle.calls_for(QueryGeneration), 1);
    assert_eq!(oracle.calls_for(Summarization), 0);
}

#[tokio::test]
async fn test_oracle_failure_during_validation_is_fatal() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'New York'})"])
            .fail(QueryIntent, "HTTP 401"),
    );
    let mut executor = MockExecutor::new();
    executor.expect_execute().never();
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        executor,
        fixed_config(),
    );

    let run = orchestrator.run("Who lives in New York?").await.unwrap();

    let TerminalOutcome::Failed { stage, cause } = &run.outcome else {
        panic!("expected a failure, got {:?}", run.outcome);
    };
    assert_eq!(*stage, Stage::ValidatingQuery);
    assert_eq!(cause.kind(), "oracle");
}

#[tokio::test]
async fn test_rejected_question_calls_nothing() {
    let oracle = Arc::new(ScriptedOracle::new());
    let mut schema = MockSchema::new();
    schema.expect_schema().never();
    let mut executor = MockExecutor::new();
    executor.expect_execute().never();
    let orchestrator = orchestrator(Arc::clone(&oracle), schema, executor, fixed_config());

    let run = orchestrator
        .run("db.dropDatabase() please")
        .await
        .unwrap();

    assert!(matches!(
        run.outcome,
        TerminalOutcome::Failed {
            stage: Stage::ValidatingInput,
            cause: FailureCause::InvalidInput(_),
        }
    ));
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_unreachable_store_fails_at_input() {
    let oracle = Arc::new(ScriptedOracle::new());
    let mut schema = MockSchema::new();
    schema
        .expect_schema()
        .times(1)
        .returning(|| Err(AnalystError::connectivity("connection refused")));
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        schema,
        MockExecutor::new(),
        fixed_config(),
    );

    let run = orchestrator.run("Who lives in New York?").await.unwrap();

    assert_eq!(
        run.outcome,
        TerminalOutcome::Failed {
            stage: Stage::ValidatingInput,
            cause: FailureCause::Connectivity("connection refused".into()),
        }
    );
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_blank_generations_fail_after_exhaustion() {
    let oracle = Arc::new(ScriptedOracle::new().script(QueryGeneration, &["```\n```"]));
    let mut executor = MockExecutor::new();
    executor.expect_execute().never();
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        executor,
        fixed_config(),
    );

    let run = orchestrator.run("Who lives in New York?").await.unwrap();

    let TerminalOutcome::Failed { stage, cause } = &run.outcome else {
        panic!("expected a failure, got {:?}", run.outcome);
    };
    assert_eq!(*stage, Stage::ValidatingQuery);
    assert_eq!(cause.kind(), "nothing_generated");
    assert_eq!(oracle.calls_for(QueryGeneration), 4);
    assert_eq!(oracle.calls_for(QueryIntent), 0);
}

#[tokio::test]
async fn test_empty_results_use_empty_summary_prompt() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'Atlantis'})"])
            .script(QueryIntent, &["VALID"])
            .script(EmptySummarization, &["No customers live in Atlantis."])
            .script(SummaryGrounding, &["VALID"]),
    );
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        returning(ResultSet::new()),
        fixed_config(),
    );

    let run = orchestrator.run("Who lives in Atlantis?").await.unwrap();

    assert!(matches!(run.outcome, TerminalOutcome::Answered(_)));
    assert_eq!(oracle.calls_for(EmptySummarization), 1);
    assert_eq!(oracle.calls_for(Summarization), 0);
    assert!(run.report(50).contains("No documents found matching your query."));
}

#[tokio::test]
async fn test_cancellation_during_retry_stops_all_calls() {
    let token = CancellationToken::new();
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'Boston'})"])
            .script(QueryIntent, &["INVALID: wrong city"])
            .cancel_on(QueryIntent, token.clone()),
    );
    let mut executor = MockExecutor::new();
    executor.expect_execute().never();
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        executor,
        fixed_config(),
    );

    let run = orchestrator
        .run_with_cancellation("Who lives in New York?", token)
        .await
        .unwrap();

    assert_eq!(
        run.outcome,
        TerminalOutcome::Cancelled {
            stage: Stage::RetryQuery
        }
    );
    assert_eq!(oracle.calls(), 2);
    assert_eq!(run.trace.last(), Some(&Stage::End));
    assert_eq!(orchestrator.metrics().cancelled, 1);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let oracle = Arc::new(ScriptedOracle::new());
    let mut schema = MockSchema::new();
    schema.expect_schema().never();
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        schema,
        MockExecutor::new(),
        fixed_config(),
    );

    let run = orchestrator
        .run_with_cancellation("Who lives in New York?", token)
        .await
        .unwrap();

    assert_eq!(run.outcome, TerminalOutcome::Cancelled { stage: Stage::Start });
    assert_eq!(run.trace, vec![Stage::Start, Stage::End]);
}

fn scripted() -> Arc<ScriptedOracle> {
    Arc::new(
        ScriptedOracle::new()
            .script(
                QueryGeneration,
                &[
                    "db.customers.find({location: 'New York'})",
                    "db.customers.find({city: 'New York'})",
                ],
            )
            .script(QueryIntent, &["VALID"])
            .script(
                Summarization,
                &["There are 9 customers.", "There are 3 customers in New York."],
            )
            .script(SummaryGrounding, &["VALID"]),
    )
}

#[tokio::test]
async fn test_runs_are_reproducible() {
    let first_oracle = scripted();
    let second_oracle = scripted();

    let first = orchestrator(
        Arc::clone(&first_oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(3)),
        fixed_config(),
    )
    .run("How many customers are in New York?")
    .await
    .unwrap();
    let second = orchestrator(
        Arc::clone(&second_oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(3)),
        fixed_config(),
    )
    .run("How many customers are in New York?")
    .await
    .unwrap();

    assert_eq!(first.trace, second.trace);
    assert_eq!(first.outcome, second.outcome);
    assert_eq!(first_oracle.prompts(), second_oracle.prompts());
    assert_ne!(first.state.run_id, second.state.run_id);
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({city: 'New York'})"])
            .script(QueryIntent, &["VALID"])
            .script(Summarization, &["There are 5 customers in New York."])
            .script(SummaryGrounding, &["VALID"]),
    );
    let orchestrator = Arc::new(orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(5)),
        fixed_config(),
    ));

    let runs = futures::future::join_all((0..8).map(|i| {
        let orchestrator = Arc::clone(&orchestrator);
        async move {
            orchestrator
                .run(&format!("How many customers are in New York? ({i})"))
                .await
        }
    }))
    .await;

    assert_eq!(runs.len(), 8);
    for run in runs {
        let run = run.unwrap();
        assert!(matches!(run.outcome, TerminalOutcome::Answered(_)));
        assert_eq!(run.state.query_retry_count, 0);
    }
    let metrics = orchestrator.metrics();
    assert_eq!(metrics.runs_started, 8);
    assert_eq!(metrics.answered, 8);
    assert_eq!(metrics.oracle_calls, 32);
}

#[tokio::test]
async fn test_report_lists_warnings() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .script(QueryGeneration, &["db.customers.find({})"])
            .script(QueryIntent, &["INVALID: does not filter by city"])
            .script(Summarization, &["There are 2 customers."])
            .script(SummaryGrounding, &["VALID"]),
    );
    let orchestrator = orchestrator(
        Arc::clone(&oracle),
        static_schema(customers_schema()),
        returning(new_yorkers(2)),
        fixed_config().with_max_query_retries(0),
    );

    let run = orchestrator.run("Who lives in New York?").await.unwrap();
    let report = run.report(50);

    assert!(report.starts_with("There are 2 customers."));
    assert!(report.contains("Warning: query could not be verified after 0 retries"));
    assert!(report.contains("QUERY RESULTS"));
}
