//! Demo jobs exercised by the `list`/`run` subcommands, ported from
//! `goflow`'s `example.go`. Re-expressed with this engine's operator types
//! rather than translated line for line; they exist to exercise every
//! mechanism named by the engine end to end, not as production jobs.

use std::sync::Arc;

use async_trait::async_trait;
use engine::{Dag, Job, JobFactory, RetryPolicy, Task, TriggerRule};
use operators::{command::Command, Operator, OperatorError};
use serde_json::{json, Value};

/// Adds two nonnegative numbers; fails fatally if either is negative.
/// Demonstrates a user-defined `Operator` alongside the built-in `Command`.
struct PositiveAddition {
    a: i64,
    b: i64,
}

#[async_trait]
impl Operator for PositiveAddition {
    async fn run(&self) -> Result<Value, OperatorError> {
        if self.a < 0 || self.b < 0 {
            return Err(OperatorError::Fatal("can't add negative numbers".into()));
        }
        Ok(json!(self.a + self.b))
    }
}

/// Mixes nine tasks, both retry policies, and both trigger rules to exercise
/// the DAG gating logic end to end.
pub fn complex_analytics_job() -> Job {
    let mut dag = Dag::new();
    for name in [
        "sleep-one",
        "add-one-one",
        "sleep-two",
        "add-two-four",
        "add-three-four",
        "whoops-with-constant-delay",
        "whoops-with-exponential-backoff",
        "totally-skippable",
        "clean-up",
    ] {
        dag.add_node(name).unwrap();
    }
    dag.set_downstream("sleep-one", "add-one-one").unwrap();
    dag.set_downstream("add-one-one", "sleep-two").unwrap();
    dag.set_downstream("sleep-two", "add-two-four").unwrap();
    dag.set_downstream("add-one-one", "add-three-four").unwrap();
    dag.set_downstream("sleep-one", "whoops-with-constant-delay").unwrap();
    dag.set_downstream("sleep-one", "whoops-with-exponential-backoff").unwrap();
    dag.set_downstream("whoops-with-constant-delay", "totally-skippable").unwrap();
    dag.set_downstream("whoops-with-exponential-backoff", "totally-skippable").unwrap();
    dag.set_downstream("totally-skippable", "clean-up").unwrap();

    let tasks = vec![
        Task::new("sleep-one", Arc::new(Command::new("sleep", vec!["1".into()]))),
        Task::new(
            "add-one-one",
            Arc::new(Command::new("sh", vec!["-c".into(), "echo $((1 + 1))".into()])),
        ),
        Task::new("sleep-two", Arc::new(Command::new("sleep", vec!["2".into()]))),
        Task::new(
            "add-two-four",
            Arc::new(Command::new("sh", vec!["-c".into(), "echo $((2 + 4))".into()])),
        ),
        Task::new(
            "add-three-four",
            Arc::new(Command::new("sh", vec!["-c".into(), "echo $((3 + 4))".into()])),
        ),
        Task::new(
            "whoops-with-constant-delay",
            Arc::new(Command::new("whoops", vec![])),
        )
        .with_retries(5, RetryPolicy::ConstantDelay { period_seconds: 1 }),
        Task::new(
            "whoops-with-exponential-backoff",
            Arc::new(Command::new("whoops", vec![])),
        )
        .with_retries(1, RetryPolicy::ExponentialBackoff),
        Task::new(
            "totally-skippable",
            Arc::new(Command::new(
                "sh",
                vec!["-c".into(), "echo 'everything succeeded'".into()],
            )),
        )
        .with_trigger_rule(TriggerRule::AllSuccessful),
        Task::new(
            "clean-up",
            Arc::new(Command::new("sh", vec!["-c".into(), "echo 'cleaning up now'".into()])),
        )
        .with_trigger_rule(TriggerRule::AllDone),
    ];

    Job::new("example-complex-analytics", "* * * * * *", false, tasks, dag).unwrap()
}

/// Two-task job pairing a user-defined operator with a deliberately flaky
/// one, demonstrating that any type satisfying `Operator` can be scheduled.
pub fn custom_operator_job() -> Job {
    let mut dag = Dag::new();
    dag.add_node("positive-addition").unwrap();
    dag.add_node("random-failure").unwrap();
    dag.set_downstream("positive-addition", "random-failure").unwrap();

    let tasks = vec![
        Task::new("positive-addition", Arc::new(PositiveAddition { a: 5, b: 6 })),
        Task::new(
            "random-failure",
            Arc::new(operators::mock::MockOperator::flaky("random-failure", 2, json!("lucky"))),
        )
        .with_retries(3, RetryPolicy::ConstantDelay { period_seconds: 1 }),
    ];

    Job::new("example-custom-operator", "* * * * * *", true, tasks, dag).unwrap()
}

pub fn factories() -> Vec<(&'static str, JobFactory)> {
    vec![
        ("example-complex-analytics", Arc::new(complex_analytics_job)),
        ("example-custom-operator", Arc::new(custom_operator_job)),
    ]
}
