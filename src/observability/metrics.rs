//! # Metrics
//!
//! Prometheus metrics for monitoring the platform backend.
//!
//! ## Metrics Exposed
//!
//! - `harmonix_git_operations_total` - Git provider operations by provider and operation
//! - `harmonix_git_operation_errors_total` - Failed git provider operations
//! - `harmonix_git_operation_duration_seconds` - Duration of git provider operations
//! - `harmonix_aws_operations_total` - AWS SDK calls by service and operation
//! - `harmonix_aws_operation_errors_total` - Failed AWS SDK calls
//! - `harmonix_aws_operation_duration_seconds` - Duration of AWS SDK calls
//! - `harmonix_workflow_runs_total` - Platform workflow runs by workflow and status
//! - `harmonix_workflow_duration_seconds` - Duration of platform workflows
//! - `harmonix_audit_write_errors_total` - Audit records that could not be written
//! - `harmonix_action_executions_total` - Scaffolder action executions by outcome
//! - `harmonix_catalog_relations_emitted_total` - Relations emitted by catalog processors

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static GIT_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harmonix_git_operations_total",
            "Total number of git provider operations",
        ),
        &["provider", "operation"],
    )
    .expect("Failed to create GIT_OPERATIONS_TOTAL metric - this should never happen")
});

static GIT_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harmonix_git_operation_errors_total",
            "Total number of failed git provider operations",
        ),
        &["provider", "operation"],
    )
    .expect("Failed to create GIT_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static GIT_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "harmonix_git_operation_duration_seconds",
            "Duration of git provider operations in seconds",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["provider"],
    )
    .expect("Failed to create GIT_OPERATION_DURATION metric - this should never happen")
});

static AWS_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harmonix_aws_operations_total",
            "Total number of AWS SDK calls",
        ),
        &["service", "operation"],
    )
    .expect("Failed to create AWS_OPERATIONS_TOTAL metric - this should never happen")
});

static AWS_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harmonix_aws_operation_errors_total",
            "Total number of failed AWS SDK calls",
        ),
        &["service", "operation"],
    )
    .expect("Failed to create AWS_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static AWS_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "harmonix_aws_operation_duration_seconds",
            "Duration of AWS SDK calls in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        &["service"],
    )
    .expect("Failed to create AWS_OPERATION_DURATION metric - this should never happen")
});

static WORKFLOW_RUNS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harmonix_workflow_runs_total",
            "Total number of platform workflow runs",
        ),
        &["workflow", "status"],
    )
    .expect("Failed to create WORKFLOW_RUNS_TOTAL metric - this should never happen")
});

static WORKFLOW_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "harmonix_workflow_duration_seconds",
            "Duration of platform workflows in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["workflow"],
    )
    .expect("Failed to create WORKFLOW_DURATION metric - this should never happen")
});

static AUDIT_WRITE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "harmonix_audit_write_errors_total",
        "Total number of audit records that could not be written",
    )
    .expect("Failed to create AUDIT_WRITE_ERRORS_TOTAL metric - this should never happen")
});

static ACTION_EXECUTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harmonix_action_executions_total",
            "Total number of scaffolder action executions",
        ),
        &["action", "outcome"],
    )
    .expect("Failed to create ACTION_EXECUTIONS_TOTAL metric - this should never happen")
});

static CATALOG_RELATIONS_EMITTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harmonix_catalog_relations_emitted_total",
            "Total number of relations emitted by catalog processors",
        ),
        &["processor", "relation"],
    )
    .expect("Failed to create CATALOG_RELATIONS_EMITTED_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(GIT_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GIT_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GIT_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(AWS_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(AWS_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(AWS_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(WORKFLOW_RUNS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WORKFLOW_DURATION.clone()))?;
    REGISTRY.register(Box::new(AUDIT_WRITE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACTION_EXECUTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CATALOG_RELATIONS_EMITTED_TOTAL.clone()))?;

    Ok(())
}

pub fn record_git_operation(provider: &str, operation: &str, duration: f64) {
    GIT_OPERATIONS_TOTAL
        .with_label_values(&[provider, operation])
        .inc();
    GIT_OPERATION_DURATION
        .with_label_values(&[provider])
        .observe(duration);
}

pub fn increment_git_operation_errors(provider: &str, operation: &str) {
    GIT_OPERATION_ERRORS_TOTAL
        .with_label_values(&[provider, operation])
        .inc();
}

pub fn record_aws_operation(service: &str, operation: &str, duration: f64) {
    AWS_OPERATIONS_TOTAL
        .with_label_values(&[service, operation])
        .inc();
    AWS_OPERATION_DURATION
        .with_label_values(&[service])
        .observe(duration);
}

pub fn increment_aws_operation_errors(service: &str, operation: &str) {
    AWS_OPERATION_ERRORS_TOTAL
        .with_label_values(&[service, operation])
        .inc();
}

pub fn record_workflow(workflow: &str, status: &str, duration: f64) {
    WORKFLOW_RUNS_TOTAL
        .with_label_values(&[workflow, status])
        .inc();
    WORKFLOW_DURATION
        .with_label_values(&[workflow])
        .observe(duration);
}

pub fn increment_audit_write_errors() {
    AUDIT_WRITE_ERRORS_TOTAL.inc();
}

pub fn record_action_execution(action: &str, outcome: &str) {
    ACTION_EXECUTIONS_TOTAL
        .with_label_values(&[action, outcome])
        .inc();
}

pub fn increment_relations_emitted(processor: &str, relation: &str) {
    CATALOG_RELATIONS_EMITTED_TOTAL
        .with_label_values(&[processor, relation])
        .inc();
}
