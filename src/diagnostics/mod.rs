//! Preflight diagnostics
//!
//! Optional checks run before (never as part of) an upload:
//!
//! 1. List buckets - do the credentials authenticate at all?
//! 2. Head bucket - does the target bucket exist and is it reachable?
//! 3. List objects - can the token read the bucket's contents?
//!
//! Steps run in order and stop at the first failure; later steps are
//! reported as skipped.

use crate::s3::{BucketInspector, ErrorKind, ObjectSummary};
use serde::Serialize;

pub mod url_probe;

pub use url_probe::{probe_url, ProbeVerdict, UrlProbe};

/// Outcome of one diagnostic step
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Passed { detail: String },
    Failed { error: String, kind: String },
    Skipped,
}

/// One diagnostic step and its outcome
#[derive(Debug, Clone, Serialize)]
pub struct CheckStep {
    pub name: &'static str,
    pub outcome: StepOutcome,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
}

impl CheckStep {
    fn passed(name: &'static str, detail: String) -> Self {
        Self {
            name,
            outcome: StepOutcome::Passed { detail },
            kind: None,
        }
    }

    fn failed(name: &'static str, error: &crate::s3::S3ClientError) -> Self {
        let kind = error.kind();
        Self {
            name,
            outcome: StepOutcome::Failed {
                error: error.to_string(),
                kind: kind.as_str().to_string(),
            },
            kind: Some(kind),
        }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            outcome: StepOutcome::Skipped,
            kind: None,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Passed { .. })
    }
}

/// Full preflight report
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub bucket: String,
    pub buckets: Vec<String>,
    pub objects: Vec<ObjectSummary>,
    pub steps: Vec<CheckStep>,
}

impl CheckReport {
    /// True when every step passed
    pub fn passed(&self) -> bool {
        self.steps.iter().all(CheckStep::is_passed)
    }

    /// The first failing step, if any
    pub fn first_failure(&self) -> Option<&CheckStep> {
        self.steps
            .iter()
            .find(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }
}

const STEP_LIST_BUCKETS: &str = "list_buckets";
const STEP_HEAD_BUCKET: &str = "head_bucket";
const STEP_LIST_OBJECTS: &str = "list_objects";

/// Run the credential and bucket checks against `inspector`
#[tracing::instrument(name = "diagnostics.preflight", skip(inspector))]
pub async fn run_preflight<I: BucketInspector + ?Sized>(
    inspector: &I,
    bucket: &str,
    max_keys: i32,
) -> CheckReport {
    let mut report = CheckReport {
        bucket: bucket.to_string(),
        buckets: Vec::new(),
        objects: Vec::new(),
        steps: Vec::with_capacity(3),
    };

    match inspector.list_buckets().await {
        Ok(buckets) => {
            report.steps.push(CheckStep::passed(
                STEP_LIST_BUCKETS,
                format!("found {} bucket(s)", buckets.len()),
            ));
            report.buckets = buckets;
        }
        Err(e) => {
            report.steps.push(CheckStep::failed(STEP_LIST_BUCKETS, &e));
            report.steps.push(CheckStep::skipped(STEP_HEAD_BUCKET));
            report.steps.push(CheckStep::skipped(STEP_LIST_OBJECTS));
            return report;
        }
    }

    if let Err(e) = inspector.head_bucket(bucket).await {
        report.steps.push(CheckStep::failed(STEP_HEAD_BUCKET, &e));
        report.steps.push(CheckStep::skipped(STEP_LIST_OBJECTS));
        return report;
    }
    report.steps.push(CheckStep::passed(
        STEP_HEAD_BUCKET,
        format!("bucket '{}' exists and is accessible", bucket),
    ));

    match inspector.list_objects(bucket, max_keys).await {
        Ok(objects) => {
            report.steps.push(CheckStep::passed(
                STEP_LIST_OBJECTS,
                format!("listed {} object(s)", objects.len()),
            ));
            report.objects = objects;
        }
        Err(e) => report.steps.push(CheckStep::failed(STEP_LIST_OBJECTS, &e)),
    }

    report
}
