//! JUnit XML persistence for completed runs.

use std::path::Path;

use indexmap::IndexMap;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};

use crate::{
    error::PersistError,
    models::{ResultKind, RunSummary, TestOutcome},
};

const REPORT_NAME: &str = "runway";

/// Replace the file at `path` with a JUnit document for `results`.
pub fn write_results(
    path: &Path,
    results: &[TestOutcome],
    captured: &IndexMap<String, String>,
) -> Result<(), PersistError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| PersistError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let report = build_report(results, captured);
    atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
        .write(|file| report.serialize(file))
        .map_err(|source| PersistError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(())
}

fn build_report(results: &[TestOutcome], captured: &IndexMap<String, String>) -> Report {
    let mut suites: IndexMap<&str, TestSuite> = IndexMap::new();
    for outcome in results {
        let mut testcase = TestCase::new(outcome.method_name.clone(), status_for(outcome));
        testcase
            .set_classname(outcome.fixture_name.clone())
            .set_time(outcome.elapsed);
        if let Some(output) = captured.get(&outcome.full_name) {
            testcase.set_system_out(output);
        }

        suites
            .entry(outcome.fixture_name.as_str())
            .or_insert_with(|| TestSuite::new(outcome.fixture_name.clone()))
            .add_test_case(testcase);
    }

    let summary = RunSummary::from_outcomes(results);
    let mut report = Report::new(REPORT_NAME);
    report
        .set_timestamp(chrono::Local::now())
        .set_time(summary.elapsed)
        .add_test_suites(suites.into_values());
    report
}

fn status_for(outcome: &TestOutcome) -> TestCaseStatus {
    match outcome.kind {
        ResultKind::Success => TestCaseStatus::success(),
        ResultKind::Failure => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
            status.set_message(outcome.message.clone());
            status
        }
        ResultKind::Error => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
            status.set_message(outcome.message.clone());
            if let Some(trace) = &outcome.stack_trace {
                status.set_description(trace.clone());
            }
            status
        }
        ResultKind::NotRunnable => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
            status
                .set_message(outcome.message.clone())
                .set_type("invalid");
            status
        }
        ResultKind::Inconclusive | ResultKind::Ignored | ResultKind::Skipped => {
            let mut status = TestCaseStatus::skipped();
            status.set_message(outcome.message.clone());
            status
        }
    }
}
