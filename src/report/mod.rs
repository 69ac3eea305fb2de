//! Turns the ordered outcomes of a run into the report clients see.

pub mod junit;

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    app::Notice,
    models::{RunSummary, Severity, TestOutcome},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub id: String,
    pub name: String,
    pub fixture: String,
    pub description: String,
    pub message: String,
    pub status: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureGroup {
    pub name: String,
    pub tests: Vec<ReportEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub message: Notice,
    pub fixtures: Vec<FixtureGroup>,
    /// Fixtures with at least one failed or errored test, holding only those tests.
    pub errorlist: Vec<FixtureGroup>,
    /// Fixtures with at least one test that neither passed nor failed.
    pub ignoredlist: Vec<FixtureGroup>,
    pub textoutput: String,
    #[serde(skip)]
    pub summary: RunSummary,
}

impl RunReport {
    pub fn severity(&self) -> Severity {
        self.summary.severity()
    }
}

/// Build the report for `results`. `captured` maps a test's full name to the
/// text it wrote while running.
pub fn aggregate(results: &[TestOutcome], captured: &IndexMap<String, String>) -> RunReport {
    let summary = RunSummary::from_outcomes(results);
    let text = format!(
        "Passed {}, Failed {}, Errors {}, Inconclusive {}, \
         Invalid {}, Ignored {}, Skipped {}, Time {:.3}",
        summary.passed,
        summary.failed,
        summary.errors,
        summary.inconclusive,
        summary.invalid,
        summary.ignored,
        summary.skipped,
        summary.elapsed.as_secs_f64(),
    );

    let entries: Vec<ReportEntry> = results
        .iter()
        .map(|outcome| ReportEntry {
            id: outcome.test_id.clone(),
            name: outcome.method_name.clone(),
            fixture: outcome.fixture_name.clone(),
            description: outcome.description.clone(),
            message: outcome.display_message(),
            status: outcome.kind.severity(),
        })
        .collect();

    RunReport {
        message: Notice::new(text, summary.severity().into()),
        fixtures: group_by_fixture(entries.iter()),
        errorlist: group_by_fixture(entries.iter().filter(|e| e.status == Severity::Danger)),
        ignoredlist: group_by_fixture(entries.iter().filter(|e| e.status == Severity::Warning)),
        textoutput: text_output(results, captured),
        summary,
    }
}

fn group_by_fixture<'a>(entries: impl Iterator<Item = &'a ReportEntry>) -> Vec<FixtureGroup> {
    let mut groups: IndexMap<&str, Vec<ReportEntry>> = IndexMap::new();
    for entry in entries {
        groups
            .entry(entry.fixture.as_str())
            .or_default()
            .push(entry.clone());
    }
    groups
        .into_iter()
        .map(|(name, tests)| FixtureGroup {
            name: name.to_string(),
            tests,
        })
        .collect()
}

fn text_output(results: &[TestOutcome], captured: &IndexMap<String, String>) -> String {
    let mut seen = HashSet::new();
    let mut out = String::new();
    for outcome in results {
        if !seen.insert(outcome.full_name.as_str()) {
            continue;
        }
        let Some(text) = captured.get(&outcome.full_name) else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }
        out.push_str(&outcome.full_name);
        out.push('\n');
        out.push_str(text);
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::app::NoticeKind;
    use crate::models::ResultKind;

    fn outcome(fixture: &str, method: &str, kind: ResultKind) -> TestOutcome {
        TestOutcome {
            test_id: format!("{fixture}-{method}"),
            full_name: format!("{fixture}.{method}"),
            fixture_name: fixture.into(),
            method_name: method.into(),
            description: String::new(),
            kind,
            message: format!("{method} message"),
            stack_trace: Some("at somewhere".into()),
            elapsed: Duration::from_millis(250),
        }
    }

    fn group_names(groups: &[FixtureGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn mixed_run_is_danger() {
        let results = vec![
            outcome("A", "m1", ResultKind::Success),
            outcome("A", "m2", ResultKind::Failure),
            outcome("B", "m1", ResultKind::Ignored),
        ];
        let report = aggregate(&results, &IndexMap::new());

        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.ignored, 1);
        assert_eq!(report.message.status, NoticeKind::Danger);
        assert_eq!(
            report.message.text,
            "Passed 1, Failed 1, Errors 0, Inconclusive 0, \
             Invalid 0, Ignored 1, Skipped 0, Time 0.750"
        );
        assert_eq!(group_names(&report.fixtures), vec!["A", "B"]);
        assert_eq!(group_names(&report.errorlist), vec!["A"]);
        assert_eq!(report.errorlist[0].tests.len(), 1);
        assert_eq!(group_names(&report.ignoredlist), vec!["B"]);
    }

    #[test]
    fn all_passing_is_success() {
        let results = vec![outcome("A", "m1", ResultKind::Success)];
        let report = aggregate(&results, &IndexMap::new());
        assert_eq!(report.message.status, NoticeKind::Success);
        assert!(report.errorlist.is_empty());
        assert!(report.ignoredlist.is_empty());
    }

    #[test]
    fn only_warnings_is_warning() {
        let results = vec![
            outcome("A", "m1", ResultKind::Success),
            outcome("A", "m2", ResultKind::Inconclusive),
        ];
        assert_eq!(aggregate(&results, &IndexMap::new()).severity(), Severity::Warning);
    }

    #[test]
    fn error_entries_show_stack_trace() {
        let results = vec![
            outcome("A", "m1", ResultKind::Error),
            outcome("A", "m2", ResultKind::Failure),
        ];
        let report = aggregate(&results, &IndexMap::new());
        let tests = &report.fixtures[0].tests;
        assert_eq!(tests[0].message, "m1 message\nat somewhere");
        assert_eq!(tests[1].message, "m2 message");
        assert_eq!(tests[0].status, Severity::Danger);
    }

    #[test]
    fn fixtures_keep_first_seen_order() {
        let results = vec![
            outcome("B", "m1", ResultKind::Success),
            outcome("A", "m1", ResultKind::Success),
            outcome("B", "m2", ResultKind::Success),
        ];
        let report = aggregate(&results, &IndexMap::new());
        assert_eq!(group_names(&report.fixtures), vec!["B", "A"]);
        assert_eq!(report.fixtures[0].tests.len(), 2);
    }

    #[test]
    fn text_output_follows_arrival_order() {
        let results = vec![
            outcome("B", "m1", ResultKind::Success),
            outcome("A", "m1", ResultKind::Success),
            outcome("A", "m2", ResultKind::Success),
        ];
        let mut captured = IndexMap::new();
        captured.insert("A.m1".to_string(), "from a\n".to_string());
        captured.insert("B.m1".to_string(), "from b\n".to_string());
        captured.insert("A.m2".to_string(), "   \n".to_string());

        let report = aggregate(&results, &captured);
        assert_eq!(report.textoutput, "B.m1\nfrom b\n\nA.m1\nfrom a");
    }

    #[test]
    fn serializes_client_shape() {
        let results = vec![outcome("A", "m1", ResultKind::Skipped)];
        let json = serde_json::to_value(aggregate(&results, &IndexMap::new())).unwrap();
        assert_eq!(json["message"]["status"], "warning");
        assert_eq!(json["ignoredlist"][0]["name"], "A");
        let test = &json["fixtures"][0]["tests"][0];
        assert_eq!(test["id"], "A-m1");
        assert_eq!(test["name"], "m1");
        assert_eq!(test["fixture"], "A");
        assert_eq!(test["status"], "warning");
        assert!(json.get("summary").is_none());
    }

    fn any_kind() -> impl Strategy<Value = ResultKind> {
        prop_oneof![
            Just(ResultKind::Success),
            Just(ResultKind::Failure),
            Just(ResultKind::Error),
            Just(ResultKind::Inconclusive),
            Just(ResultKind::NotRunnable),
            Just(ResultKind::Ignored),
            Just(ResultKind::Skipped),
        ]
    }

    proptest! {
        #[test]
        fn counts_sum_to_outcomes(kinds in prop::collection::vec((0..4u8, any_kind()), 0..40)) {
            let results: Vec<_> = kinds
                .iter()
                .enumerate()
                .map(|(i, (fixture, kind))| {
                    outcome(&format!("F{fixture}"), &format!("m{i}"), *kind)
                })
                .collect();
            let report = aggregate(&results, &IndexMap::new());
            let s = report.summary;
            prop_assert_eq!(
                s.passed + s.failed + s.errors + s.inconclusive + s.invalid + s.ignored + s.skipped,
                results.len()
            );
            let grouped: usize = report.fixtures.iter().map(|g| g.tests.len()).sum();
            prop_assert_eq!(grouped, results.len());
            prop_assert_eq!(aggregate(&results, &IndexMap::new()), report);
        }
    }
}
