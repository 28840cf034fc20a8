//! Audit pipeline orchestration
//!
//! One sequential pass per run: collect each source's findings, enrich,
//! filter by the report threshold, rank, gate, assemble. Failures local
//! to one source or one provider are absorbed at that boundary and
//! surfaced as warnings; they never abort the run.

use crate::enrich::{enrich_findings, Enricher};
use crate::models::{Finding, ReportThresholds};
use crate::report::{assemble, filter_reportable, rank_findings, should_fail, Report};
use crate::sources::AuditSource;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What to do when every configured source failed to produce output.
///
/// "Nothing to audit" and "nothing could run" are different situations;
/// which one counts as success is a deployment decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyRunPolicy {
    /// Treat an all-sources-failed run as an empty, successful audit.
    #[default]
    Succeed,
    /// Abort the run with an error.
    Fail,
}

/// Result of one audit run.
#[derive(Debug, Clone, Serialize)]
pub struct AuditOutcome {
    pub report: Report,
    pub should_fail: bool,
    pub warnings: Vec<String>,
    /// Findings normalized before the report threshold was applied.
    pub total_findings: usize,
}

/// Run the full audit pipeline.
pub fn run(
    sources: &[Box<dyn AuditSource>],
    enrichers: &[Box<dyn Enricher>],
    thresholds: &ReportThresholds,
    empty_run: EmptyRunPolicy,
) -> Result<AuditOutcome> {
    let mut findings: Vec<Finding> = Vec::new();
    let mut warnings = Vec::new();
    let mut produced = 0usize;

    for source in sources {
        match source.collect() {
            Ok(batch) => {
                info!("{} source contributed {} findings", source.kind(), batch.len());
                produced += 1;
                findings.extend(batch);
            }
            Err(e) => {
                warn!("{}", e);
                warnings.push(e.to_string());
            }
        }
    }

    if produced == 0 && !sources.is_empty() {
        match empty_run {
            EmptyRunPolicy::Fail => {
                anyhow::bail!("no audit source produced output");
            }
            EmptyRunPolicy::Succeed => {
                info!("no audit source produced output; reporting an empty audit");
            }
        }
    }

    let total_findings = findings.len();

    if !enrichers.is_empty() && !findings.is_empty() {
        info!(
            "enriching {} findings with {} providers",
            findings.len(),
            enrichers.len()
        );
        enrich_findings(&mut findings, enrichers);
    }

    let mut reportable = filter_reportable(findings, thresholds.report);
    rank_findings(&mut reportable);

    let failed = should_fail(&reportable, thresholds.fail);
    let report = assemble(&reportable);

    Ok(AuditOutcome {
        report,
        should_fail: failed,
        warnings,
        total_findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FindingSource, Severity};
    use crate::sources::SourceError;

    struct StubSource {
        kind: FindingSource,
        findings: Vec<Finding>,
    }

    impl AuditSource for StubSource {
        fn kind(&self) -> FindingSource {
            self.kind
        }
        fn collect(&self) -> Result<Vec<Finding>, SourceError> {
            Ok(self.findings.clone())
        }
    }

    struct BrokenSource;
    impl AuditSource for BrokenSource {
        fn kind(&self) -> FindingSource {
            FindingSource::Composer
        }
        fn collect(&self) -> Result<Vec<Finding>, SourceError> {
            Err(SourceError::Unavailable {
                src_kind: FindingSource::Composer,
                reason: "tool missing".into(),
            })
        }
    }

    fn finding(package: &str, severity: Severity) -> Finding {
        Finding {
            source: FindingSource::Npm,
            package: package.into(),
            cve: None,
            title: "t".into(),
            severity,
            affected_versions: "N/A".into(),
            link: None,
            fix_available: None,
            explanation: None,
            custom_info: None,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_broken_source_becomes_warning() {
        let sources: Vec<Box<dyn AuditSource>> = vec![
            Box::new(BrokenSource),
            Box::new(StubSource {
                kind: FindingSource::Npm,
                findings: vec![finding("pkg", Severity::High)],
            }),
        ];
        let outcome = run(
            &sources,
            &[],
            &ReportThresholds {
                report: Severity::Low,
                fail: None,
            },
            EmptyRunPolicy::Succeed,
        )
        .unwrap();
        assert_eq!(outcome.report.rows.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("tool missing"));
    }

    #[test]
    fn test_all_sources_failed_policy() {
        let sources: Vec<Box<dyn AuditSource>> = vec![Box::new(BrokenSource)];
        let thresholds = ReportThresholds::default();

        let outcome = run(&sources, &[], &thresholds, EmptyRunPolicy::Succeed).unwrap();
        assert_eq!(outcome.total_findings, 0);
        assert!(!outcome.should_fail);

        assert!(run(&sources, &[], &thresholds, EmptyRunPolicy::Fail).is_err());
    }

    #[test]
    fn test_filter_rank_and_gate() {
        let sources: Vec<Box<dyn AuditSource>> = vec![Box::new(StubSource {
            kind: FindingSource::Npm,
            findings: vec![
                finding("low-pkg", Severity::Low),
                finding("high-pkg", Severity::High),
            ],
        })];
        let outcome = run(
            &sources,
            &[],
            &ReportThresholds {
                report: Severity::Low,
                fail: Some(Severity::High),
            },
            EmptyRunPolicy::Succeed,
        )
        .unwrap();
        assert_eq!(outcome.report.rows[0].package, "high-pkg");
        assert_eq!(outcome.report.rows[1].package, "low-pkg");
        assert!(outcome.should_fail);
    }
}
