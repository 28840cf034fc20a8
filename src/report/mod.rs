//! Report pipeline: severity filtering, ranking, gating, and assembly
//!
//! All severity comparisons route through [`Severity::rank`] so the
//! ordering used for filtering, sorting, and gating cannot drift apart.

pub mod render;

use crate::models::{Finding, FindingsSummary, Severity};
use serde::Serialize;

/// Column width for truncated report text (title, explanation, hints).
pub const COLUMN_TEXT_LIMIT: usize = 50;

/// Keep only findings at or above the report threshold.
///
/// Unknown severity ranks 0, so unrecognized/missing severities only
/// survive a threshold of Unknown itself.
pub fn filter_reportable(findings: Vec<Finding>, threshold: Severity) -> Vec<Finding> {
    findings
        .into_iter()
        .filter(|f| f.severity.rank() >= threshold.rank())
        .collect()
}

/// Order findings by descending severity. The sort is stable: equal
/// severities keep their normalization encounter order.
pub fn rank_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));
}

/// Build-fail gate.
///
/// `None` disables severity gating entirely — distinct from "nothing
/// found". Evaluated against the already report-filtered set: a finding
/// excluded by the report threshold can never trip the gate.
pub fn should_fail(filtered: &[Finding], fail_threshold: Option<Severity>) -> bool {
    let Some(threshold) = fail_threshold else {
        return false;
    };
    filtered
        .iter()
        .any(|f| f.severity.rank() >= threshold.rank())
}

/// Truncate to `limit` characters, ending in `...` when text was cut.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let kept: String = text.chars().take(limit.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

/// One row of the rendered report. All fields are display-ready strings;
/// absent values carry the "N/A" sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub severity: String,
    pub package: String,
    pub cve: String,
    pub title: String,
    pub affected_versions: String,
    pub link: String,
    pub explanation: String,
    pub custom_info: String,
}

/// Render-agnostic audit report handed to render and notification sinks.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub rows: Vec<ReportRow>,
    pub summary: FindingsSummary,
    pub headline: String,
    pub notification_body: String,
}

/// Assemble the report from the filtered, ranked findings.
pub fn assemble(filtered: &[Finding]) -> Report {
    let rows: Vec<ReportRow> = filtered
        .iter()
        .map(|f| ReportRow {
            severity: f.severity.to_string().to_uppercase(),
            package: f.package.clone(),
            cve: f.cve.clone().unwrap_or_else(|| Finding::NA.to_string()),
            title: truncate(&f.title, COLUMN_TEXT_LIMIT),
            affected_versions: f.affected_versions.clone(),
            link: f.link.clone().unwrap_or_else(|| Finding::NA.to_string()),
            explanation: f
                .explanation
                .as_deref()
                .map(|e| truncate(e, COLUMN_TEXT_LIMIT))
                .unwrap_or_else(|| Finding::NA.to_string()),
            custom_info: format_custom_info(f.custom_info.as_ref()),
        })
        .collect();

    let summary = FindingsSummary::from_findings(filtered);

    let notification_body = filtered
        .iter()
        .map(|f| {
            format!(
                "[{}] {} ({}) - {}",
                f.severity.to_string().to_uppercase(),
                f.package,
                f.cve.as_deref().unwrap_or(Finding::NA),
                f.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Report {
        headline: headline_for(&summary),
        rows,
        summary,
        notification_body,
    }
}

/// One-line summary, tone selected by the worst severity present.
fn headline_for(summary: &FindingsSummary) -> String {
    if summary.total == 0 {
        "No vulnerabilities at or above the report threshold.".to_string()
    } else if summary.critical > 0 {
        format!(
            "{} critical vulnerabilities found. Immediate action required.",
            summary.critical
        )
    } else if summary.high > 0 {
        format!(
            "{} high priority vulnerabilities found. Review as soon as possible.",
            summary.high
        )
    } else {
        format!("{} vulnerabilities found. Review recommended.", summary.total)
    }
}

/// Format the custom-info map for display: recognized sub-fields joined
/// with " | ", absent ones skipped, unrecognized ones ignored.
fn format_custom_info(info: Option<&serde_json::Map<String, serde_json::Value>>) -> String {
    let Some(map) = info else {
        return Finding::NA.to_string();
    };

    let mut parts = Vec::new();
    if let Some(status) = map.get("vuln_status").and_then(|v| v.as_str()) {
        parts.push(format!("Status: {}", status));
    }
    if let Some(solution) = map.get("ai_solution").and_then(|v| v.as_str()) {
        parts.push(format!("Solution Hint: {}", truncate(solution, COLUMN_TEXT_LIMIT)));
    }

    if parts.is_empty() {
        Finding::NA.to_string()
    } else {
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindingSource;
    use serde_json::json;

    fn finding(package: &str, severity: Severity) -> Finding {
        Finding {
            source: FindingSource::Npm,
            package: package.into(),
            cve: None,
            title: "Example issue".into(),
            severity,
            affected_versions: "<1.0".into(),
            link: None,
            fix_available: None,
            explanation: None,
            custom_info: None,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_filter_threshold() {
        let findings = vec![
            finding("a", Severity::Critical),
            finding("b", Severity::Low),
            finding("c", Severity::Medium),
        ];
        let kept = filter_reportable(findings, Severity::Medium);
        let names: Vec<&str> = kept.iter().map(|f| f.package.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_filter_is_monotonic() {
        let findings = vec![
            finding("a", Severity::Critical),
            finding("b", Severity::High),
            finding("c", Severity::Low),
            finding("d", Severity::Unknown),
        ];
        let at_high = filter_reportable(findings.clone(), Severity::High);
        let at_low = filter_reportable(findings, Severity::Low);
        for f in &at_high {
            assert!(at_low.iter().any(|g| g.package == f.package));
        }
        assert!(at_high.len() <= at_low.len());
    }

    #[test]
    fn test_unknown_passes_only_unknown_threshold() {
        let findings = vec![finding("u", Severity::Unknown)];
        assert!(filter_reportable(findings.clone(), Severity::Low).is_empty());
        assert_eq!(filter_reportable(findings, Severity::Unknown).len(), 1);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let mut findings = vec![
            finding("first-low", Severity::Low),
            finding("high", Severity::High),
            finding("second-low", Severity::Low),
        ];
        rank_findings(&mut findings);
        let names: Vec<&str> = findings.iter().map(|f| f.package.as_str()).collect();
        assert_eq!(names, vec!["high", "first-low", "second-low"]);
    }

    #[test]
    fn test_gate_disabled_when_threshold_unset() {
        let findings = vec![finding("a", Severity::Critical)];
        assert!(!should_fail(&findings, None));
    }

    #[test]
    fn test_gate_trips_at_threshold() {
        let findings = vec![finding("a", Severity::High)];
        assert!(should_fail(&findings, Some(Severity::High)));
        assert!(should_fail(&findings, Some(Severity::Medium)));
        assert!(!should_fail(&findings, Some(Severity::Critical)));
    }

    #[test]
    fn test_gate_only_sees_filtered_set() {
        // A critical finding excluded by a stricter report filter can
        // never trip the gate.
        let findings = vec![finding("a", Severity::High)];
        let filtered = filter_reportable(findings, Severity::Critical);
        assert!(filtered.is_empty());
        assert!(!should_fail(&filtered, Some(Severity::High)));
    }

    #[test]
    fn test_truncate_exact_limit() {
        let title = "x".repeat(60);
        let out = truncate(&title, 50);
        assert_eq!(out.chars().count(), 50);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate("short", 50), "short");
        let exactly = "y".repeat(50);
        assert_eq!(truncate(&exactly, 50), exactly);
    }

    #[test]
    fn test_headline_tone() {
        let mut critical = finding("a", Severity::Critical);
        critical.cve = Some("CVE-2024-1".into());
        let report = assemble(&[critical]);
        assert!(report.headline.contains("Immediate action"));

        let report = assemble(&[finding("a", Severity::High)]);
        assert!(report.headline.contains("high priority"));

        let report = assemble(&[finding("a", Severity::Low)]);
        assert!(report.headline.contains("Review recommended"));

        let report = assemble(&[]);
        assert!(report.headline.contains("No vulnerabilities"));
    }

    #[test]
    fn test_notification_body_format_and_order() {
        let mut a = finding("pkg-a", Severity::Critical);
        a.cve = Some("CVE-2024-10".into());
        let b = finding("pkg-b", Severity::Low);
        let report = assemble(&[a, b]);
        let lines: Vec<&str> = report.notification_body.lines().collect();
        assert_eq!(lines[0], "[CRITICAL] pkg-a (CVE-2024-10) - Example issue");
        assert_eq!(lines[1], "[LOW] pkg-b (N/A) - Example issue");
    }

    #[test]
    fn test_row_sentinels() {
        let report = assemble(&[finding("pkg", Severity::Medium)]);
        let row = &report.rows[0];
        assert_eq!(row.cve, "N/A");
        assert_eq!(row.link, "N/A");
        assert_eq!(row.explanation, "N/A");
        assert_eq!(row.custom_info, "N/A");
        assert_eq!(row.severity, "MEDIUM");
    }

    #[test]
    fn test_custom_info_formatting() {
        let mut f = finding("pkg", Severity::High);
        let mut map = serde_json::Map::new();
        map.insert("vuln_status".into(), json!("exploited"));
        map.insert("ai_solution".into(), json!("u".repeat(80)));
        map.insert("irrelevant".into(), json!(42));
        f.custom_info = Some(map);

        let report = assemble(&[f]);
        let cell = &report.rows[0].custom_info;
        assert!(cell.starts_with("Status: exploited | Solution Hint: "));
        assert!(cell.ends_with("..."));
        assert!(!cell.contains("irrelevant"));
    }

    #[test]
    fn test_custom_info_partial_fields() {
        let mut f = finding("pkg", Severity::High);
        let mut map = serde_json::Map::new();
        map.insert("ai_solution".into(), json!("upgrade to 2.0"));
        f.custom_info = Some(map);
        let report = assemble(&[f]);
        assert_eq!(report.rows[0].custom_info, "Solution Hint: upgrade to 2.0");
    }
}
