//! Findings and the read-only aggregations served to the dashboard.
//!
//! Findings are produced by detectors outside this workspace and imported
//! as JSON. `(type, fingerprint)` identifies a finding across imports.

use crate::error::{InsightError, Result};
use crate::types::{severity_label, MAX_SEVERITY};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Number of entries in [`WeeklyReport::top_findings`].
pub const TOP_FINDINGS: usize = 10;

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    #[serde(rename = "type")]
    pub finding_type: String,
    pub fingerprint: String,
    pub severity: u8,
    pub confidence: u8,
    #[serde(default)]
    pub service_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub evidence: serde_json::Value,
    #[serde(default)]
    pub remediation: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A finding as emitted by a detector, before it has an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingInput {
    #[serde(rename = "type")]
    pub finding_type: String,
    pub fingerprint: String,
    pub severity: u8,
    pub confidence: u8,
    #[serde(default)]
    pub service_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub evidence: serde_json::Value,
    #[serde(default)]
    pub remediation: serde_json::Value,
}

impl FindingInput {
    pub fn validate(&self) -> Result<()> {
        if self.finding_type.is_empty() || self.fingerprint.is_empty() {
            return Err(InsightError::InvalidInput(
                "finding type and fingerprint are required".to_string(),
            ));
        }
        if self.severity > MAX_SEVERITY {
            return Err(InsightError::InvalidInput(format!(
                "severity {} out of range 0..={MAX_SEVERITY}",
                self.severity
            )));
        }
        if self.confidence > 100 {
            return Err(InsightError::InvalidInput(format!(
                "confidence {} out of range 0..=100",
                self.confidence
            )));
        }
        Ok(())
    }
}

impl Finding {
    pub fn create(input: FindingInput) -> Result<Self> {
        input.validate()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            finding_type: input.finding_type,
            fingerprint: input.fingerprint,
            severity: input.severity,
            confidence: input.confidence,
            service_id: input.service_id,
            title: input.title,
            summary: input.summary,
            evidence: input.evidence,
            remediation: input.remediation,
            created_at: Utc::now(),
            updated_at: None,
        })
    }

    /// Refresh a stored finding from a re-detection. Keeps id and `created_at`.
    pub fn refresh(&mut self, input: FindingInput) -> Result<()> {
        input.validate()?;
        self.severity = input.severity;
        self.confidence = input.confidence;
        self.service_id = input.service_id;
        self.title = input.title;
        self.summary = input.summary;
        self.evidence = input.evidence;
        self.remediation = input.remediation;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.finding_type, &self.fingerprint)
    }
}

// ---------------------------------------------------------------------------
// List shape
// ---------------------------------------------------------------------------

/// The list view omits evidence and remediation payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub finding_type: String,
    pub fingerprint: String,
    pub severity: u8,
    pub confidence: u8,
    pub title: String,
    pub summary: Option<String>,
    pub service_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Finding> for FindingSummary {
    fn from(f: &Finding) -> Self {
        Self {
            id: f.id.clone(),
            finding_type: f.finding_type.clone(),
            fingerprint: f.fingerprint.clone(),
            severity: f.severity,
            confidence: f.confidence,
            title: f.title.clone(),
            summary: f.summary.clone(),
            service_id: f.service_id.clone(),
            created_at: f.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Daily trends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub day: NaiveDate,
    pub p0: u32,
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
}

impl DailyTrend {
    fn from_counts(day: NaiveDate, counts: [u32; 4]) -> Self {
        Self {
            day,
            p0: counts[0],
            p1: counts[1],
            p2: counts[2],
            p3: counts[3],
        }
    }
}

/// Per-day, per-severity counts of findings created in the last `days` days.
///
/// Only days with at least one finding appear; output is sorted by day. A
/// window reaching past the earliest representable date covers everything.
pub fn daily_trends(findings: &[Finding], days: u32, now: DateTime<Utc>) -> Vec<DailyTrend> {
    let cutoff = Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut buckets: BTreeMap<NaiveDate, [u32; 4]> = BTreeMap::new();
    for f in findings.iter().filter(|f| f.created_at >= cutoff) {
        if f.severity > MAX_SEVERITY {
            continue;
        }
        buckets.entry(f.created_at.date_naive()).or_default()[usize::from(f.severity)] += 1;
    }
    buckets
        .into_iter()
        .map(|(day, counts)| DailyTrend::from_counts(day, counts))
        .collect()
}

// ---------------------------------------------------------------------------
// Weekly report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub summary: ReportSummary,
    pub top_findings: Vec<TopFinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_findings: usize,
    pub by_severity: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopFinding {
    pub id: String,
    pub severity: u8,
    pub title: String,
    #[serde(rename = "type")]
    pub finding_type: String,
}

/// Executive summary: totals by severity plus the most urgent findings.
pub fn weekly_report(findings: &[Finding]) -> WeeklyReport {
    let mut by_severity: BTreeMap<String, usize> = (0..=MAX_SEVERITY)
        .map(|s| (severity_label(s), 0))
        .collect();
    for f in findings {
        *by_severity.entry(severity_label(f.severity)).or_default() += 1;
    }

    let mut ranked: Vec<&Finding> = findings.iter().collect();
    ranked.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    WeeklyReport {
        summary: ReportSummary {
            total_findings: findings.len(),
            by_severity,
        },
        top_findings: ranked
            .into_iter()
            .take(TOP_FINDINGS)
            .map(|f| TopFinding {
                id: f.id.clone(),
                severity: f.severity,
                title: f.title.clone(),
                finding_type: f.finding_type.clone(),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input(fingerprint: &str, severity: u8) -> FindingInput {
        FindingInput {
            finding_type: "crashloop_restarts".to_string(),
            fingerprint: fingerprint.to_string(),
            severity,
            confidence: 80,
            service_id: None,
            title: format!("Pod {fingerprint} restarting"),
            summary: None,
            evidence: serde_json::json!({}),
            remediation: serde_json::json!({}),
        }
    }

    fn at(fingerprint: &str, severity: u8, created_at: DateTime<Utc>) -> Finding {
        let mut f = Finding::create(input(fingerprint, severity)).unwrap();
        f.created_at = created_at;
        f
    }

    #[test]
    fn create_rejects_out_of_range_severity() {
        let err = Finding::create(input("x", 4)).unwrap_err();
        assert!(matches!(err, InsightError::InvalidInput(_)));
    }

    #[test]
    fn refresh_keeps_identity() {
        let mut f = Finding::create(input("web", 2)).unwrap();
        let id = f.id.clone();
        let created = f.created_at;
        f.refresh(input("web", 0)).unwrap();
        assert_eq!(f.id, id);
        assert_eq!(f.created_at, created);
        assert_eq!(f.severity, 0);
        assert!(f.updated_at.is_some());
    }

    #[test]
    fn serializes_type_field() {
        let f = Finding::create(input("web", 1)).unwrap();
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["type"], "crashloop_restarts");
        assert!(json.get("finding_type").is_none());
    }

    #[test]
    fn daily_trends_buckets_by_day_and_severity() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let findings = vec![
            at("a", 0, now - Duration::hours(1)),
            at("b", 0, now - Duration::hours(2)),
            at("c", 3, now - Duration::hours(3)),
            at("d", 1, now - Duration::days(1)),
            at("old", 1, now - Duration::days(30)),
        ];
        let trends = daily_trends(&findings, 14, now);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].day, NaiveDate::from_ymd_opt(2024, 5, 9).unwrap());
        assert_eq!(trends[0].p1, 1);
        assert_eq!(trends[1].day, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
        assert_eq!((trends[1].p0, trends[1].p3), (2, 1));
    }

    #[test]
    fn daily_trends_serializes_iso_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let trends = daily_trends(&[at("a", 2, now)], 1, now);
        let json = serde_json::to_value(&trends).unwrap();
        assert_eq!(json[0]["day"], "2024-05-10");
        assert_eq!(json[0]["p2"], 1);
    }

    #[test]
    fn daily_trends_with_huge_window_includes_everything() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let findings = vec![
            at("a", 0, now),
            at("ancient", 2, Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()),
        ];
        let trends = daily_trends(&findings, u32::MAX, now);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].day, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        assert_eq!(trends[0].p2, 1);
    }

    #[test]
    fn weekly_report_ranks_by_severity_then_recency() {
        let now = Utc::now();
        let findings = vec![
            at("low", 3, now),
            at("old-p0", 0, now - Duration::days(2)),
            at("new-p0", 0, now),
            at("p1", 1, now),
        ];
        let report = weekly_report(&findings);
        assert_eq!(report.summary.total_findings, 4);
        assert_eq!(report.summary.by_severity["p0"], 2);
        assert_eq!(report.summary.by_severity["p2"], 0);
        let titles: Vec<_> = report.top_findings.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Pod new-p0 restarting",
                "Pod old-p0 restarting",
                "Pod p1 restarting",
                "Pod low restarting"
            ]
        );
    }

    #[test]
    fn weekly_report_caps_top_findings() {
        let now = Utc::now();
        let findings: Vec<_> = (0..15).map(|i| at(&format!("f{i}"), 2, now)).collect();
        assert_eq!(weekly_report(&findings).top_findings.len(), TOP_FINDINGS);
    }
}
