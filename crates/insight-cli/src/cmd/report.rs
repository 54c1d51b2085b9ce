use crate::output::{print_json, print_table, truncate};
use insight_core::types::severity_label;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    super::block_on(async {
        let report = super::api_client(root)?.weekly_report().await?;
        if json {
            return print_json(&report);
        }

        println!("Findings: {}", report.summary.total_findings);
        let by_severity: Vec<String> = report
            .summary
            .by_severity
            .iter()
            .map(|(sev, n)| format!("{}={n}", sev.to_uppercase()))
            .collect();
        println!("By severity: {}", by_severity.join("  "));

        if report.top_findings.is_empty() {
            return Ok(());
        }
        println!();
        let rows = report
            .top_findings
            .iter()
            .map(|f| {
                vec![
                    severity_label(f.severity).to_uppercase(),
                    f.finding_type.clone(),
                    truncate(&f.title, 56),
                    f.id.clone(),
                ]
            })
            .collect();
        print_table(&["SEV", "TYPE", "TITLE", "ID"], rows);
        Ok(())
    })
}
