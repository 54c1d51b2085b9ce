use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use clap::Subcommand;
use insight_core::finding::FindingInput;
use insight_core::types::severity_label;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum FindingsSubcommand {
    /// List findings, newest first
    List {
        #[arg(long, default_value = "200")]
        limit: usize,
    },

    /// Show one finding with its evidence
    Show { id: String },

    /// Import detector output (YAML or JSON list) into the local store
    Import { file: PathBuf },

    /// Per-day finding counts by severity
    Trends {
        #[arg(long, default_value = "14")]
        days: u32,
    },
}

pub fn run(root: &Path, subcommand: FindingsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        FindingsSubcommand::List { limit } => super::block_on(list(root, limit, json)),
        FindingsSubcommand::Show { id } => super::block_on(show(root, &id, json)),
        FindingsSubcommand::Import { file } => import(root, &file, json),
        FindingsSubcommand::Trends { days } => super::block_on(trends(root, days, json)),
    }
}

async fn list(root: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let findings = super::api_client(root)?.list_findings(limit).await?;
    if json {
        return print_json(&findings);
    }
    if findings.is_empty() {
        println!("No findings.");
        return Ok(());
    }
    let rows = findings
        .iter()
        .map(|f| {
            vec![
                f.id.clone(),
                severity_label(f.severity).to_uppercase(),
                f.finding_type.clone(),
                f.service_id.clone().unwrap_or_else(|| "-".to_string()),
                truncate(&f.title, 56),
            ]
        })
        .collect();
    print_table(&["ID", "SEV", "TYPE", "SERVICE", "TITLE"], rows);
    Ok(())
}

async fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let f = super::api_client(root)?.get_finding(id).await?;
    if json {
        return print_json(&f);
    }
    println!("{}  [{}]", f.title, severity_label(f.severity).to_uppercase());
    println!("  id:          {}", f.id);
    println!("  type:        {}", f.finding_type);
    println!("  fingerprint: {}", f.fingerprint);
    println!("  confidence:  {}%", f.confidence);
    if let Some(service) = &f.service_id {
        println!("  service:     {service}");
    }
    if let Some(summary) = &f.summary {
        println!("  summary:     {summary}");
    }
    println!("  evidence:    {}", f.evidence);
    println!("  remediation: {}", f.remediation);
    Ok(())
}

fn import(root: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let inputs: Vec<FindingInput> = serde_yaml::from_str(&data)
        .with_context(|| format!("{} is not a list of findings", file.display()))?;

    let db = super::open_db(root)?;
    let summary = db.import_findings(inputs)?;
    if json {
        print_json(&summary)?;
    } else {
        println!(
            "imported {} finding(s): {} created, {} updated",
            summary.created + summary.updated,
            summary.created,
            summary.updated
        );
    }
    Ok(())
}

async fn trends(root: &Path, days: u32, json: bool) -> anyhow::Result<()> {
    let trends = super::api_client(root)?.daily_trends(days).await?;
    if json {
        return print_json(&trends);
    }
    if trends.is_empty() {
        println!("No findings in the last {days} day(s).");
        return Ok(());
    }
    let rows = trends
        .iter()
        .map(|t| {
            vec![
                t.day.to_string(),
                t.p0.to_string(),
                t.p1.to_string(),
                t.p2.to_string(),
                t.p3.to_string(),
            ]
        })
        .collect();
    print_table(&["DAY", "P0", "P1", "P2", "P3"], rows);
    Ok(())
}
