//! Feature intake and read-only queries.

use anyhow::Result;
use std::path::Path;

use forge_review::Feature;
use forge_review::review::{Decision, FindingSeverity, by_severity};

use super::open_session;

pub async fn cmd_add(project_dir: &Path, title: &str, description: Option<&str>) -> Result<()> {
    let session = open_session(project_dir)?;
    let feature = session
        .orchestrator
        .intake(title, description.unwrap_or_default())
        .await?;
    println!(
        "Added feature {} {}",
        console::style(feature.id).bold(),
        feature.title
    );
    Ok(())
}

pub async fn cmd_list(project_dir: &Path, json: bool) -> Result<()> {
    let session = open_session(project_dir)?;
    let features = session.orchestrator.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&features)?);
        return Ok(());
    }
    if features.is_empty() {
        println!("No features yet. Add one with 'forge-review add <title>'.");
        return Ok(());
    }

    println!(
        "{:<5} {:<17} {:<10} {:<6} Title",
        "ID", "Status", "Review", "Iter"
    );
    println!(
        "{:<5} {:<17} {:<10} {:<6} -----",
        "-----", "-----------------", "----------", "------"
    );
    for feature in &features {
        println!(
            "{:<5} {:<17} {:<10} {:<6} {}",
            feature.id,
            feature.status.as_str(),
            review_status(feature),
            iteration_label(feature),
            feature.title
        );
    }
    Ok(())
}

pub async fn cmd_start(project_dir: &Path, id: i64) -> Result<()> {
    let session = open_session(project_dir)?;
    let feature = session.orchestrator.begin_implementation(id).await?;
    println!("Feature {} is now {}", feature.id, feature.status);
    Ok(())
}

pub async fn cmd_status(project_dir: &Path, id: i64, json: bool) -> Result<()> {
    let session = open_session(project_dir)?;
    let feature = session.orchestrator.status(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&feature)?);
        return Ok(());
    }

    println!();
    println!("{}", console::style(format!("Feature {}: {}", feature.id, feature.title)).bold());
    println!();
    println!("  Status:     {}", feature.status);
    println!("  Review:     {}", review_status(&feature));
    println!("  Iterations: {}", iteration_label(&feature));
    if let Some(spec) = feature.review.as_ref() {
        println!("  Attempts left: {}", spec.remaining());
    }
    println!("  Version:    {}", feature.version);
    if let Some(pending) = feature.review.as_ref().and_then(|r| r.pending.as_ref()) {
        let commit = pending
            .commit
            .as_ref()
            .map(|c| short_hash(&c.hash).to_string())
            .unwrap_or_else(|| "not committed".to_string());
        println!("  Pending:    iteration {} ({})", pending.iteration, commit);
    }
    if feature.is_halted() {
        println!();
        println!(
            "  {}",
            console::style("Review cap reached; manual intervention required.")
                .red()
                .bold()
        );
    }
    println!();
    Ok(())
}

pub async fn cmd_history(
    project_dir: &Path,
    id: i64,
    json: bool,
    detail: Option<u32>,
) -> Result<()> {
    let session = open_session(project_dir)?;

    if let Some(number) = detail {
        match session.orchestrator.iteration_detail(id, number).await? {
            Some(doc) => print!("{}", doc.body),
            None => anyhow::bail!("No detail document for feature {} iteration {}", id, number),
        }
        return Ok(());
    }

    let history = session.orchestrator.history(id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    println!();
    println!(
        "{}",
        console::style(format!("Review history for feature {}: {}", history.feature_id, history.title))
            .bold()
    );
    if history.iterations.is_empty() {
        println!();
        println!("  No review iterations yet.");
        println!();
        return Ok(());
    }

    for it in &history.iterations {
        println!();
        let decision = match it.decision() {
            Decision::Approved => console::style(it.decision().as_str()).green(),
            Decision::Rejected => console::style(it.decision().as_str()).yellow(),
            Decision::Failed => console::style(it.decision().as_str()).red(),
        };
        println!(
            "  #{} {} by {} at {} (commit {})",
            it.number(),
            decision,
            it.reviewer(),
            it.completed_at().format("%Y-%m-%d %H:%M:%S"),
            short_hash(it.commit())
        );
        if !it.summary().is_empty() {
            println!("     {}", it.summary());
        }
        if let Some(rationale) = it.rationale() {
            println!("     Rationale: {}", rationale);
        }
        if !it.findings().is_empty() {
            println!(
                "     Findings: {} error, {} warning, {} info",
                it.count_by_severity(FindingSeverity::Error),
                it.count_by_severity(FindingSeverity::Warning),
                it.count_by_severity(FindingSeverity::Info)
            );
        }
        for finding in by_severity(it.findings()) {
            let sev = match finding.severity() {
                FindingSeverity::Error => console::style(finding.severity().to_string()).red(),
                FindingSeverity::Warning => console::style(finding.severity().to_string()).yellow(),
                FindingSeverity::Info => console::style(finding.severity().to_string()).dim(),
            };
            match finding.location() {
                Some(loc) => println!("     - [{}] {} ({})", sev, finding.title(), loc),
                None => println!("     - [{}] {}", sev, finding.title()),
            }
        }
    }
    println!();
    Ok(())
}

fn review_status(feature: &Feature) -> &'static str {
    feature
        .review
        .as_ref()
        .map(|r| r.status.as_str())
        .unwrap_or("-")
}

fn iteration_label(feature: &Feature) -> String {
    match feature.review.as_ref() {
        Some(r) => format!("{}/{}", r.current_iteration(), r.max_iterations()),
        None => "-".to_string(),
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}
