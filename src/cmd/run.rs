//! Commands that drive the review loop.

use anyhow::Result;
use std::path::Path;

use forge_review::ReviewError;
use forge_review::orchestrator::{Outcome, PhaseReport, Recovery};

use super::{Session, open_session, spawn_event_printer};

/// `review`: implementation is done; commit and review it.
pub async fn cmd_review(project_dir: &Path, id: i64, expected_version: Option<u64>) -> Result<()> {
    let session = open_session(project_dir)?;
    let printer = spawn_event_printer(&session.events);
    let result = match expected_version {
        Some(version) => {
            session
                .orchestrator
                .on_implementation_complete_at(id, version)
                .await
        }
        None => session.orchestrator.on_implementation_complete(id).await,
    };
    finish(session, printer).await;
    report(result?)
}

/// `run`: alternate implementation and review until approved or halted.
/// Ctrl-C cancels at the next phase boundary.
pub async fn cmd_run(project_dir: &Path, id: i64) -> Result<()> {
    let session = open_session(project_dir)?;
    let printer = spawn_event_printer(&session.events);

    let orchestrator = session.orchestrator.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                console::style("Cancelling at the next phase boundary...").yellow()
            );
            orchestrator.cancel(id);
        }
    });

    let result = session.orchestrator.drive(id).await;
    interrupt.abort();
    let _ = interrupt.await;
    finish(session, printer).await;

    match result {
        Err(ReviewError::Cancelled(_)) => {
            println!("Cancelled. State is saved; run again to resume.");
            Ok(())
        }
        other => report(other?),
    }
}

pub async fn cmd_recover(project_dir: &Path, id: i64) -> Result<()> {
    let session = open_session(project_dir)?;
    match session.orchestrator.recover(id).await? {
        Recovery::NothingToDo => println!("Feature {} needs no recovery.", id),
        Recovery::ReleasedClaim {
            iteration,
            commit_kept,
        } => {
            println!(
                "Released interrupted review of iteration {} for feature {}{}.",
                iteration,
                id,
                if commit_kept { " (commit kept)" } else { "" }
            );
        }
        Recovery::ReappliedDecision { iteration, outcome } => {
            println!(
                "Re-applied the decision of iteration {}: {}",
                iteration,
                describe_outcome(outcome)
            );
        }
    }
    Ok(())
}

/// `halt`: stop automation for a feature and flag it for a human.
pub async fn cmd_halt(project_dir: &Path, id: i64) -> Result<()> {
    let session = open_session(project_dir)?;
    let printer = spawn_event_printer(&session.events);
    let result = session.orchestrator.on_max_iterations_reached(id).await;
    finish(session, printer).await;
    result?;
    println!("Feature {} halted; manual intervention required.", id);
    Ok(())
}

/// `context`: print the prompt the next implementation attempt would get.
pub async fn cmd_context(project_dir: &Path, id: i64) -> Result<()> {
    let session = open_session(project_dir)?;
    print!("{}", session.orchestrator.implementation_context(id).await?);
    Ok(())
}

/// Drop every event sender so the printer drains what is queued and exits.
async fn finish(session: Session, printer: tokio::task::JoinHandle<()>) {
    drop(session);
    let _ = printer.await;
}

fn report(report: PhaseReport) -> Result<()> {
    println!();
    println!(
        "Iteration {} for feature {}: {} ({} finding(s)); {}",
        report.iteration,
        report.feature_id,
        report.decision,
        report.findings,
        describe_outcome(report.outcome)
    );
    if let Some(detail) = report.detail_ref {
        println!("Details: {}", detail);
    }
    Ok(())
}

fn describe_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Approved(next) => format!("approved, now {}", next),
        Outcome::Rejected => "back to in_progress for fixes".to_string(),
        Outcome::CapReached => "review cap reached; manual intervention required".to_string(),
    }
}
