use std::error::Error;
use std::io::{self, Write};

use irisid_core::enrollment::EnrollmentOutcome;
use irisid_core::recognition::{IdentificationOutcome, VerificationOutcome};
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputMode;
use crate::errors::{AppError, AppResult};
use crate::pipeline::TemplatesListOutcome;

fn write_json<T: Serialize + ?Sized>(payload: &T) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(payload)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

fn print_logs(logs: &[String]) {
    for line in logs {
        println!("{line}");
    }
}

pub fn render_enroll(
    outcome: &EnrollmentOutcome,
    mode: OutputMode,
    verbose: bool,
) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs);
            if outcome.enrolled {
                println!(
                    "Enrollment successful: subject {} added to {}",
                    outcome.subject,
                    outcome.dataset_path.display()
                );
                if verbose {
                    if let (Some(len), Some(at)) = (outcome.feature_len, &outcome.enrolled_at) {
                        println!("Template length {len}, enrolled at {at}");
                    }
                }
            } else {
                println!(
                    "Enrollment failed: no iris could be segmented for subject {}",
                    outcome.subject
                );
            }
        }
        OutputMode::Json => write_json(&json!({
            "success": outcome.enrolled,
            "enrollment": outcome,
        }))?,
    }
    Ok(())
}

pub fn render_verify(
    outcome: &VerificationOutcome,
    mode: OutputMode,
    verbose: bool,
) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs);
            let verdict = if outcome.accepted {
                "ACCEPTED"
            } else {
                "DENIED"
            };
            match outcome
                .decision
                .as_ref()
                .and_then(|decision| decision.min_distance)
            {
                Some(distance) => println!(
                    "{verdict}: subject {} (distance {distance:.4})",
                    outcome.subject
                ),
                None => println!("{verdict}: subject {}", outcome.subject),
            }
            if let (true, Some(decision)) = (verbose, &outcome.decision) {
                println!(
                    "Compared {} template(s) against threshold {}",
                    decision.templates_compared, decision.threshold
                );
            }
        }
        OutputMode::Json => write_json(&json!({
            "success": outcome.accepted,
            "verification": outcome,
        }))?,
    }
    Ok(())
}

pub fn render_identify(
    outcome: &IdentificationOutcome,
    mode: OutputMode,
    verbose: bool,
) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs);
            if verbose {
                println!(
                    "Searched {} template(s) in {}",
                    outcome.templates_compared,
                    outcome.dataset_path.display()
                );
            }
            if outcome.matches.is_empty() {
                println!("No match");
            }
            for (rank, candidate) in outcome.matches.iter().enumerate() {
                println!(
                    "{:>3}. {} (distance {:.4})",
                    rank + 1,
                    candidate.subject,
                    candidate.distance
                );
            }
        }
        OutputMode::Json => write_json(&json!({
            "success": !outcome.matches.is_empty(),
            "identification": outcome,
        }))?,
    }
    Ok(())
}

pub fn render_templates_list(outcome: &TemplatesListOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            match outcome.dimension {
                Some(dimension) => println!(
                    "{} template(s) of dimension {dimension} in {}",
                    outcome.total,
                    outcome.dataset_path.display()
                ),
                None => println!("No templates in {}", outcome.dataset_path.display()),
            }
            for entry in &outcome.subjects {
                println!("{}\t{}", entry.subject, entry.templates);
            }
        }
        OutputMode::Json => write_json(outcome)?,
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "success": false,
                "error": err.human_message(),
            });
            if let Ok(json) = serde_json::to_string(&payload) {
                println!("{json}");
            }
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
    }
}
