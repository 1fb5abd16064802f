use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::loans::{OutcomeResult, SyncReport};

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(object)) = (data, response.as_object_mut()) {
                object.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a reconciliation report in the appropriate format
pub fn output_report(output_format: &OutputFormat, report: &SyncReport) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "success": true, "data": report }))?
            );
        }
        OutputFormat::Text => {
            let verb = if report.dry_run { "would update" } else { "updated" };
            println!(
                "{}: examined {}, {} {}, completed {}, up to date {}, skipped {}, failed {}",
                report.date,
                report.examined,
                verb,
                report.updated,
                report.completed,
                report.up_to_date,
                report.skipped,
                report.failed
            );

            if report.outcomes.is_empty() {
                return Ok(());
            }

            println!();
            println!("{:<38} {:>6} {:>9} {}", "LOAN", "PAID", "EXPECTED", "RESULT");
            println!("{}", "-".repeat(80));
            for outcome in &report.outcomes {
                let expected = outcome
                    .expected
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<38} {:>6} {:>9} {}",
                    outcome.loan_id,
                    outcome.paid_before,
                    expected,
                    describe_result(&outcome.result)
                );
            }
        }
    }
    Ok(())
}

fn describe_result(result: &OutcomeResult) -> String {
    match result {
        OutcomeResult::Updated { paid_installments, completed } => {
            let suffix = if *completed { " (completed)" } else { "" };
            format!("-> {}{}", paid_installments, suffix)
        }
        OutcomeResult::Planned { paid_installments, completed } => {
            let suffix = if *completed { " (would complete)" } else { "" };
            format!("would set {}{}", paid_installments, suffix)
        }
        OutcomeResult::UpToDate => "up to date".to_string(),
        OutcomeResult::Skipped { reason } => format!("skipped: {}", reason),
        OutcomeResult::Failed { error } => format!("failed: {}", error),
    }
}
