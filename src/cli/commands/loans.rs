use anyhow::Context;
use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::CONFIG;
use crate::loans::{expected_installments, Clock, FixedClock, PgLoanStore, Reconciler, SystemClock};

#[derive(Subcommand)]
pub enum LoansCommands {
    #[command(about = "Advance paid installments of all active loans in a tenant")]
    Sync {
        #[arg(long, help = "Tenant database (defaults to KEEPER_TENANT_DB)")]
        tenant: Option<String>,

        #[arg(long, help = "Reconcile as of this date (YYYY-MM-DD) instead of today")]
        date: Option<NaiveDate>,
    },

    #[command(about = "Show what a sync would change without writing")]
    Preview {
        #[arg(long, help = "Tenant database (defaults to KEEPER_TENANT_DB)")]
        tenant: Option<String>,

        #[arg(long, help = "Evaluate as of this date (YYYY-MM-DD) instead of today")]
        date: Option<NaiveDate>,
    },

    #[command(about = "Compute expected installments for a schedule (no database)")]
    Expected {
        #[arg(long, help = "Loan start date (YYYY-MM-DD)")]
        start: NaiveDate,

        #[arg(long, help = "Day of month the installment is due (1-31)",
              value_parser = clap::value_parser!(u32).range(1..=31))]
        payment_day: u32,

        #[arg(long, help = "Evaluate as of this date (YYYY-MM-DD) instead of today")]
        today: Option<NaiveDate>,

        #[arg(long, help = "Total installments, caps the result",
              value_parser = clap::value_parser!(i64).range(1..))]
        total: Option<i64>,
    },
}

pub async fn handle(cmd: LoansCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        LoansCommands::Sync { tenant, date } => {
            let reconciler = reconciler_for(tenant, date).await?;
            let report = reconciler.sync_now().await?;
            output_report(&output_format, &report)
        }
        LoansCommands::Preview { tenant, date } => {
            let reconciler = reconciler_for(tenant, date).await?;
            let report = reconciler.preview().await?;
            output_report(&output_format, &report)
        }
        LoansCommands::Expected { start, payment_day, today, total } => {
            let today = today.unwrap_or_else(|| system_clock().today());
            let expected = expected_installments(start, today, payment_day);
            let capped = match total {
                Some(total) => expected.min(total),
                None => expected,
            };

            output_success(
                &output_format,
                &format!("{} installments expected by {}", capped, today),
                Some(json!({
                    "start": start,
                    "payment_day": payment_day,
                    "today": today,
                    "expected": expected,
                    "capped": capped,
                    "completed": total.is_some_and(|t| capped >= t),
                })),
            )
        }
    }
}

fn system_clock() -> SystemClock {
    SystemClock::from_offset_minutes(CONFIG.loans.utc_offset_minutes)
}

async fn reconciler_for(tenant: Option<String>, date: Option<NaiveDate>) -> anyhow::Result<Reconciler> {
    let tenant_db = tenant
        .or_else(|| CONFIG.loans.default_tenant.clone())
        .context("tenant database not specified; pass --tenant or set KEEPER_TENANT_DB")?;

    let store = PgLoanStore::for_tenant(&tenant_db)
        .await
        .with_context(|| format!("failed to open loan store for {}", tenant_db))?;

    let system = system_clock();
    let clock: Arc<dyn Clock> = match date {
        Some(date) => Arc::new(FixedClock::with_offset(date, system.offset())),
        None => Arc::new(system),
    };
    Ok(Reconciler::new(Arc::new(store), clock))
}
