//! `reports` - command-line front end for the NGO monthly reporting backend.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use reports::{
    ClientConfig, DashboardView, IngestionJob, JobId, JobStatus, Month, Notice, Notices, PollState,
    Progress, ReportDraft, ReportForm, ReportsClient, ReportsError, Severity,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reports", version, about = "Submit and review NGO monthly reports")]
struct Cli {
    /// Backend base URL; overrides reports.toml and REPORTS_API_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit one monthly report.
    Submit {
        /// Reporting organisation's id, e.g. NGO_001.
        #[arg(long)]
        ngo_id: String,
        /// Reporting month, YYYY-MM.
        #[arg(long)]
        month: String,
        /// People helped during the month (whole number, 0 or more).
        #[arg(long)]
        people_helped: String,
        /// Events conducted during the month (whole number, 0 or more).
        #[arg(long)]
        events_conducted: String,
        /// Funds utilized during the month (whole number, 0 or more).
        #[arg(long)]
        funds_utilized: String,
    },
    /// Upload a CSV of reports and follow the ingestion job.
    Upload {
        /// CSV file with one report per row.
        path: PathBuf,
        /// Print the job id and exit without polling.
        #[arg(long)]
        detach: bool,
    },
    /// Show an ingestion job's status once.
    Status {
        /// Job id printed by `upload`.
        job_id: String,
    },
    /// Show aggregated totals for a month.
    Dashboard {
        /// Month to show, YYYY-MM. Defaults to the current month.
        #[arg(long)]
        month: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::load()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    debug!(?config, "Loaded configuration");

    let (client, mut notices) = ReportsClient::connect(config)?;

    match cli.command {
        Command::Submit {
            ngo_id,
            month,
            people_helped,
            events_conducted,
            funds_utilized,
        } => {
            let mut form = ReportForm::with_draft(ReportDraft {
                ngo_id,
                month,
                people_helped,
                events_conducted,
                funds_utilized,
            });
            let outcome = client.submit_report(&mut form).await;
            print_notices(&mut notices);
            match outcome {
                Some(Ok(_)) => {}
                Some(Err(_)) => {
                    for (field, message) in form.field_errors() {
                        eprintln!("  {field}: {message}");
                    }
                    if let Some(banner) = form.banner() {
                        eprintln!("{banner}");
                    }
                    bail!("report was not submitted");
                }
                None => bail!("a submission is already in progress"),
            }
        }
        Command::Upload { path, detach } => {
            let outcome = client.upload_file(&path).await;
            print_notices(&mut notices);
            match outcome {
                Some(Ok(accepted)) if detach => {
                    client.cancel_upload().await;
                    println!("{}", accepted.job_id);
                }
                Some(Ok(_)) => follow_upload(&client, &mut notices).await?,
                Some(Err(err)) => return Err(err.into()),
                None => bail!("an upload is already in progress"),
            }
        }
        Command::Status { job_id } => {
            let job = client.job_status(JobId::new(job_id)).await?;
            print_job(&job);
        }
        Command::Dashboard { month } => {
            let month = match month {
                Some(month) => month.parse::<Month>()?,
                None => Month::current(),
            };
            match client.dashboard(month).await {
                DashboardView::Loaded(snapshot) => {
                    println!("Dashboard for {}", snapshot.month);
                    println!("  NGOs reporting:    {}", snapshot.total_ngos_reporting);
                    println!("  People helped:     {}", snapshot.total_people_helped);
                    println!("  Events conducted:  {}", snapshot.total_events_conducted);
                    println!("  Funds utilized:    {}", snapshot.total_funds_utilized);
                }
                DashboardView::Empty { month } => {
                    println!("{} ({month})", reports::dashboard::DASHBOARD_EMPTY);
                }
                DashboardView::Failed { message, error, .. } => {
                    debug!(%error, "Dashboard read failed");
                    bail!(message);
                }
            }
        }
    }

    Ok(())
}

/// Prints progress until the job settles or Ctrl-C cancels polling.
async fn follow_upload(client: &ReportsClient, notices: &mut Notices) -> Result<()> {
    let mut updates = client.poller().subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_line = String::new();
    loop {
        let state = updates.borrow_and_update().clone();
        if let Some(job) = state.job() {
            let line = job_line(job);
            if line != last_line {
                println!("{line}");
                last_line = line;
            }
        }
        if !state.is_polling() {
            break;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(notice) = notices.recv() => print_notice(&notice),
            _ = &mut ctrl_c => {
                client.cancel_upload().await;
                println!("Polling cancelled.");
                break;
            }
        }
    }
    print_notices(notices);

    match client.job_state() {
        PollState::Settled { job } => match job.into_result() {
            Ok(_) => Ok(()),
            Err(ReportsError::JobFailed { message, .. }) => bail!(message),
            Err(err) => Err(err.into()),
        },
        PollState::Idle | PollState::Polling { .. } => Ok(()),
    }
}

fn job_line(job: &IngestionJob) -> String {
    match job.progress() {
        Progress::Indeterminate => format!("{}: {}", job.job_id, job.status),
        Progress::Determinate {
            processed,
            total,
            percent,
        } => format!("{}: {} {processed}/{total} ({percent}%)", job.job_id, job.status),
    }
}

fn print_job(job: &IngestionJob) {
    println!("{}", job_line(job));
    if job.status == JobStatus::Failed {
        if let Some(message) = &job.error_message {
            println!("  {message}");
        }
    }
}

fn print_notice(notice: &Notice) {
    match notice.severity {
        Severity::Error => eprintln!("{}", notice.message),
        Severity::Info | Severity::Success => println!("{}", notice.message),
    }
}

fn print_notices(notices: &mut Notices) {
    for notice in notices.drain() {
        print_notice(&notice);
    }
}
