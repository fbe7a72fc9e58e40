use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pantry_ingest::config::IngestConfig;
use pantry_ingest::models::draft::{DraftMeal, DraftStockItem, MealSource, MealType};
use pantry_ingest::models::quantity::Quantity;
use pantry_ingest::services::api::{HttpPantryApi, PantryApi};
use pantry_ingest::services::extraction::ScanMode;
use pantry_ingest::services::session::IngestSession;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "pantry-ingest", version, about = "Feed pantry stock and meal logs from photos")]
struct Cli {
    /// User the drafts belong to (falls back to USER_ID)
    #[arg(long, global = true)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a photo and print the extracted drafts
    Scan {
        image: PathBuf,
        /// bill, single-item or meal
        #[arg(long, default_value = "bill")]
        mode: ScanMode,
        /// Write the drafts after review output
        #[arg(long)]
        commit: bool,
    },
    /// Add (or with --stock-id, update) one stock item
    AddStock {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "1")]
        quantity: String,
        #[arg(long, default_value = "other")]
        category: String,
        #[arg(long)]
        expiry: Option<NaiveDate>,
        #[arg(long)]
        stock_id: Option<String>,
    },
    /// Log (or with --meal-id, update) one meal
    LogMeal {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "other")]
        meal_type: MealType,
        #[arg(long, default_value = "home")]
        source: MealSource,
        /// Prefill ingredients and nutrition from the backend estimator
        #[arg(long)]
        estimate: bool,
        #[arg(long)]
        meal_id: Option<String>,
    },
    /// Print the backend's ingredient and nutrition estimate for a dish
    EstimateMeal { name: String },
    /// Show how a quantity string normalizes
    ParseQuantity { raw: String },
}

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    metrics::describe_counter!("ingest_jobs_submitted", "Analysis jobs submitted");
    metrics::describe_counter!("ingest_jobs_completed", "Analysis jobs that completed");
    metrics::describe_counter!("ingest_jobs_failed", "Analysis jobs that failed, timed out or lost contact");
    metrics::describe_histogram!("ingest_job_wait_seconds", "Time from submission to completed analysis");
    metrics::describe_counter!("ingest_commit_writes_total", "Draft writes by outcome");

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult {
    if let Command::ParseQuantity { raw } = &cli.command {
        let quantity = Quantity::parse(raw);
        println!("{}", serde_json::to_string(&quantity)?);
        println!("{}", quantity);
        return Ok(());
    }

    let config = IngestConfig::from_env()?;
    let user_id = cli
        .user_id
        .clone()
        .or_else(|| config.user_id.clone())
        .ok_or("no user id: pass --user-id or set USER_ID")?;

    tracing::info!(api = %config.api_base_url, user_id = %user_id, "Connecting to pantry backend");
    let api: Arc<dyn PantryApi> = Arc::new(HttpPantryApi::new(&config.api_base_url, config.request_timeout())?);
    let mut session = IngestSession::new(api, &user_id, &config);

    match cli.command {
        Command::Scan { image, mode, commit } => scan(&mut session, image, mode, commit).await,
        Command::AddStock {
            name,
            quantity,
            category,
            expiry,
            stock_id,
        } => {
            let mut draft = DraftStockItem::new(name, Quantity::parse(&quantity), category);
            draft.expiry_date = expiry;
            match stock_id {
                Some(id) => session.committer().update_stock(&id, &draft).await?,
                None => {
                    session.stock.set_active(draft);
                    session.commit_stock().await?.ensure_success()?;
                }
            }
            println!("saved");
            Ok(())
        }
        Command::LogMeal {
            name,
            meal_type,
            source,
            estimate,
            meal_id,
        } => {
            if estimate {
                session.estimate_meal(&name).await?;
            } else {
                session.meals.set_active(DraftMeal::new(name));
            }
            let draft = session.meals.active_mut();
            draft.meal_type = meal_type;
            draft.meal_source = source;

            match meal_id {
                Some(id) => {
                    let draft = session.meals.active().clone();
                    session.committer().update_meal(&id, &draft).await?;
                }
                None => {
                    let report = session.commit_meals().await?;
                    report.batch.ensure_success()?;
                    print_json(&report.batch)?;
                    if !report.suggestions.is_empty() {
                        println!("Consider restocking:");
                        print_json(&report.suggestions)?;
                    }
                }
            }
            Ok(())
        }
        Command::EstimateMeal { name } => {
            session.estimate_meal(&name).await?;
            print_json(session.meals.active())
        }
        Command::ParseQuantity { .. } => Ok(()),
    }
}

async fn scan(session: &mut IngestSession, image: PathBuf, mode: ScanMode, commit: bool) -> CliResult {
    let bytes = tokio::fs::read(&image).await?;
    let file_name = image
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.jpg")
        .to_string();

    // Ctrl-C abandons polling; the server job is left alone.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let count = session.scan(&bytes, &file_name, mode, &cancel).await?;
    tracing::info!(count, "Scan complete");

    match mode {
        ScanMode::Meal => print_json(&session.meals.commit_entries())?,
        ScanMode::Bill | ScanMode::SingleItem => print_json(&session.stock.commit_entries())?,
    }

    if !commit {
        return Ok(());
    }

    match mode {
        ScanMode::Meal => {
            let report = session.commit_meals().await?;
            print_json(&report.batch)?;
            if !report.suggestions.is_empty() {
                println!("Consider restocking:");
                print_json(&report.suggestions)?;
            }
            report.batch.ensure_success()?;
        }
        ScanMode::Bill | ScanMode::SingleItem => {
            let result = session.commit_stock().await?;
            print_json(&result)?;
            result.ensure_success()?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
