use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use bagworks_erp::{
    auth::{rbac, Actor},
    config, db,
    errors::ServiceError,
    events,
    services::ServiceFactory,
};

#[derive(Parser)]
#[command(name = "bagworks", about = "Bagworks ERP maintenance commands", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Show a customer's running balance
    Balance {
        customer_id: i64,
        #[arg(long, action = ArgAction::SetTrue, help = "Also print the balance journal")]
        history: bool,
    },
    /// Compare stored customer balances with the journal and live sales
    Reconcile {
        #[arg(long, help = "Only reconcile this customer")]
        customer: Option<i64>,
    },
    /// List completed productions that have not been sold
    Unsold,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    db::check_connection(&pool)
        .await
        .context("database did not answer")?;

    if matches!(cli.command, Commands::Migrate) || cfg.auto_migrate {
        db::run_migrations(&pool)
            .await
            .context("failed running migrations")?;
        info!("Migrations applied");
    }

    let (event_sender, event_rx) = events::channel(cfg.event_channel_capacity);
    let event_loop = tokio::spawn(events::process_events(event_rx));

    let factory = ServiceFactory::new(Arc::new(pool), &cfg, Some(event_sender));
    let outcome = run(&cli, &factory).await;

    // Closing the last sender lets the event loop drain and stop.
    drop(factory);
    if let Err(e) = event_loop.await {
        warn!("Event loop ended abnormally: {}", e);
    }

    if let Err(err) = &outcome {
        if let Some(service_err) = err.downcast_ref::<ServiceError>() {
            error!(
                status = service_err.status_code().as_u16(),
                "{}",
                service_err.response_message()
            );
        }
    }
    outcome
}

async fn run(cli: &Cli, factory: &ServiceFactory) -> Result<()> {
    let operator = Actor::new(0, &[rbac::SUPER_ADMIN]);

    match cli.command {
        Commands::Migrate => {
            if !cli.json {
                println!("Database is up to date");
            }
        }
        Commands::Balance {
            customer_id,
            history,
        } => {
            let customers = factory.customer_service();
            let customer = customers.get_customer(customer_id).await?;
            let entries = if history {
                customers.balance_history(customer_id).await?
            } else {
                Vec::new()
            };

            if cli.json {
                print_json(&serde_json::json!({
                    "customer": customer,
                    "history": entries,
                }))?;
            } else {
                println!(
                    "{} {} balance: {}",
                    customer.code, customer.name, customer.current_balance
                );
                for entry in entries {
                    println!(
                        "  {} {:>12} -> {:>12}  {}",
                        entry.created_at.format("%Y-%m-%d %H:%M"),
                        entry.delta,
                        entry.balance_after,
                        entry.reason
                    );
                }
            }
        }
        Commands::Reconcile { customer } => {
            let customers = factory.customer_service();
            let reports = match customer {
                Some(id) => vec![customers.reconcile(id).await?],
                None => customers.reconcile_all().await?,
            };
            let drifting = reports.iter().filter(|r| !r.is_consistent()).count();

            if cli.json {
                print_json(&reports)?;
            } else {
                for report in &reports {
                    let marker = if report.is_consistent() { "ok" } else { "DRIFT" };
                    println!(
                        "customer {:>6}  stored {:>12}  journal {:>12}  documents {:>12}  {}",
                        report.customer_id,
                        report.stored_balance,
                        report.journal_balance,
                        report.document_balance,
                        marker
                    );
                }
            }
            if drifting > 0 {
                warn!(drifting, "Customer balances out of line with their documents");
            }
        }
        Commands::Unsold => {
            let productions = factory
                .production_service()
                .list_completed_unsold(&operator)
                .await?;
            if cli.json {
                print_json(&productions)?;
            } else {
                for production in productions {
                    println!(
                        "{}  quotation {}  final cost {}",
                        production.code, production.quotation_id, production.final_cost
                    );
                }
            }
        }
    }

    Ok(())
}
