use std::{str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::error;

use rmp_backoffice::{
    audit::ActivityLogSink,
    config::{self, AppConfig},
    db,
    events::{process_events, EventHandler, EventSender, LoggingEventHandler},
    metrics,
    models::{Actor, Order, OrderStatus, OrderView, UserRole},
    reports::{OrderReport, OrderReportService, ReportPeriod},
    repositories::OrderRepository,
    services::{OrderLifecycleService, RejectPaymentCommand, SubmitPaymentCommand},
};

#[derive(Parser)]
#[command(
    name = "rmp-backoffice",
    about = "Operator CLI for order status, payment review and reports",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(flatten)]
    actor: ActorArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ActorArgs {
    /// User id recorded on audit entries
    #[arg(long = "as-user", global = true)]
    user_id: Option<i32>,
    #[arg(long, global = true, value_enum, default_value_t = RoleArg::Admin)]
    role: RoleArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Customer,
    Wholesaler,
    Admin,
    SuperAdmin,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Customer => UserRole::Customer,
            RoleArg::Wholesaler => UserRole::Wholesaler,
            RoleArg::Admin => UserRole::Admin,
            RoleArg::SuperAdmin => UserRole::SuperAdmin,
        }
    }
}

impl ActorArgs {
    fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role.into(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Show an order with its allowed next actions
    Show { order_id: i32 },
    /// Move an order to another status
    Transition {
        order_id: i32,
        #[arg(value_parser = parse_status)]
        status: OrderStatus,
        /// Fail if the order's version differs
        #[arg(long)]
        expected_version: Option<i32>,
    },
    /// Record a proof of payment
    SubmitPayment {
        order_id: i32,
        #[arg(long)]
        proof: Option<String>,
        #[arg(long)]
        reference: Option<String>,
    },
    ApprovePayment { order_id: i32 },
    RejectPayment {
        order_id: i32,
        #[arg(long)]
        reason: String,
    },
    /// Summarise orders for a period
    Report {
        #[arg(long, value_parser = parse_period, default_value = "daily")]
        period: ReportPeriod,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Print counters collected during this run
    Metrics,
}

fn parse_status(raw: &str) -> Result<OrderStatus, String> {
    OrderStatus::from_str(raw).map_err(|_| format!("'{}' is not an order status", raw))
}

fn parse_period(raw: &str) -> Result<ReportPeriod, String> {
    ReportPeriod::from_str(raw).map_err(|_| format!("'{}' is not a report period", raw))
}

struct CliContext {
    config: AppConfig,
    db: Arc<db::DbPool>,
    lifecycle: OrderLifecycleService,
    reports: OrderReportService,
    events_task: JoinHandle<()>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.json_logs());
        metrics::register_metrics();

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        if config.auto_migrate {
            db::run_migrations(&db_pool).await.map_err(|e| {
                error!("Failed running migrations: {}", e);
                e
            })?;
        }
        let db = Arc::new(db_pool);

        let (event_sender, event_rx) = EventSender::channel(config.event_channel_capacity);
        let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(LoggingEventHandler)];
        let events_task = tokio::spawn(process_events(event_rx, handlers));

        let store = Arc::new(OrderRepository::new(db.clone()));
        let lifecycle =
            OrderLifecycleService::new(store.clone(), Arc::new(ActivityLogSink::new(db.clone())))
                .with_events(event_sender)
                .with_senior_discount_rate(config.senior_discount_rate);
        let reports = OrderReportService::new(store);

        Ok(Self {
            config,
            db,
            lifecycle,
            reports,
            events_task,
        })
    }

    /// Closes the event channel and waits for queued events to be handled.
    async fn shutdown(self) {
        let Self {
            lifecycle,
            events_task,
            ..
        } = self;
        drop(lifecycle);
        if let Err(e) = events_task.await {
            error!("Event processor stopped abnormally: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let actor = cli.actor.actor();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied to {}", context.config.database_url);
        }
        Commands::Show { order_id } => {
            let view = context
                .lifecycle
                .view(order_id)
                .await
                .with_context(|| format!("failed to load order {}", order_id))?;
            render_view(&view, cli.json)?;
        }
        Commands::Transition {
            order_id,
            status,
            expected_version,
        } => {
            let order = context
                .lifecycle
                .apply_transition(order_id, status, &actor, expected_version)
                .await
                .with_context(|| format!("failed to move order {} to {}", order_id, status))?;
            render_order(&order, cli.json)?;
        }
        Commands::SubmitPayment {
            order_id,
            proof,
            reference,
        } => {
            let command = SubmitPaymentCommand {
                order_id,
                proof_path: proof,
                reference,
            };
            let order = context
                .lifecycle
                .submit_payment_proof(command, &actor)
                .await
                .with_context(|| format!("failed to submit payment for order {}", order_id))?;
            render_order(&order, cli.json)?;
        }
        Commands::ApprovePayment { order_id } => {
            let order = context
                .lifecycle
                .approve_payment(order_id, &actor)
                .await
                .with_context(|| format!("failed to approve payment for order {}", order_id))?;
            render_order(&order, cli.json)?;
        }
        Commands::RejectPayment { order_id, reason } => {
            let order = context
                .lifecycle
                .reject_payment(RejectPaymentCommand { order_id, reason }, &actor)
                .await
                .with_context(|| format!("failed to reject payment for order {}", order_id))?;
            render_order(&order, cli.json)?;
        }
        Commands::Report { period, start, end } => {
            let report = context
                .reports
                .order_report(period, Utc::now(), start, end)
                .await
                .context("failed to build order report")?;
            render_report(&report, cli.json)?;
        }
        Commands::Metrics => print!("{}", metrics::gather_text()),
    }

    context.shutdown().await;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_view(view: &OrderView, json: bool) -> Result<()> {
    if json {
        return print_json(view);
    }
    println!(
        "Order {} • {} • payment {} ({}) • total {}",
        view.invoice_number,
        view.status_label,
        view.payment_status,
        view.payment_method,
        view.total_amount
    );
    if view.next_status_options.is_empty() {
        println!("  no further status changes");
    } else if !view.status_actions_offered {
        println!("  status actions wait for payment approval");
    }
    for option in &view.next_status_options {
        println!("  - {} ({})", option.label, option.status);
    }
    Ok(())
}

fn render_order(order: &Order, json: bool) -> Result<()> {
    if json {
        return print_json(&OrderView::from(order));
    }
    println!(
        "Order {} • {} • payment {} • version {}",
        order.invoice_number(),
        order.status_label(),
        order.payment_status.label(),
        order.version
    );
    Ok(())
}

fn render_report(report: &OrderReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!(
        "{} ({} to {}): {} orders, revenue {}",
        report.period_label,
        report.start.format("%Y-%m-%d"),
        report.end.format("%Y-%m-%d"),
        report.total_orders,
        report.total_revenue
    );
    for (day, stats) in &report.daily_stats {
        println!("  {}  {:>4} orders  {:>12}", day, stats.orders, stats.revenue);
    }
    Ok(())
}
