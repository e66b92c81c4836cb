use debt_ledger::{
    config::{app, database},
    core::{reconcile, settings, stats, status},
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load config.toml (first-run defaults)
    let app_config = app::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    // 4. Connect and make sure the tables exist
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. Seed settings and clients on first run
    app::seed_from_config(&db, &app_config).await?;

    // 6. Reconcile stored statuses as of the business's today
    let settings = settings::load_settings(&db).await?;
    let today = status::today(settings.offset());
    if let Some(last) = reconcile::get_last_reconciliation_date(&db).await? {
        info!("Previous reconciliation ran on {last}");
    }
    reconcile::run_reconciliation(&db, today, &settings).await?;

    // 7. Report the dashboard
    let dashboard = stats::load_dashboard(&db, today).await?;
    info!(
        "{} client(s) ({} active), {} debt(s) totalling {}",
        dashboard.total_clients,
        dashboard.active_clients,
        dashboard.total_debts,
        dashboard.total_value.format(&settings.currency)
    );
    info!(
        "Pending: {} ({}), overdue: {} ({}), paid: {} ({})",
        dashboard.pending.count,
        dashboard.pending.value.format(&settings.currency),
        dashboard.overdue.count,
        dashboard.overdue.value.format(&settings.currency),
        dashboard.paid.count,
        dashboard.paid.value.format(&settings.currency)
    );

    Ok(())
}
