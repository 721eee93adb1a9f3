use cartflow::application::engine::{CheckoutEngine, Ports};
use cartflow::config::CheckoutConfig;
use cartflow::domain::ids::{IntentId, SubscriptionId, UserId};
use cartflow::domain::money::Currency;
use cartflow::domain::ports::{SharedCatalog, SharedClock, SharedProcessor};
use cartflow::error::CheckoutError;
use cartflow::infrastructure::clock::{FixedClock, SystemClock};
use cartflow::infrastructure::in_memory::InMemoryCatalog;
use cartflow::infrastructure::processor::SimulatedProcessor;
#[cfg(feature = "storage-rocksdb")]
use cartflow::infrastructure::rocksdb::RocksDBStore;
use cartflow::interfaces::csv::catalog_reader::CatalogReader;
use cartflow::interfaces::csv::command_reader::{Command, CommandReader, SubscriptionRef};
use cartflow::interfaces::csv::order_writer::OrderWriter;
use cartflow::telemetry;
use chrono::{DateTime, Utc};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Commands CSV file to replay (`type,user,subject,value`)
    input: PathBuf,

    /// Product catalog CSV (`product,name,price,stock`)
    #[arg(long, env = "CARTFLOW_CATALOG")]
    catalog: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "CARTFLOW_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Currency code for new payment intents
    #[arg(long)]
    currency: Option<String>,

    /// Flat tax rate applied at checkout, e.g. 0.12
    #[arg(long)]
    tax_rate: Option<Decimal>,

    /// Consecutive failed renewals before a subscription is paused
    #[arg(long)]
    failure_threshold: Option<u32>,

    /// Freeze the clock at this RFC 3339 instant; `tick` rows move it forward
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Decline off-session renewal charges for this user (repeatable)
    #[arg(long = "decline-user")]
    decline_users: Vec<u64>,
}

impl Cli {
    fn config(&self) -> cartflow::error::Result<CheckoutConfig> {
        let mut config = CheckoutConfig::from_env()?;
        if let Some(code) = &self.currency {
            config.currency = Currency::new(code)?;
        }
        if let Some(rate) = self.tax_rate {
            config.tax_rate = rate;
        }
        if let Some(threshold) = self.failure_threshold {
            config.renewal_failure_threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }
}

fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    let file = File::open(path).into_diagnostic()?;
    let mut products = Vec::new();
    for product in CatalogReader::new(file).products() {
        match product {
            Ok(product) => products.push(product),
            Err(e) => warn!(error = %e, "Skipping catalog row"),
        }
    }
    info!(products = products.len(), "Catalog loaded");
    Ok(InMemoryCatalog::with_products(products))
}

#[cfg(feature = "storage-rocksdb")]
fn build_ports(
    db_path: Option<PathBuf>,
    catalog: SharedCatalog,
    processor: SharedProcessor,
    clock: SharedClock,
) -> Result<Ports> {
    let ports = Ports::in_memory(catalog, processor, clock);
    let Some(path) = db_path else {
        return Ok(ports);
    };
    let store = RocksDBStore::open(&path).into_diagnostic()?;
    info!(path = %path.display(), "Using RocksDB storage");
    Ok(Ports {
        carts: Arc::new(store.clone()),
        intents: Arc::new(store.clone()),
        orders: Arc::new(store.clone()),
        subscriptions: Arc::new(store.clone()),
        penalties: Arc::new(store),
        ..ports
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_ports(
    db_path: Option<PathBuf>,
    catalog: SharedCatalog,
    processor: SharedProcessor,
    clock: SharedClock,
) -> Result<Ports> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(Ports::in_memory(catalog, processor, clock))
}

/// Replays commands against the engine, remembering each user's latest checkout.
struct Replay {
    engine: CheckoutEngine,
    fixed_clock: Option<Arc<FixedClock>>,
    latest_intent: HashMap<UserId, IntentId>,
}

impl Replay {
    async fn subscription_id(
        &self,
        user: UserId,
        reference: SubscriptionRef,
    ) -> cartflow::error::Result<SubscriptionId> {
        match reference {
            SubscriptionRef::Id(id) => Ok(id),
            SubscriptionRef::Product(product) => self
                .engine
                .list_subscriptions(user)
                .await?
                .into_iter()
                .rev()
                .find(|s| s.product == product)
                .map(|s| s.id)
                .ok_or_else(|| CheckoutError::not_found("subscription", &product)),
        }
    }

    async fn apply(&mut self, command: Command) -> cartflow::error::Result<()> {
        match command {
            Command::Add {
                user,
                product,
                quantity,
            } => {
                self.engine.add_item(user, &product, quantity).await?;
            }
            Command::Update {
                user,
                product,
                quantity,
            } => {
                self.engine.update_quantity(user, &product, quantity).await?;
            }
            Command::Remove { user, product } => {
                self.engine.remove_item(user, &product).await?;
            }
            Command::Checkout { user } => {
                let intent = self.engine.create_payment_intent(user).await?;
                self.latest_intent.insert(user, intent.id);
            }
            Command::Confirm {
                user,
                intent,
                outcome,
            } => {
                let intent = match intent {
                    Some(id) => id,
                    None => self
                        .latest_intent
                        .get(&user)
                        .cloned()
                        .ok_or_else(|| CheckoutError::not_found("checkout for user", user))?,
                };
                self.engine.confirm_payment(&intent, outcome).await?;
            }
            Command::Subscribe {
                user,
                product,
                interval_days,
            } => {
                self.engine
                    .create_subscription(user, &product, interval_days)
                    .await?;
            }
            Command::Pause { user, subscription } => {
                let id = self.subscription_id(user, subscription).await?;
                self.engine.pause_subscription(user, id).await?;
            }
            Command::Resume { user, subscription } => {
                let id = self.subscription_id(user, subscription).await?;
                self.engine.resume_subscription(user, id).await?;
            }
            Command::Tick { now } => {
                if let Some(clock) = &self.fixed_clock {
                    clock.set(now);
                }
                self.engine.tick(now).await?;
            }
            Command::Penalty {
                user,
                reason,
                amount,
            } => {
                self.engine.apply_penalty(user, amount, &reason).await?;
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();
    let config = cli.config().into_diagnostic()?;

    let catalog: SharedCatalog = Arc::new(load_catalog(&cli.catalog)?);
    let processor: SharedProcessor = Arc::new(SimulatedProcessor::declining(
        cli.decline_users.iter().copied().map(UserId),
    ));
    let fixed_clock = cli.now.map(|at| Arc::new(FixedClock::new(at)));
    let clock: SharedClock = match &fixed_clock {
        Some(clock) => clock.clone(),
        None => Arc::new(SystemClock),
    };

    let ports = build_ports(cli.db_path.clone(), catalog, processor, clock)?;
    let engine = CheckoutEngine::new(ports, config).into_diagnostic()?;
    let mut replay = Replay {
        engine,
        fixed_clock,
        latest_intent: HashMap::new(),
    };

    // Process commands
    let file = File::open(&cli.input).into_diagnostic()?;
    for (index, command) in CommandReader::new(file).commands().enumerate() {
        let row = index + 2;
        match command {
            Ok(command) => {
                if let Err(e) = replay.apply(command).await {
                    match e {
                        CheckoutError::Persistence(_) => error!(row, error = %e, "Command failed"),
                        _ => warn!(row, error = %e, "Command rejected"),
                    }
                }
            }
            Err(e) => warn!(row, error = %e, "Skipping malformed command"),
        }
    }

    // Output final state
    let orders = replay.engine.all_orders().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(orders).into_diagnostic()?;

    Ok(())
}
