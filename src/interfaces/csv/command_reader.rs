use crate::domain::ids::{IntentId, ProductId, SubscriptionId, UserId};
use crate::domain::intent::PaymentOutcome;
use crate::error::{CheckoutError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One raw row of a command file: `type, user, subject, value`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user: Option<u64>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Names a subscription either by id or by the product it renews.
///
/// Ids are generated at runtime, so a command file written ahead of time can
/// only refer to a subscription through its product.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionRef {
    Id(SubscriptionId),
    Product(ProductId),
}

/// A boundary call replayed against the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add {
        user: UserId,
        product: ProductId,
        quantity: i64,
    },
    Update {
        user: UserId,
        product: ProductId,
        quantity: i64,
    },
    Remove {
        user: UserId,
        product: ProductId,
    },
    Checkout {
        user: UserId,
    },
    /// `intent` is `None` when the row refers to the user's latest checkout.
    Confirm {
        user: UserId,
        intent: Option<IntentId>,
        outcome: PaymentOutcome,
    },
    Subscribe {
        user: UserId,
        product: ProductId,
        interval_days: i64,
    },
    Pause {
        user: UserId,
        subscription: SubscriptionRef,
    },
    Resume {
        user: UserId,
        subscription: SubscriptionRef,
    },
    Tick {
        now: DateTime<Utc>,
    },
    Penalty {
        user: UserId,
        reason: String,
        amount: Decimal,
    },
}

fn invalid(msg: impl Into<String>) -> CheckoutError {
    CheckoutError::InvalidArgument(msg.into())
}

impl CommandRecord {
    fn user(&self) -> Result<UserId> {
        self.user
            .map(UserId)
            .ok_or_else(|| invalid(format!("`{}` requires a user", self.kind)))
    }

    fn subject(&self) -> Result<&str> {
        self.subject
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid(format!("`{}` requires a subject", self.kind)))
    }

    fn value(&self) -> Result<&str> {
        self.value
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid(format!("`{}` requires a value", self.kind)))
    }

    fn integer(&self) -> Result<i64> {
        let raw = self.value()?;
        raw.parse()
            .map_err(|_| invalid(format!("`{}` expects an integer value, got {raw}", self.kind)))
    }

    fn subscription(&self) -> Result<SubscriptionRef> {
        let raw = self.subject()?;
        Ok(match raw.parse() {
            Ok(id) => SubscriptionRef::Id(id),
            Err(_) => SubscriptionRef::Product(ProductId::new(raw)),
        })
    }
}

impl TryFrom<CommandRecord> for Command {
    type Error = CheckoutError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let command = match record.kind.to_ascii_lowercase().as_str() {
            "add" => Self::Add {
                user: record.user()?,
                product: ProductId::new(record.subject()?),
                quantity: record.integer()?,
            },
            "update" => Self::Update {
                user: record.user()?,
                product: ProductId::new(record.subject()?),
                quantity: record.integer()?,
            },
            "remove" => Self::Remove {
                user: record.user()?,
                product: ProductId::new(record.subject()?),
            },
            "checkout" => Self::Checkout {
                user: record.user()?,
            },
            "confirm" => Self::Confirm {
                user: record.user()?,
                intent: record
                    .subject
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .map(IntentId::new),
                outcome: record.value()?.parse().map_err(invalid)?,
            },
            "subscribe" => Self::Subscribe {
                user: record.user()?,
                product: ProductId::new(record.subject()?),
                interval_days: record.integer()?,
            },
            "pause" => Self::Pause {
                user: record.user()?,
                subscription: record.subscription()?,
            },
            "resume" => Self::Resume {
                user: record.user()?,
                subscription: record.subscription()?,
            },
            "tick" => {
                let raw = record.value()?;
                let now = DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| invalid(format!("not an RFC 3339 instant: {raw} ({e})")))?;
                Self::Tick {
                    now: now.with_timezone(&Utc),
                }
            }
            "penalty" => {
                let raw = record.value()?;
                Self::Penalty {
                    user: record.user()?,
                    reason: record.subject()?.to_string(),
                    amount: raw
                        .parse()
                        .map_err(|_| invalid(format!("not a decimal amount: {raw}")))?,
                }
            }
            other => return Err(invalid(format!("unknown command type: {other}"))),
        };
        Ok(command)
    }
}

/// Reads boundary commands from a CSV source.
///
/// Whitespace is trimmed and short rows are accepted; a row that fails to
/// parse yields an error item and the stream carries on.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and converts rows, one `Result` per row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|result| result.map_err(CheckoutError::from).and_then(Command::try_from))
    }
}
