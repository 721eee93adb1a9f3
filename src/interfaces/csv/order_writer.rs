use crate::domain::order::Order;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRow {
    order: String,
    user: u64,
    intent: String,
    total: String,
    currency: String,
    status: String,
    items: String,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        let items = order
            .lines
            .iter()
            .map(|line| format!("{}:{}", line.product, line.quantity))
            .collect::<Vec<_>>()
            .join(";");
        Self {
            order: order.id.to_string(),
            user: order.user.0,
            intent: order.intent.to_string(),
            total: order.total.to_string(),
            currency: order.currency.to_string(),
            status: order.status.to_string(),
            items,
        }
    }
}

/// Writes orders as CSV: `order,user,intent,total,currency,status,items`.
///
/// `items` lists `<product>:<quantity>` pairs separated by `;`.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders(&mut self, orders: impl IntoIterator<Item = Order>) -> Result<()> {
        let mut wrote_any = false;
        for order in orders {
            self.writer.serialize(OrderRow::from(&order))?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record([
                "order", "user", "intent", "total", "currency", "status", "items",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
