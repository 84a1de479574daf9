use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the receiver is gone.
    /// Used after a commit, where the write must not be reported as failed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Domain events published after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    QuotationCreated {
        quotation_id: i64,
        customer_id: i64,
        total: Decimal,
    },
    QuotationUpdated(i64),
    QuotationStatusChanged {
        quotation_id: i64,
        old_status: String,
        new_status: String,
    },
    QuotationDeleted(i64),

    ProductionCreated {
        production_id: i64,
        quotation_id: i64,
    },
    ProductionStatusChanged {
        production_id: i64,
        old_status: String,
        new_status: String,
    },
    ProductionDeleted {
        production_id: i64,
        quotation_id: i64,
    },

    SaleCreated {
        sale_id: i64,
        customer_id: i64,
        due_amount: Decimal,
    },
    SaleUpdated(i64),
    SaleDeleted(i64),
    PaymentReceived {
        payment_id: i64,
        payable_type: String,
        payable_id: i64,
        amount: Decimal,
    },

    PurchaseCreated {
        purchase_id: i64,
        supplier_id: i64,
        due: Decimal,
    },

    CustomerBalanceAdjusted {
        customer_id: i64,
        delta: Decimal,
        balance_after: Decimal,
        reason: String,
    },
}

/// Drains the event channel and logs each event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::CustomerBalanceAdjusted {
                customer_id,
                delta,
                balance_after,
                reason,
            } => info!(
                customer_id,
                %delta,
                %balance_after,
                reason = reason.as_str(),
                "customer balance adjusted"
            ),
            other => info!("Received event: {:?}", other),
        }
    }

    info!("Event processing loop stopped");
}
