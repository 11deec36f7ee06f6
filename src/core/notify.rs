//! Best-effort purchase notifications.
//!
//! A notice is sent after the ledger write has committed and never feeds back
//! into it: delivery failures are logged and dropped, nothing is retried and
//! nothing is rolled back.

use crate::{
    core::balance::{PostTransaction, TransactionResult},
    entities::customer,
    errors::Result,
};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Summary of a posted purchase, addressed to the customer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionNotice {
    /// External messaging reference of the recipient
    pub chat_id: i64,
    /// Name used in the greeting
    pub customer_name: String,
    /// Store the purchase happened at
    pub store_name: String,
    /// Check total
    pub check_amount: f64,
    /// Points spent as a discount
    pub points_redeemed: f64,
    /// Points credited
    pub points_earned: f64,
    /// Balance after the purchase
    pub new_balance: f64,
}

impl TransactionNotice {
    /// Builds the notice for a committed purchase.
    #[must_use]
    pub fn new(
        customer: &customer::Model,
        store_name: &str,
        request: &PostTransaction,
        result: &TransactionResult,
    ) -> Self {
        Self {
            chat_id: customer.chat_id,
            customer_name: customer.display_name(),
            store_name: store_name.to_string(),
            check_amount: request.check_amount,
            points_redeemed: request.points_to_redeem,
            points_earned: request.points_to_earn,
            new_balance: result.new_balance,
        }
    }

    /// Human-readable message body.
    #[must_use]
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("Hi {}, thanks for shopping at {}!", self.customer_name, self.store_name),
            format!("Check: {:.2}", self.check_amount),
        ];
        if self.points_redeemed > 0.0 {
            lines.push(format!("Points redeemed: -{:.2}", self.points_redeemed));
        }
        if self.points_earned > 0.0 {
            lines.push(format!("Points earned: +{:.2}", self.points_earned));
        }
        lines.push(format!("Balance: {:.2}", self.new_balance));
        lines.join("\n")
    }
}

/// Delivers notices to customers.
pub trait Notifier: Send + Sync {
    /// Delivers one notice. Errors are reported, never retried.
    fn notify(&self, notice: &TransactionNotice) -> impl Future<Output = Result<()>> + Send;
}

/// Notifier that only writes the notice to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, notice: &TransactionNotice) -> Result<()> {
        info!(chat_id = notice.chat_id, message = %notice.render(), "Transaction notice");
        Ok(())
    }
}

/// Sends `notice` on a detached task. The caller never waits for delivery;
/// the handle is returned for callers that want to.
pub fn dispatch_notice<N>(notifier: Arc<N>, notice: TransactionNotice) -> JoinHandle<()>
where
    N: Notifier + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notice).await {
            error!(chat_id = notice.chat_id, error = %e, "Failed to deliver transaction notice");
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::Error;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<TransactionNotice>>,
    }

    impl Notifier for RecordingNotifier {
        async fn notify(&self, notice: &TransactionNotice) -> Result<()> {
            self.sent.lock().await.push(notice.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        async fn notify(&self, _notice: &TransactionNotice) -> Result<()> {
            Err(Error::Notification {
                message: "recipient unreachable".to_string(),
            })
        }
    }

    fn notice() -> TransactionNotice {
        TransactionNotice {
            chat_id: 42,
            customer_name: "Test Customer".to_string(),
            store_name: "Main Street".to_string(),
            check_amount: 1000.0,
            points_redeemed: 200.0,
            points_earned: 40.0,
            new_balance: 2050.0,
        }
    }

    #[test]
    fn test_render_mentions_amounts() {
        let text = notice().render();
        assert!(text.contains("Test Customer"));
        assert!(text.contains("Main Street"));
        assert!(text.contains("-200.00"));
        assert!(text.contains("+40.00"));
        assert!(text.contains("Balance: 2050.00"));

        let earn_only = TransactionNotice {
            points_redeemed: 0.0,
            ..notice()
        };
        assert!(!earn_only.render().contains("redeemed"));
    }

    #[tokio::test]
    async fn test_dispatch_delivers() {
        let notifier = Arc::new(RecordingNotifier::default());
        dispatch_notice(Arc::clone(&notifier), notice()).await.unwrap();
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let handle = dispatch_notice(Arc::new(FailingNotifier), notice());
        assert!(handle.await.is_ok());

        let handle = dispatch_notice(Arc::new(LogNotifier), notice());
        assert!(handle.await.is_ok());
    }
}
