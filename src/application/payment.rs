//! Payment confirmation loop.
//!
//! After a ticket is created the backend returns an invoice. A [`PaymentFlow`]
//! polls the invoice's status on a fixed interval until it is paid, the flow is
//! cancelled, the policy's timeout elapses, or the backend answers with an error
//! that retrying cannot fix.

use crate::domain::ports::{NoticeId, NoticeKind, NotifierRef, TicketApiRef};
use crate::domain::ticket::Invoice;
use crate::error::TicketError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const WAITING_MESSAGE: &str = "Waiting for payment...";
pub const PAID_MESSAGE: &str = "Sats received, thanks!";
pub const TIMED_OUT_MESSAGE: &str = "Payment not received in time";

/// How often and for how long an invoice is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    pub interval_ms: u64,
    /// `None` polls until paid or cancelled.
    pub timeout_secs: Option<u64>,
    /// Consecutive transient failures tolerated before giving up. `0` never gives up.
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            timeout_secs: Some(30 * 60),
            max_consecutive_errors: 10,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    InvoiceRequested,
    /// Still waiting; `checks` status requests have been answered so far.
    AwaitingPayment { checks: u32 },
    Paid,
    Cancelled,
    TimedOut,
    Failed,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Paid | FlowState::Cancelled | FlowState::TimedOut | FlowState::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid,
    Cancelled,
    TimedOut,
    Failed { reason: String },
}

impl PaymentOutcome {
    pub fn state(&self) -> FlowState {
        match self {
            PaymentOutcome::Paid => FlowState::Paid,
            PaymentOutcome::Cancelled => FlowState::Cancelled,
            PaymentOutcome::TimedOut => FlowState::TimedOut,
            PaymentOutcome::Failed { .. } => FlowState::Failed,
        }
    }
}

/// Dismisses the waiting notice when dropped, whichever way the loop exits.
struct WaitingNotice {
    notifier: NotifierRef,
    id: NoticeId,
}

impl WaitingNotice {
    fn show(notifier: NotifierRef) -> Self {
        let id = notifier.show_waiting(WAITING_MESSAGE);
        Self { notifier, id }
    }
}

impl Drop for WaitingNotice {
    fn drop(&mut self) {
        self.notifier.dismiss(self.id);
    }
}

/// Handle to one running confirmation loop.
///
/// The loop runs on its own task and is the only poller of its invoice.
/// Dropping the handle cancels it.
pub struct PaymentFlow {
    invoice: Invoice,
    cancel: watch::Sender<bool>,
    state: watch::Receiver<FlowState>,
    settled: watch::Receiver<Option<PaymentOutcome>>,
    task: Option<JoinHandle<PaymentOutcome>>,
    outcome: Option<PaymentOutcome>,
}

impl PaymentFlow {
    /// Shows the waiting notice and starts polling `invoice`.
    pub fn start(
        api: TicketApiRef,
        notifier: NotifierRef,
        invoice: Invoice,
        policy: PollPolicy,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(FlowState::AwaitingPayment { checks: 0 });
        let (settled_tx, settled_rx) = watch::channel(None);
        let waiting = WaitingNotice::show(notifier.clone());
        let poller = Poller {
            api,
            notifier,
            payment_hash: invoice.payment_hash.clone(),
            policy,
            cancel: cancel_rx,
            state: state_tx,
            settled: settled_tx,
        };
        info!(payment_hash = %invoice.payment_hash, "awaiting payment");
        let task = tokio::spawn(poller.run(waiting));
        Self {
            invoice,
            cancel: cancel_tx,
            state: state_rx,
            settled: settled_rx,
            task: Some(task),
            outcome: None,
        }
    }

    pub fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    pub fn state(&self) -> FlowState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.clone()
    }

    /// How the loop ended, once it has, without waiting for it.
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        self.outcome
            .clone()
            .or_else(|| self.settled.borrow().clone())
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some() || self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Waits for the loop to end and returns how it ended.
    ///
    /// Cancel-safe: if this future is dropped the loop keeps running and can
    /// still be awaited or cancelled later.
    pub async fn finished(&mut self) -> PaymentOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let outcome = match self.task.as_mut() {
            Some(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) => PaymentOutcome::Failed {
                    reason: format!("payment check task ended abnormally: {e}"),
                },
            },
            None => PaymentOutcome::Cancelled,
        };
        self.task = None;
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Stops polling and waits for the loop to wind down.
    ///
    /// Returns the real outcome if the loop had already ended on its own.
    pub async fn cancel(&mut self) -> PaymentOutcome {
        let _ = self.cancel.send(true);
        self.finished().await
    }
}

impl Drop for PaymentFlow {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

struct Poller {
    api: TicketApiRef,
    notifier: NotifierRef,
    payment_hash: String,
    policy: PollPolicy,
    cancel: watch::Receiver<bool>,
    state: watch::Sender<FlowState>,
    settled: watch::Sender<Option<PaymentOutcome>>,
}

impl Poller {
    async fn run(mut self, waiting: WaitingNotice) -> PaymentOutcome {
        let outcome = self.poll().await;
        drop(waiting);

        match &outcome {
            PaymentOutcome::Paid => self.notifier.notify(NoticeKind::Positive, PAID_MESSAGE),
            PaymentOutcome::TimedOut => self.notifier.notify(NoticeKind::Warning, TIMED_OUT_MESSAGE),
            PaymentOutcome::Failed { reason } => self.notifier.notify(NoticeKind::Negative, reason),
            PaymentOutcome::Cancelled => {}
        }
        info!(payment_hash = %self.payment_hash, ?outcome, "payment flow finished");
        self.state.send_replace(outcome.state());
        self.settled.send_replace(Some(outcome.clone()));
        outcome
    }

    async fn poll(&mut self) -> PaymentOutcome {
        let period = self.policy.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = self.policy.timeout().map(|t| Instant::now() + t);

        let mut checks = 0u32;
        let mut consecutive_errors = 0u32;

        loop {
            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.changed() => return PaymentOutcome::Cancelled,
                _ = expired => {
                    warn!(payment_hash = %self.payment_hash, checks, "payment timed out");
                    return PaymentOutcome::TimedOut;
                }
                _ = ticker.tick() => {}
            }

            let checked = tokio::select! {
                biased;
                _ = self.cancel.changed() => return PaymentOutcome::Cancelled,
                checked = self.api.payment_status(&self.payment_hash) => checked,
            };
            checks += 1;

            match checked {
                Ok(status) if status.paid => return PaymentOutcome::Paid,
                Ok(_) => {
                    consecutive_errors = 0;
                    debug!(payment_hash = %self.payment_hash, checks, "not paid yet");
                }
                Err(e) if e.is_transient() => {
                    consecutive_errors += 1;
                    warn!(payment_hash = %self.payment_hash, consecutive_errors, error = %e, "status check failed");
                    let budget = self.policy.max_consecutive_errors;
                    if budget > 0 && consecutive_errors >= budget {
                        return PaymentOutcome::Failed {
                            reason: format!("Could not check payment status: {e}"),
                        };
                    }
                }
                Err(e) => return failed(e),
            }
            self.state.send_replace(FlowState::AwaitingPayment { checks });
        }
    }
}

fn failed(e: TicketError) -> PaymentOutcome {
    PaymentOutcome::Failed {
        reason: format!("Payment check failed: {e}"),
    }
}
