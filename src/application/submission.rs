use super::payment::{FlowState, PaymentFlow, PaymentOutcome, PollPolicy};
use crate::domain::form::PublicForm;
use crate::domain::ports::{NoticeKind, NotifierRef, TicketApiRef};
use crate::domain::pricing::amount_label;
use crate::domain::ticket::{CreateTicketData, Invoice};
use crate::error::{Result, TicketError};
use tracing::info;

/// The fields a submitter fills in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFields {
    pub name: String,
    pub email: String,
    pub text: String,
}

impl TicketFields {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty() && self.text.is_empty()
    }
}

/// View-model of the public submission page for one form.
///
/// Owns at most one [`PaymentFlow`]; submitting again cancels the previous one.
/// Accessors first take in the outcome of a flow that ended on its own, so a
/// settled invoice hides the invoice and clears the fields whether or not
/// anyone awaited it.
pub struct SubmissionView {
    api: TicketApiRef,
    notifier: NotifierRef,
    form: PublicForm,
    policy: PollPolicy,
    fields: TicketFields,
    flow: Option<PaymentFlow>,
    state: FlowState,
}

impl SubmissionView {
    pub fn new(
        api: TicketApiRef,
        notifier: NotifierRef,
        form: PublicForm,
        policy: PollPolicy,
    ) -> Self {
        Self {
            api,
            notifier,
            form,
            policy,
            fields: TicketFields::default(),
            flow: None,
            state: FlowState::Idle,
        }
    }

    pub fn form(&self) -> &PublicForm {
        &self.form
    }

    pub fn fields(&mut self) -> &TicketFields {
        self.reconcile();
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut TicketFields {
        self.reconcile();
        &mut self.fields
    }

    pub fn reset_form(&mut self) {
        self.fields = TicketFields::default();
    }

    /// Cost of the current text under the form's pricing rule.
    pub fn cost(&mut self) -> u64 {
        self.reconcile();
        self.form.pricing.cost(&self.fields.text)
    }

    pub fn amount_label(&mut self) -> String {
        amount_label(self.cost())
    }

    /// The invoice on display while a payment is awaited.
    pub fn invoice(&mut self) -> Option<&Invoice> {
        self.reconcile();
        self.flow.as_ref().map(|f| f.invoice())
    }

    pub fn state(&mut self) -> FlowState {
        self.reconcile();
        match &self.flow {
            Some(flow) => flow.state(),
            None => self.state,
        }
    }

    pub fn is_polling(&mut self) -> bool {
        self.reconcile();
        self.flow.as_ref().is_some_and(|f| !f.is_finished())
    }

    /// Creates the ticket, shows its invoice and starts waiting for payment.
    ///
    /// A submission that would cost nothing is refused before any request.
    /// A refused submission leaves a running flow untouched.
    pub async fn submit(&mut self) -> Result<Invoice> {
        let sats = self.cost();
        if sats == 0 {
            let err = TicketError::Validation("0 invoices not allowed.".to_string());
            self.notifier.notify(NoticeKind::Negative, &err.to_string());
            return Err(err);
        }

        if let Some(mut previous) = self.flow.take() {
            let outcome = previous.cancel().await;
            if outcome == PaymentOutcome::Paid {
                // Settled between the cost check and the cancel.
                self.apply(outcome);
                return Err(TicketError::Validation(
                    "The previous ticket was just paid".to_string(),
                ));
            }
        }

        let data = CreateTicketData {
            form: self.form.id.clone(),
            name: self.fields.name.clone(),
            email: self.fields.email.clone(),
            ltext: self.fields.text.clone(),
            sats,
        };
        self.state = FlowState::InvoiceRequested;
        let invoice = match self.api.create_ticket(&self.form.id, &data).await {
            Ok(invoice) => invoice,
            Err(e) => {
                self.state = FlowState::Idle;
                self.notifier.notify(NoticeKind::Negative, &e.to_string());
                return Err(e);
            }
        };
        info!(form = %self.form.id, sats, payment_hash = %invoice.payment_hash, "ticket created");

        self.flow = Some(PaymentFlow::start(
            self.api.clone(),
            self.notifier.clone(),
            invoice.clone(),
            self.policy,
        ));
        Ok(invoice)
    }

    /// Waits for the running flow to end and applies its outcome.
    ///
    /// Returns `None` when nothing is being awaited. Dropping the returned
    /// future leaves the flow running.
    pub async fn wait_for_payment(&mut self) -> Option<PaymentOutcome> {
        let outcome = self.flow.as_mut()?.finished().await;
        self.apply(outcome.clone());
        Some(outcome)
    }

    /// Closes the payment dialog before settlement.
    ///
    /// Polling stops and the fields are left as they were. If the invoice was
    /// paid in the meantime that outcome is applied instead.
    pub async fn close_dialog(&mut self) -> Option<PaymentOutcome> {
        let outcome = self.flow.as_mut()?.cancel().await;
        self.apply(outcome.clone());
        Some(outcome)
    }

    fn reconcile(&mut self) {
        if let Some(outcome) = self.flow.as_ref().and_then(PaymentFlow::outcome) {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: PaymentOutcome) {
        self.flow = None;
        self.state = outcome.state();
        if outcome == PaymentOutcome::Paid {
            self.reset_form();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::form::CreateFormData;
    use crate::domain::ports::TicketApi;
    use crate::domain::wallet::Wallet;
    use crate::infrastructure::in_memory::{ApiCall, InMemoryTicketApi};
    use crate::infrastructure::notify::RecordingNotifier;
    use std::sync::Arc;
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(3_000);

    async fn setup(
        flatrate: bool,
        amount: u64,
    ) -> (InMemoryTicketApi, Arc<RecordingNotifier>, SubmissionView) {
        let api = InMemoryTicketApi::new();
        api.add_wallet(Wallet::new("w1", "admin", "inkey")).await;
        let form = api
            .create_form(
                &CreateFormData {
                    wallet: "w1".into(),
                    name: "Letters".into(),
                    webhook: None,
                    description: "Write to us".into(),
                    flatrate,
                    amount,
                },
                &"admin".into(),
            )
            .await
            .unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let view = SubmissionView::new(
            Arc::new(api.clone()),
            notifier.clone(),
            PublicForm::from(&form),
            PollPolicy::default(),
        );
        (api, notifier, view)
    }

    fn fill(view: &mut SubmissionView, text: &str) {
        let fields = view.fields_mut();
        fields.name = "Ann".into();
        fields.email = "ann@example.com".into();
        fields.text = text.into();
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_word_submission_end_to_end() {
        let (api, notifier, mut view) = setup(false, 2).await;
        fill(&mut view, "hello brave new world");
        assert_eq!(view.amount_label(), "8 Sats to pay");

        let invoice = view.submit().await.unwrap();
        assert_eq!(api.tickets().await[0].sats, 8);
        assert_eq!(view.invoice(), Some(&invoice));
        assert!(view.is_polling());

        tokio::time::sleep(TICK + TICK / 2).await;
        assert_eq!(api.status_checks_for(&invoice.payment_hash).await, 1);
        assert_eq!(view.state(), FlowState::AwaitingPayment { checks: 1 });
        assert_eq!(view.fields().text, "hello brave new world");
        assert_eq!(notifier.count(NoticeKind::Positive), 0);

        api.settle(&invoice.payment_hash).await.unwrap();
        assert_eq!(view.wait_for_payment().await, Some(PaymentOutcome::Paid));

        assert!(view.invoice().is_none());
        assert!(view.fields().is_empty());
        assert_eq!(view.state(), FlowState::Paid);
        assert_eq!(notifier.count(NoticeKind::Positive), 1);
        assert_eq!(notifier.active_waiting(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_dialog_keeps_fields() {
        let (api, notifier, mut view) = setup(true, 100).await;
        fill(&mut view, "short note");
        let invoice = view.submit().await.unwrap();

        tokio::time::sleep(TICK / 2).await;
        assert_eq!(view.close_dialog().await, Some(PaymentOutcome::Cancelled));
        tokio::time::sleep(TICK * 5).await;

        assert_eq!(api.status_checks_for(&invoice.payment_hash).await, 0);
        assert_eq!(view.fields().text, "short note");
        assert!(view.invoice().is_none());
        assert_eq!(view.state(), FlowState::Cancelled);
        assert_eq!(notifier.active_waiting(), 0);
        assert_eq!(notifier.count(NoticeKind::Positive), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmitting_cancels_previous_flow() {
        let (api, notifier, mut view) = setup(true, 100).await;
        fill(&mut view, "first");
        let first = view.submit().await.unwrap();
        tokio::time::sleep(TICK + TICK / 2).await;

        let second = view.submit().await.unwrap();
        assert_ne!(first.payment_hash, second.payment_hash);
        assert_eq!(notifier.active_waiting(), 1);

        tokio::time::sleep(TICK * 4 + TICK / 2).await;
        assert_eq!(api.status_checks_for(&first.payment_hash).await, 1);
        assert_eq!(api.status_checks_for(&second.payment_hash).await, 4);

        api.settle(&first.payment_hash).await.unwrap();
        tokio::time::sleep(TICK * 2).await;
        assert_eq!(notifier.count(NoticeKind::Positive), 0);
        assert_eq!(view.invoice(), Some(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settlement_clears_view_without_awaiting() {
        let (api, notifier, mut view) = setup(false, 2).await;
        fill(&mut view, "hello brave new world");
        let invoice = view.submit().await.unwrap();

        api.settle(&invoice.payment_hash).await.unwrap();
        tokio::time::sleep(TICK * 3).await;

        assert_eq!(view.state(), FlowState::Paid);
        assert!(view.invoice().is_none());
        assert!(view.fields().is_empty());
        assert!(!view.is_polling());
        assert_eq!(notifier.count(NoticeKind::Positive), 1);
        assert_eq!(notifier.active_waiting(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmit_after_settlement_does_not_reuse_paid_text() {
        let (api, notifier, mut view) = setup(false, 2).await;
        fill(&mut view, "hello brave new world");
        let invoice = view.submit().await.unwrap();

        api.settle(&invoice.payment_hash).await.unwrap();
        tokio::time::sleep(TICK * 3).await;

        let err = view.submit().await.unwrap_err();
        assert!(matches!(err, TicketError::Validation(_)));
        assert_eq!(api.tickets().await.len(), 1);
        assert_eq!(notifier.count(NoticeKind::Positive), 1);
        assert_eq!(view.state(), FlowState::Paid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_resubmit_keeps_running_flow() {
        let (api, notifier, mut view) = setup(false, 2).await;
        fill(&mut view, "hello brave new world");
        let invoice = view.submit().await.unwrap();
        tokio::time::sleep(TICK + TICK / 2).await;

        view.fields_mut().text = "   ".into();
        assert!(view.submit().await.is_err());
        assert!(view.is_polling());
        assert_eq!(view.invoice(), Some(&invoice));
        assert_eq!(notifier.active_waiting(), 1);

        tokio::time::sleep(TICK).await;
        assert_eq!(api.status_checks_for(&invoice.payment_hash).await, 2);
        api.settle(&invoice.payment_hash).await.unwrap();
        assert_eq!(view.wait_for_payment().await, Some(PaymentOutcome::Paid));
        assert_eq!(notifier.count(NoticeKind::Positive), 1);
    }

    #[tokio::test]
    async fn test_zero_cost_submission_is_blocked() {
        let (api, notifier, mut view) = setup(false, 2).await;
        fill(&mut view, "   ");
        assert_eq!(view.amount_label(), "0 Sats to pay");

        let err = view.submit().await.unwrap_err();
        assert!(matches!(err, TicketError::Validation(_)));
        assert!(api.calls().await.iter().all(|c| !matches!(c, ApiCall::CreateTicket { .. })));
        assert_eq!(notifier.count(NoticeKind::Negative), 1);
        assert_eq!(view.state(), FlowState::Idle);
    }

    #[tokio::test]
    async fn test_flat_rate_empty_text_is_charged() {
        let (api, _notifier, mut view) = setup(true, 50).await;
        fill(&mut view, "");
        assert_eq!(view.amount_label(), "50 Sats to pay");

        view.submit().await.unwrap();
        assert_eq!(api.tickets().await[0].sats, 50);
        view.close_dialog().await;
    }

    #[tokio::test]
    async fn test_failed_ticket_creation_leaves_view_unchanged() {
        let (api, notifier, mut view) = setup(false, 1).await;
        fill(&mut view, "hello");
        api.set_outage(Some(503)).await;

        assert!(view.submit().await.is_err());
        assert!(view.invoice().is_none());
        assert!(!view.is_polling());
        assert_eq!(view.fields().text, "hello");
        assert_eq!(view.state(), FlowState::Idle);
        assert_eq!(notifier.count(NoticeKind::Negative), 1);
        assert_eq!(notifier.active_waiting(), 0);
    }

    #[tokio::test]
    async fn test_reset_form() {
        let (_api, _notifier, mut view) = setup(false, 1).await;
        fill(&mut view, "words");
        view.reset_form();
        assert!(view.fields().is_empty());
    }
}
