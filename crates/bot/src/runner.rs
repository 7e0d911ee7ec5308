use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::events::{default_dispatcher, HandlerResult, NoopConversationService, Outbound, Update, UpdateDispatcher};
use crate::transport::{BotTransport, NoopTransport, ReconnectPolicy, TransportError};

/// Pulls updates off the transport and executes the dispatcher's actions in
/// arrival order, reconnecting with backoff when the transport drops.
pub struct PollingRunner {
    transport: Arc<dyn BotTransport>,
    dispatcher: UpdateDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl Default for PollingRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopTransport),
            dispatcher: default_dispatcher(Arc::new(NoopConversationService)),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn BotTransport>,
        dispatcher: UpdateDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        let mut failures = 0_u32;
        loop {
            let mut progressed = false;
            match self.connect_and_pump(failures, &mut progressed).await {
                Ok(()) => return Ok(()),
                Err(TransportError::Unauthorized(reason)) => {
                    warn!(
                        event_name = "runner.unauthorized",
                        error = %reason,
                        "bot token rejected; polling stopped"
                    );
                    return Ok(());
                }
                Err(transport_error) => {
                    if progressed {
                        failures = 0;
                    }
                    warn!(
                        event_name = "runner.transport_failed",
                        attempt = failures,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "bot transport failed"
                    );

                    if failures >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "bot transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(failures);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    failures += 1;
                }
            }
        }
    }

    async fn connect_and_pump(&self, attempt: u32, progressed: &mut bool) -> Result<(), TransportError> {
        info!(attempt, "opening bot transport");
        self.transport.connect().await?;
        info!(event_name = "runner.connected", attempt, "bot transport connected");

        loop {
            let Some(update) = self.transport.next_update().await? else {
                info!(attempt, "bot transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            *progressed = true;

            info!(
                event_name = "runner.update_received",
                update_id = update.update_id,
                update_type = ?update.kind.update_type(),
                "received update"
            );
            self.handle(&update).await;
        }
    }

    async fn handle(&self, update: &Update) {
        match self.dispatcher.dispatch(update).await {
            Ok(HandlerResult::Responded(actions)) => {
                for action in actions {
                    self.execute(update.update_id, action).await;
                }
            }
            Ok(HandlerResult::Ignored) => {
                debug!(update_id = update.update_id, "update produced no output");
            }
            Err(error) => {
                warn!(
                    update_id = update.update_id,
                    error = %error,
                    "update dispatch failed; continuing polling loop"
                );
            }
        }
    }

    async fn execute(&self, update_id: i64, action: Outbound) {
        let result = match &action {
            Outbound::Send { chat, prompt } => self.transport.send_message(*chat, prompt).await,
            Outbound::Edit { chat, message_id, prompt } => {
                self.transport.edit_message(*chat, *message_id, prompt).await
            }
            Outbound::Answer { callback_id, ack } => {
                self.transport.answer_callback(callback_id, ack.as_ref()).await
            }
        };

        if let Err(error) = result {
            warn!(
                event_name = "runner.delivery_failed",
                update_id,
                error = %error,
                "outbound call failed"
            );
        }
    }
}
