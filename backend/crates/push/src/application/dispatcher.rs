//! Notification Dispatcher
//!
//! Sends one request as a multicast and retries only the tokens that failed
//! for a retriable reason. The report lists every failed delivery of every
//! round; successes are not reported.

use std::sync::Arc;

use platform::breaker::{BreakerError, CircuitBreaker};

use crate::application::config::{FcmAppConfig, PushConfig};
use crate::application::credentials::CredentialRegistry;
use crate::domain::credential::{AccessCredential, CredentialSource};
use crate::domain::message::MulticastMessage;
use crate::domain::notification::PushNotification;
use crate::domain::provider::{MessagingProvider, TokenOutcome};
use crate::domain::response::PushResponse;
use crate::error::{PushError, PushResult};

pub struct Dispatcher<P, C> {
    provider: Arc<P>,
    credentials: Arc<CredentialRegistry<C>>,
    config: PushConfig,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl<P, C> Dispatcher<P, C>
where
    P: MessagingProvider + Sync,
    C: CredentialSource + Sync,
{
    pub fn new(provider: Arc<P>, credentials: Arc<CredentialRegistry<C>>, config: PushConfig) -> Self {
        Self {
            provider,
            credentials,
            config,
            breaker: None,
        }
    }

    /// Route provider calls through `breaker`
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn credentials(&self) -> &CredentialRegistry<C> {
        &self.credentials
    }

    /// Dispatch with the app registered under `request.app_id`
    pub async fn dispatch_for_app(
        &self,
        request: &PushNotification,
    ) -> PushResult<Vec<PushResponse>> {
        let app = self
            .credentials
            .app(&request.app_id)
            .await
            .ok_or_else(|| PushError::UnknownApp(request.app_id.clone()))?;
        self.dispatch(&app, request).await
    }

    /// Send `request`, retrying retriable failures
    ///
    /// Validation and credential errors are returned as `Err` with nothing
    /// sent. A failed provider call marks every token of that round as
    /// failed and ends the dispatch with `Ok`.
    pub async fn dispatch(
        &self,
        app: &FcmAppConfig,
        request: &PushNotification,
    ) -> PushResult<Vec<PushResponse>> {
        tracing::debug!(
            notif_id = %request.notif_id,
            app_id = %app.app_id,
            tokens = request.tokens.len(),
            "Dispatching push notification"
        );

        if let Err(err) = request.validate() {
            tracing::error!(notif_id = %request.notif_id, app_id = %app.app_id, error = %err, "Invalid push notification");
            return Err(err);
        }

        let max_retry = self.config.retry_budget(request.retry);
        let mut targets = request.targets();
        let mut responses = Vec::new();
        let mut round = 0;

        loop {
            let credential = match self.credentials.resolve(app).await {
                Ok(credential) => credential,
                Err(err) => {
                    tracing::error!(notif_id = %request.notif_id, app_id = %app.app_id, error = %err, "Failed to resolve FCM credential");
                    return Err(err);
                }
            };

            let message = MulticastMessage::from_notification(request, &targets);
            let outcomes = match self.send(&credential, &message).await {
                Ok(outcomes) => outcomes,
                Err(err) => {
                    tracing::error!(
                        notif_id = %request.notif_id,
                        app_id = %app.app_id,
                        tokens = targets.len(),
                        error = %err,
                        "Push send failed"
                    );
                    responses.extend(
                        targets
                            .iter()
                            .map(|token| PushResponse::failed(token.as_str(), &request.data, &err)),
                    );
                    return Ok(responses);
                }
            };

            let mut retriable = Vec::new();
            for (token, outcome) in targets.iter().zip(outcomes) {
                if let Err(err) = outcome {
                    if !err.is_unregistered() {
                        retriable.push(token.clone());
                    }
                    responses.push(PushResponse::failed(token.as_str(), &request.data, &err));
                }
            }

            if retriable.is_empty() || round >= max_retry {
                break;
            }

            round += 1;
            tracing::debug!(
                notif_id = %request.notif_id,
                round,
                tokens = retriable.len(),
                "Retrying failed tokens"
            );
            tokio::time::sleep(self.config.retry_delay).await;
            targets = retriable;
        }

        if responses.is_empty() {
            tracing::info!(notif_id = %request.notif_id, app_id = %app.app_id, "Push delivered");
        } else {
            tracing::warn!(
                notif_id = %request.notif_id,
                app_id = %app.app_id,
                failed = responses.len(),
                rounds = round + 1,
                "Push finished with failures"
            );
        }

        Ok(responses)
    }

    async fn send(
        &self,
        credential: &AccessCredential,
        message: &MulticastMessage,
    ) -> PushResult<Vec<TokenOutcome>> {
        let outcomes = match &self.breaker {
            Some(breaker) => breaker
                .call(|| self.provider.send_multicast(credential, message))
                .await
                .map_err(|err| match err {
                    BreakerError::Inner(e) => e,
                    BreakerError::Open | BreakerError::TooManyRequests => {
                        PushError::CircuitOpen(breaker.name().to_string())
                    }
                })?,
            None => self.provider.send_multicast(credential, message).await?,
        };

        let expected = message.target_count();
        if outcomes.len() != expected {
            return Err(PushError::Internal(format!(
                "provider returned {} outcomes for {} targets",
                outcomes.len(),
                expected
            )));
        }
        Ok(outcomes)
    }
}

impl<P, C> std::fmt::Debug for Dispatcher<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}
