//! Unit tests for the push crate
//!
//! The dispatcher runs against scripted provider and credential doubles
//! with a zero retry delay.

#[cfg(test)]
mod mocks {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, Utc};

    use crate::{
        AccessCredential, CredentialSource, MessagingProvider, MulticastMessage, ProviderError,
        PushError, PushResult, TokenOutcome,
    };

    /// Succeeds for every token unless scripted otherwise
    #[derive(Default)]
    pub struct MockProvider {
        failures: Mutex<HashMap<String, VecDeque<ProviderError>>>,
        call_error: Mutex<Option<PushError>>,
        drop_outcome: Mutex<bool>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail `token` once per listed error, in order
        pub fn fail(self, token: &str, errors: Vec<ProviderError>) -> Self {
            self.failures
                .lock()
                .unwrap()
                .insert(token.to_string(), errors.into());
            self
        }

        pub fn fail_calls(self, err: PushError) -> Self {
            *self.call_error.lock().unwrap() = Some(err);
            self
        }

        /// Report one outcome fewer than there are targets
        pub fn short_reply(self) -> Self {
            *self.drop_outcome.lock().unwrap() = true;
            self
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MessagingProvider for MockProvider {
        async fn send_multicast(
            &self,
            _credential: &AccessCredential,
            message: &MulticastMessage,
        ) -> PushResult<Vec<TokenOutcome>> {
            let targets = match &message.topic {
                Some(topic) => vec![topic.clone()],
                None => message.tokens.clone(),
            };
            self.calls.lock().unwrap().push(targets.clone());

            if let Some(err) = self.call_error.lock().unwrap().clone() {
                return Err(err);
            }

            let mut failures = self.failures.lock().unwrap();
            let mut outcomes: Vec<TokenOutcome> = targets
                .iter()
                .map(|t| match failures.get_mut(t).and_then(VecDeque::pop_front) {
                    Some(err) => Err(err),
                    None => Ok(()),
                })
                .collect();

            if *self.drop_outcome.lock().unwrap() {
                outcomes.pop();
            }
            Ok(outcomes)
        }
    }

    pub struct MockCredentials {
        fetches: AtomicUsize,
        lifetime: Duration,
        fail: bool,
    }

    impl MockCredentials {
        pub fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                lifetime: Duration::hours(1),
                fail: false,
            }
        }

        /// Every fetched credential is already expired
        pub fn expired() -> Self {
            Self {
                lifetime: Duration::seconds(-1),
                ..Self::new()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        pub fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl CredentialSource for MockCredentials {
        async fn fetch(&self, app_id: &str, _credential_base64: &str) -> PushResult<AccessCredential> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PushError::Credential("token endpoint unreachable".to_string()));
            }
            Ok(AccessCredential {
                access_token: format!("token-for-{app_id}"),
                project_id: "crm-project".to_string(),
                expires_at: Utc::now() + self.lifetime,
            })
        }
    }
}

#[cfg(test)]
mod dispatcher_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::mocks::*;
    use crate::{
        CredentialRegistry, Dispatcher, FcmAppConfig, Platform, ProviderError, PushConfig,
        PushError, PushNotification, PushStatus,
    };

    type TestDispatcher = Dispatcher<MockProvider, MockCredentials>;

    fn config(max_retry: u32) -> PushConfig {
        PushConfig {
            max_retry,
            retry_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn app() -> FcmAppConfig {
        FcmAppConfig::new("crm-app", "eyJwcm9qZWN0X2lkIjoiY3JtIn0=")
    }

    fn setup(
        provider: MockProvider,
        credentials: MockCredentials,
        max_retry: u32,
    ) -> (Arc<MockProvider>, Arc<MockCredentials>, TestDispatcher) {
        let provider = Arc::new(provider);
        let credentials = Arc::new(credentials);
        let registry = Arc::new(CredentialRegistry::new(credentials.clone()));
        let dispatcher = Dispatcher::new(provider.clone(), registry, config(max_retry));
        (provider, credentials, dispatcher)
    }

    fn tokens(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("t{i}")).collect()
    }

    fn unavailable() -> ProviderError {
        ProviderError::Unavailable("try later".to_string())
    }

    #[tokio::test]
    async fn test_retries_only_retriable_failures() {
        let provider = MockProvider::new()
            .fail("t2", vec![unavailable()])
            .fail("t4", vec![unavailable()]);
        let (provider, _, dispatcher) = setup(provider, MockCredentials::new(), 1);

        let req = PushNotification::new(Platform::Android, tokens(5));
        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();

        assert_eq!(
            provider.calls(),
            vec![tokens(5), vec!["t2".to_string(), "t4".to_string()]]
        );
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|r| r.status == PushStatus::Fail));
        assert_eq!(responses[0].token, "t2");
        assert_eq!(responses[1].token, "t4");
    }

    #[tokio::test]
    async fn test_unregistered_failures_are_not_retried() {
        let provider = MockProvider::new()
            .fail("t1", vec![ProviderError::NotRegistered])
            .fail("t2", vec![ProviderError::MismatchSenderId])
            .fail("t3", vec![ProviderError::InvalidRegistration]);
        let (provider, _, dispatcher) = setup(provider, MockCredentials::new(), 3);

        let mut req = PushNotification::new(Platform::Android, tokens(3));
        req.retry = 2;
        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();

        assert_eq!(provider.calls().len(), 1);
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].message.as_deref(), Some("unregistered device"));
    }

    #[tokio::test]
    async fn test_mixed_failures_retry_only_retriable_subset() {
        let provider = MockProvider::new()
            .fail("t1", vec![ProviderError::NotRegistered])
            .fail("t2", vec![unavailable()]);
        let (provider, _, dispatcher) = setup(provider, MockCredentials::new(), 3);

        let req = PushNotification::new(Platform::Ios, tokens(3));
        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();

        assert_eq!(provider.calls(), vec![tokens(3), vec!["t2".to_string()]]);
        assert_eq!(responses.len(), 2);
    }

    #[tokio::test]
    async fn test_android_over_limit_rejected_before_sending() {
        let (provider, credentials, dispatcher) = setup(MockProvider::new(), MockCredentials::new(), 3);

        let req = PushNotification::new(Platform::Android, tokens(1001));
        let err = dispatcher.dispatch(&app(), &req).await.unwrap_err();

        assert!(matches!(err, PushError::Validation(_)));
        assert!(provider.calls().is_empty());
        assert_eq!(credentials.fetches(), 0);
    }

    #[tokio::test]
    async fn test_request_retry_bounds_rounds() {
        let always = vec![unavailable(); 10];

        let (provider, _, dispatcher) =
            setup(MockProvider::new().fail("t1", always.clone()), MockCredentials::new(), 3);
        let mut req = PushNotification::new(Platform::Android, tokens(1));
        req.retry = 1;
        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();
        assert_eq!(provider.calls().len(), 2);
        assert_eq!(responses.len(), 2);

        let (provider, _, dispatcher) =
            setup(MockProvider::new().fail("t1", always), MockCredentials::new(), 3);
        req.retry = 0;
        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();
        assert_eq!(provider.calls().len(), 4);
        assert_eq!(responses.len(), 4);
    }

    #[tokio::test]
    async fn test_all_delivered_reports_nothing() {
        let (provider, _, dispatcher) = setup(MockProvider::new(), MockCredentials::new(), 3);

        let req = PushNotification::new(Platform::Android, tokens(4));
        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();

        assert!(responses.is_empty());
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_call_error_marks_every_target_failed() {
        let provider =
            MockProvider::new().fail_calls(PushError::Transport("connection reset".to_string()));
        let (provider, _, dispatcher) = setup(provider, MockCredentials::new(), 3);

        let mut req = PushNotification::new(Platform::Android, tokens(3));
        req.data.insert("campaign".to_string(), serde_json::Value::from("spring"));
        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();

        assert_eq!(provider.calls().len(), 1);
        assert_eq!(responses.len(), 3);
        for response in &responses {
            assert_eq!(response.status, PushStatus::Fail);
            assert_eq!(response.data["campaign"], "spring");
            assert!(response.message.as_deref().unwrap().contains("connection reset"));
        }
    }

    #[tokio::test]
    async fn test_outcome_count_mismatch_is_call_error() {
        let (_, _, dispatcher) = setup(MockProvider::new().short_reply(), MockCredentials::new(), 3);

        let req = PushNotification::new(Platform::Android, tokens(2));
        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();

        assert_eq!(responses.len(), 2);
        assert!(responses[0].message.as_deref().unwrap().contains("outcomes"));
    }

    #[tokio::test]
    async fn test_credential_failure_sends_nothing() {
        let (provider, _, dispatcher) = setup(MockProvider::new(), MockCredentials::failing(), 3);

        let req = PushNotification::new(Platform::Android, tokens(2));
        let err = dispatcher.dispatch(&app(), &req).await.unwrap_err();

        assert!(matches!(err, PushError::Credential(_)));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_json() {
        let (_, credentials, dispatcher) = setup(MockProvider::new(), MockCredentials::new(), 3);

        let req = PushNotification::new(Platform::Android, tokens(1));
        let err = dispatcher
            .dispatch(&FcmAppConfig::new("crm-app", ""), &req)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "credential error: missing credential json");
        assert_eq!(credentials.fetches(), 0);
    }

    #[tokio::test]
    async fn test_request_is_not_mutated() {
        let provider = MockProvider::new().fail("t3", vec![unavailable()]);
        let (_, _, dispatcher) = setup(provider, MockCredentials::new(), 1);

        let req = PushNotification::new(Platform::Android, tokens(3));
        dispatcher.dispatch(&app(), &req).await.unwrap();

        assert_eq!(req.tokens, tokens(3));
    }

    #[tokio::test]
    async fn test_topic_dispatch() {
        let (provider, _, dispatcher) = setup(MockProvider::new(), MockCredentials::new(), 1);

        let mut req = PushNotification::new(Platform::Android, vec![]);
        req.to = "promotions".to_string();
        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();

        assert!(responses.is_empty());
        assert_eq!(provider.calls(), vec![vec!["promotions".to_string()]]);
    }

    #[tokio::test]
    async fn test_dispatch_for_registered_app() {
        let (provider, _, dispatcher) = setup(MockProvider::new(), MockCredentials::new(), 1);

        let mut req = PushNotification::new(Platform::Android, tokens(1));
        req.app_id = "crm-app".to_string();

        let err = dispatcher.dispatch_for_app(&req).await.unwrap_err();
        assert!(matches!(err, PushError::UnknownApp(ref id) if id == "crm-app"));

        dispatcher.credentials().register_app(app(), false).await;
        let responses = dispatcher.dispatch_for_app(&req).await.unwrap();
        assert!(responses.is_empty());
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_open_breaker_rejects_without_calling_provider() {
        use platform::breaker::{BreakerPolicy, BreakerSetting, BreakerState, CircuitBreaker};

        let breaker = Arc::new(CircuitBreaker::new(BreakerPolicy::from(BreakerSetting {
            name: "fcm".to_string(),
            max_requests: 1,
            interval: Duration::ZERO,
            timeout: Duration::from_secs(60),
            min_requests: 1,
        })));
        let provider = MockProvider::new().fail_calls(PushError::Transport("down".to_string()));
        let (provider, _, dispatcher) = setup(provider, MockCredentials::new(), 1);
        let dispatcher = dispatcher.with_breaker(breaker.clone());

        let req = PushNotification::new(Platform::Android, tokens(2));
        dispatcher.dispatch(&app(), &req).await.unwrap();
        assert_eq!(breaker.state(), BreakerState::Open);

        let responses = dispatcher.dispatch(&app(), &req).await.unwrap();
        assert_eq!(provider.calls().len(), 1);
        assert_eq!(responses.len(), 2);
        assert_eq!(
            responses[0].message.as_deref(),
            Some("circuit breaker fcm is open")
        );
    }
}

#[cfg(test)]
mod credential_tests {
    use std::sync::Arc;

    use super::mocks::*;
    use crate::{CredentialRegistry, FcmAppConfig, PushError};

    fn app(id: &str) -> FcmAppConfig {
        FcmAppConfig::new(id, "Y3JlZGVudGlhbA==")
    }

    #[tokio::test]
    async fn test_cached_until_expiry() {
        let source = Arc::new(MockCredentials::new());
        let registry = CredentialRegistry::new(source.clone());

        let first = registry.resolve(&app("a")).await.unwrap();
        let second = registry.resolve(&app("a")).await.unwrap();
        assert_eq!(source.fetches(), 1);
        assert_eq!(first.access_token, second.access_token);

        registry.resolve(&app("b")).await.unwrap();
        assert_eq!(source.fetches(), 2);

        registry.invalidate("a").await;
        registry.resolve(&app("a")).await.unwrap();
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test]
    async fn test_expired_credential_is_refetched() {
        let source = Arc::new(MockCredentials::expired());
        let registry = CredentialRegistry::new(source.clone());

        registry.resolve(&app("a")).await.unwrap();
        registry.resolve(&app("a")).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_register_respects_force() {
        let registry = CredentialRegistry::new(Arc::new(MockCredentials::new()));

        registry.register_app(FcmAppConfig::new("a", "first"), false).await;
        registry.register_app(FcmAppConfig::new("a", "second"), false).await;
        assert_eq!(registry.app("a").await.unwrap().credential_base64, "first");

        registry.register_app(FcmAppConfig::new("a", "third"), true).await;
        assert_eq!(registry.app("a").await.unwrap().credential_base64, "third");
    }

    #[tokio::test]
    async fn test_resolve_registers_app() {
        let registry = CredentialRegistry::new(Arc::new(MockCredentials::new()));

        assert!(matches!(
            registry.resolve_app("a").await,
            Err(PushError::UnknownApp(_))
        ));
        registry.resolve(&app("a")).await.unwrap();
        assert!(registry.resolve_app("a").await.is_ok());
    }
}
