//! Credential Registry
//!
//! App configurations and their cached access credentials. A credential is
//! reused until it expires, then fetched again from the source.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::application::config::FcmAppConfig;
use crate::domain::credential::{AccessCredential, CredentialSource};
use crate::error::{PushError, PushResult};

pub struct CredentialRegistry<C> {
    source: Arc<C>,
    apps: RwLock<HashMap<String, FcmAppConfig>>,
    cache: RwLock<HashMap<String, AccessCredential>>,
}

impl<C> CredentialRegistry<C>
where
    C: CredentialSource + Sync,
{
    pub fn new(source: Arc<C>) -> Self {
        Self {
            source,
            apps: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Add `config`; an existing entry is only replaced when `force` is set
    pub async fn register_app(&self, config: FcmAppConfig, force: bool) {
        let mut apps = self.apps.write().await;
        let replace = force
            || apps
                .get(&config.app_id)
                .is_none_or(|existing| existing.app_id.is_empty());
        if replace {
            tracing::debug!(app_id = %config.app_id, force, "Registered FCM app");
            apps.insert(config.app_id.clone(), config);
        }
    }

    pub async fn app(&self, app_id: &str) -> Option<FcmAppConfig> {
        self.apps.read().await.get(app_id).cloned()
    }

    /// Credential for a registered app id
    pub async fn resolve_app(&self, app_id: &str) -> PushResult<AccessCredential> {
        let config = self
            .app(app_id)
            .await
            .ok_or_else(|| PushError::UnknownApp(app_id.to_string()))?;
        self.resolve(&config).await
    }

    /// Cached credential for `config`, fetched again once expired
    pub async fn resolve(&self, config: &FcmAppConfig) -> PushResult<AccessCredential> {
        if config.credential_base64.is_empty() {
            return Err(PushError::Credential("missing credential json".to_string()));
        }

        if let Some(cached) = self.cache.read().await.get(&config.app_id) {
            if cached.is_valid_at(Utc::now()) {
                return Ok(cached.clone());
            }
        }

        let credential = self
            .source
            .fetch(&config.app_id, &config.credential_base64)
            .await?;

        self.register_app(config.clone(), true).await;
        self.cache
            .write()
            .await
            .insert(config.app_id.clone(), credential.clone());

        tracing::info!(
            app_id = %config.app_id,
            project_id = %credential.project_id,
            expires_at = %credential.expires_at,
            "Initialized FCM credential"
        );

        Ok(credential)
    }

    /// Drop the cached credential so the next resolve fetches again
    pub async fn invalidate(&self, app_id: &str) {
        self.cache.write().await.remove(app_id);
    }
}

impl<C> std::fmt::Debug for CredentialRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRegistry").finish_non_exhaustive()
    }
}
