use crate::domain::models::{AuthTokens, LoginRequest, RegisterRequest, User};
use crate::infrastructure::api_client::AuthApi;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::query_cache::{CacheKey, QueryCache, QueryKey};
use std::sync::Arc;
use tracing::debug;

pub struct AuthService<A>
where
    A: AuthApi,
{
    api: Arc<A>,
    credential_store: Arc<dyn CredentialStore>,
    cache: Arc<QueryCache>,
}

impl<A> AuthService<A>
where
    A: AuthApi,
{
    pub fn new(api: Arc<A>, credential_store: Arc<dyn CredentialStore>, cache: Arc<QueryCache>) -> Self {
        Self {
            api,
            credential_store,
            cache,
        }
    }

    pub fn has_session(&self) -> Result<bool, InfraError> {
        Ok(self.credential_store.access_token()?.is_some())
    }

    /// Exchanges credentials for tokens and stores them.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, InfraError> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let tokens = self.api.login(&request).await?;
        self.credential_store.save_tokens(&tokens)?;
        self.cache.clear()?;
        debug!(email = %request.email, "signed in");
        Ok(tokens)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, InfraError> {
        self.api.register(request).await
    }

    pub async fn current_user(&self) -> Result<User, InfraError> {
        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(CacheKey::new(QueryKey::CurrentUser), || async move {
                api.current_user().await
            })
            .await
    }

    pub async fn refresh(&self) -> Result<AuthTokens, InfraError> {
        let stored = self
            .credential_store
            .load_tokens()?
            .ok_or_else(|| InfraError::Unauthorized("not signed in".to_string()))?;
        let refresh_token = stored
            .refresh_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| InfraError::Unauthorized("no refresh token stored".to_string()))?;
        let merged = self.api.refresh(&refresh_token).await?.merged_with(&stored);
        self.credential_store.save_tokens(&merged)?;
        Ok(merged)
    }

    /// Forgets the stored tokens and every cached query.
    pub fn logout(&self) -> Result<(), InfraError> {
        self.credential_store.delete_tokens()?;
        self.cache.clear()?;
        debug!("signed out");
        Ok(())
    }
}
