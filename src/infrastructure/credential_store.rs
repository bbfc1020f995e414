use crate::domain::models::AuthTokens;
use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

pub const DEFAULT_KEYRING_SERVICE: &str = "adhd-helper.api";
pub const DEFAULT_KEYRING_ACCOUNT: &str = "default";

pub trait CredentialStore: Send + Sync {
    fn save_tokens(&self, tokens: &AuthTokens) -> Result<(), InfraError>;
    fn load_tokens(&self) -> Result<Option<AuthTokens>, InfraError>;
    fn delete_tokens(&self) -> Result<(), InfraError>;

    fn access_token(&self) -> Result<Option<String>, InfraError> {
        Ok(self
            .load_tokens()?
            .map(|tokens| tokens.access_token)
            .filter(|token| !token.trim().is_empty()))
    }
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEYRING_SERVICE, DEFAULT_KEYRING_ACCOUNT)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_tokens(&self, tokens: &AuthTokens) -> Result<(), InfraError> {
        let payload =
            serde_json::to_string(tokens).map_err(|error| InfraError::Credential(error.to_string()))?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_tokens(&self) -> Result<Option<AuthTokens>, InfraError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(InfraError::Credential(error.to_string())),
        };

        let tokens = serde_json::from_str::<AuthTokens>(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        Ok(Some(tokens))
    }

    fn delete_tokens(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tokens: Mutex<Option<AuthTokens>>,
}

impl InMemoryCredentialStore {
    pub fn with_tokens(tokens: AuthTokens) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<AuthTokens>>, InfraError> {
        self.tokens
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_tokens(&self, tokens: &AuthTokens) -> Result<(), InfraError> {
        *self.lock()? = Some(tokens.clone());
        Ok(())
    }

    fn load_tokens(&self) -> Result<Option<AuthTokens>, InfraError> {
        Ok(self.lock()?.clone())
    }

    fn delete_tokens(&self) -> Result<(), InfraError> {
        *self.lock()? = None;
        Ok(())
    }
}
