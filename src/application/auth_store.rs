use crate::application::forms::{LoginForm, RegistrationForm};
use crate::application::services::AuthService;
use crate::domain::models::User;
use crate::domain::routes::{Route, available_routes, resolve_route};
use crate::infrastructure::api_client::AuthApi;
use crate::infrastructure::error::InfraError;
use serde::Serialize;
use tracing::{info, warn};

const LOGIN_FALLBACK_MESSAGE: &str = "login failed";
const REGISTER_FALLBACK_MESSAGE: &str = "registration failed";

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Session state of the signed-in user. Owned by the application state and
/// passed where needed.
pub struct AuthStore<A>
where
    A: AuthApi,
{
    service: AuthService<A>,
    state: AuthState,
    default_timezone: String,
}

impl<A> AuthStore<A>
where
    A: AuthApi,
{
    pub fn new(service: AuthService<A>, default_timezone: impl Into<String>) -> Self {
        Self {
            service,
            state: AuthState::default(),
            default_timezone: default_timezone.into(),
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn service(&self) -> &AuthService<A> {
        &self.service
    }

    pub fn routes(&self) -> &'static [Route] {
        available_routes(self.state.is_authenticated)
    }

    pub fn resolve(&self, requested: Route) -> Route {
        resolve_route(requested, self.state.is_authenticated)
    }

    pub fn clear_error(&mut self) {
        self.state.error = None;
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, InfraError> {
        self.begin();
        let form = LoginForm {
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = match form.validate() {
            Ok(request) => request,
            Err(message) => return Err(self.fail(InfraError::Validation(message), LOGIN_FALLBACK_MESSAGE)),
        };

        let result = async {
            self.service.login(&request.email, &request.password).await?;
            self.service.current_user().await
        }
        .await;

        match result {
            Ok(user) => {
                info!(user_id = %user.id, "login succeeded");
                self.state = AuthState {
                    user: Some(user.clone()),
                    is_authenticated: true,
                    is_loading: false,
                    error: None,
                };
                Ok(user)
            }
            Err(error) => {
                if let Err(cleanup) = self.service.logout() {
                    warn!(error = %cleanup, "failed to discard tokens after login error");
                }
                Err(self.fail(error, LOGIN_FALLBACK_MESSAGE))
            }
        }
    }

    /// Validates the form first; an invalid form sends nothing. A successful
    /// registration does not sign the user in.
    pub async fn register(&mut self, form: &RegistrationForm) -> Result<User, InfraError> {
        self.begin();
        let request = match form.validate(&self.default_timezone) {
            Ok(request) => request,
            Err(message) => {
                return Err(self.fail(InfraError::Validation(message), REGISTER_FALLBACK_MESSAGE));
            }
        };

        match self.service.register(&request).await {
            Ok(user) => {
                info!(email = %user.email, "registration succeeded");
                self.state.is_loading = false;
                Ok(user)
            }
            Err(error) => Err(self.fail(error, REGISTER_FALLBACK_MESSAGE)),
        }
    }

    pub fn logout(&mut self) -> Result<(), InfraError> {
        let result = self.service.logout();
        self.state.user = None;
        self.state.is_authenticated = false;
        self.state.is_loading = false;
        result
    }

    /// Restores the session from stored tokens. Any failure signs out.
    pub async fn check_auth(&mut self) -> Result<bool, InfraError> {
        if !self.service.has_session()? {
            self.state.user = None;
            self.state.is_authenticated = false;
            return Ok(false);
        }

        match self.service.current_user().await {
            Ok(user) => {
                self.state.user = Some(user);
                self.state.is_authenticated = true;
                Ok(true)
            }
            Err(error) => {
                warn!(error = %error, "stored session rejected");
                self.logout()?;
                Ok(false)
            }
        }
    }

    fn begin(&mut self) {
        self.state.is_loading = true;
        self.state.error = None;
    }

    fn fail(&mut self, error: InfraError, fallback: &str) -> InfraError {
        let message = match &error {
            InfraError::Http { .. } | InfraError::Unauthorized(_) | InfraError::Validation(_) => {
                let detail = error.user_message();
                if detail.trim().is_empty() {
                    fallback.to_string()
                } else {
                    detail
                }
            }
            _ => fallback.to_string(),
        };
        self.state.error = Some(message);
        self.state.is_loading = false;
        error
    }
}
