use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Emotions,
    Focus,
    Todos,
    Analytics,
    Settings,
}

pub const UNAUTHENTICATED_ROUTES: [Route; 2] = [Route::Login, Route::Register];

pub const AUTHENTICATED_ROUTES: [Route; 6] = [
    Route::Dashboard,
    Route::Emotions,
    Route::Focus,
    Route::Todos,
    Route::Analytics,
    Route::Settings,
];

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::Dashboard => "dashboard",
            Self::Emotions => "emotions",
            Self::Focus => "focus",
            Self::Todos => "todos",
            Self::Analytics => "analytics",
            Self::Settings => "settings",
        }
    }

    pub fn path(self) -> String {
        format!("/{}", self.as_str())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().trim_start_matches('/').to_ascii_lowercase();
        let candidate = if normalized.is_empty() {
            "dashboard"
        } else {
            normalized.as_str()
        };
        UNAUTHENTICATED_ROUTES
            .iter()
            .chain(AUTHENTICATED_ROUTES.iter())
            .copied()
            .find(|route| route.as_str() == candidate)
            .ok_or_else(|| format!("unknown route '{}'", value.trim()))
    }
}

pub fn available_routes(is_authenticated: bool) -> &'static [Route] {
    if is_authenticated {
        &AUTHENTICATED_ROUTES
    } else {
        &UNAUTHENTICATED_ROUTES
    }
}

pub fn fallback_route(is_authenticated: bool) -> Route {
    if is_authenticated {
        Route::Dashboard
    } else {
        Route::Login
    }
}

/// Where a navigation request ends up: the route itself when the session
/// state allows it, otherwise the landing page of the current route set.
pub fn resolve_route(requested: Route, is_authenticated: bool) -> Route {
    if available_routes(is_authenticated).contains(&requested) {
        requested
    } else {
        fallback_route(is_authenticated)
    }
}
