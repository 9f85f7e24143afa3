//! Admin gate and routes
//!
//! The gate compares against one configured credential pair. There is no
//! session: a successful login only yields the dashboard route.

use std::{fmt, str::FromStr};

use tracing::{info, warn};

use crate::config::AdminConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Portfolio,
    AdminLogin,
    AdminDashboard,
}

impl Route {
    pub const ALL: [Route; 4] = [
        Route::Landing,
        Route::Portfolio,
        Route::AdminLogin,
        Route::AdminDashboard,
    ];

    pub const fn path(self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Portfolio => "/portfolio",
            Route::AdminLogin => "/admin",
            Route::AdminDashboard => "/admin/dashboard",
        }
    }

    /// Path under `base`, e.g. `/studio2/portfolio`.
    pub fn href(self, base: Option<&str>) -> String {
        let base = base.unwrap_or_default().trim_end_matches('/');
        match (base.is_empty(), self) {
            (true, _) => self.path().to_owned(),
            (false, Route::Landing) => format!("{base}/"),
            (false, _) => format!("{base}{}", self.path()),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("no route for {0}")]
pub struct UnknownRoute(pub String);

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = match s.trim_end_matches('/') {
            "" => "/",
            path => path,
        };
        Route::ALL
            .into_iter()
            .find(|route| route.path() == trimmed)
            .ok_or_else(|| UnknownRoute(s.to_owned()))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
}

pub struct AdminGate {
    credentials: AdminConfig,
}

impl AdminGate {
    pub fn new(credentials: AdminConfig) -> Self {
        Self { credentials }
    }

    /// Checks the pair and returns where to go next.
    pub fn login(&self, username: &str, password: &str) -> Result<Route, AuthError> {
        if username == self.credentials.username && password == self.credentials.password {
            info!(username, "admin login");
            Ok(Route::AdminDashboard)
        } else {
            warn!(username, "rejected admin login");
            Err(AuthError::InvalidCredentials)
        }
    }
}
