//! Command dispatch and the logged-in middleware.
//!
//! A [`Commands`] registry maps command names to [`Handler`] trait objects.
//! Handlers that act on behalf of a user implement [`UserHandler`] instead and
//! are registered wrapped in [`LoggedIn`], which resolves the configured user
//! before every call.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::{Database, User};
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;

/// Process-wide state shared by every handler.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub fetcher: Fetcher,
    /// Fired on Ctrl-C; long-running handlers stop when it does.
    pub shutdown: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn run(&self, state: &mut AppState, cmd: &Command) -> Result<()>;
}

/// A handler that receives the resolved current user.
///
/// The user may be [`User::anonymous`]; implementations that need a real
/// identity must reject it themselves.
#[async_trait]
pub trait UserHandler: Send + Sync {
    async fn run(&self, state: &mut AppState, cmd: &Command, user: &User) -> Result<()>;
}

/// Wraps a [`UserHandler`] so it can be registered as a plain [`Handler`].
pub struct LoggedIn<H>(pub H);

#[async_trait]
impl<H: UserHandler> Handler for LoggedIn<H> {
    async fn run(&self, state: &mut AppState, cmd: &Command) -> Result<()> {
        let user = match state.db.get_user(&state.config.user).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(user = %state.config.user, "configured user not found");
                User::anonymous()
            }
            Err(e) => {
                warn!(user = %state.config.user, error = %e, "failed to resolve current user");
                User::anonymous()
            }
        };

        self.0.run(state, cmd, &user).await
    }
}

#[derive(Default)]
pub struct Commands {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any earlier registration.
    pub fn register(&mut self, name: &str, handler: impl Handler + 'static) {
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub async fn execute(&self, state: &mut AppState, cmd: &Command) -> Result<()> {
        let handler = self
            .handlers
            .get(&cmd.name)
            .ok_or_else(|| Error::UnknownCommand(cmd.name.clone()))?;

        debug!(command = %cmd.name, args = ?cmd.args, "dispatching command");
        handler.run(state, cmd).await
    }
}
