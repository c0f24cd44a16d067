use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::meter::MeterState;

use super::worker::gravity_loop;
use super::GravitySource;

/// Owns the single-shot gravity worker for one reading. At most one watch is
/// ever live: starting a second without stopping the first is a bug on the
/// caller's side and fails loudly.
pub struct GravityWatcher {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl GravityWatcher {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start_watch(
        &mut self,
        source: Arc<dyn GravitySource>,
        state: Arc<Mutex<MeterState>>,
        poll_interval: Duration,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("gravity watch already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(gravity_loop(source, state, poll_interval, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancel and join the worker. Safe to call when no watch was ever
    /// started, and after the single-shot worker already finished on its
    /// own; every terminal transition goes through here unconditionally.
    pub async fn stop_watch(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("gravity watch task failed to join")?;
        }
        Ok(())
    }
}
