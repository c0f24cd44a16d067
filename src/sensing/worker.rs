use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::meter::MeterState;

use super::GravitySource;

/// Poll the gravity source until the first sample lands, apply the verdict
/// to the reading, and exit. A reading only ever consumes one sample
/// (single-shot subscribe semantics), so the loop never outlives its first
/// hit; cancellation covers the case where the reading ends first.
pub(crate) async fn gravity_loop(
    source: Arc<dyn GravitySource>,
    state: Arc<Mutex<MeterState>>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(sample) = source.sample() else { continue };
                let mut guard = state.lock().await;
                if guard.observe_gravity(sample) {
                    info!("gravity sample {:?} forced the zero verdict", sample);
                } else {
                    debug!("gravity sample {:?} left the reading alone", sample);
                }
                break;
            }
            _ = cancel_token.cancelled() => {
                debug!("gravity watch shutting down");
                break;
            }
        }
    }
}
