//! Fixed-cadence tick driver on tokio.
//!
//! The driver owns the sequencer mutably for as long as it runs, so two ticks
//! can never overlap. Firings missed while a tick overran are skipped, not
//! replayed in a burst.
//!
//! Each tick runs synchronously inside the driver's future and holds its
//! runtime worker until the tick returns. Drive it from a current-thread
//! runtime or a thread dedicated to the game loop so slow ticks do not starve
//! other tasks on a shared multi-thread runtime.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::core::{GameSequencer, NetworkLayer, WorldLayer};

/// Run ticks every `period` until `shutdown` resolves. Returns the number of
/// ticks run.
///
/// The first tick fires immediately. A tick in progress when `shutdown`
/// resolves always completes first.
///
/// Ticks run inline on the polling worker thread. The layers need not be
/// `Send`.
pub async fn run_ticks<N, W, F>(
    sequencer: &mut GameSequencer<N, W>,
    period: Duration,
    shutdown: F,
) -> u64
where
    N: NetworkLayer,
    W: WorldLayer,
    F: Future,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let budget_micros = u64::try_from(period.as_micros()).unwrap_or(u64::MAX);
    let mut ticks = 0_u64;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!(ticks, "Tick driver received shutdown");
                break;
            }
            _ = interval.tick() => {
                sequencer.run_tick();
                ticks += 1;

                let elapsed = sequencer.stats().last_tick_micros;
                if elapsed > budget_micros {
                    warn!(
                        tick = sequencer.tasks().tick(),
                        elapsed_micros = elapsed,
                        budget_micros,
                        "Tick overran its period, skipping missed firings"
                    );
                }
            }
        }
    }
    ticks
}
