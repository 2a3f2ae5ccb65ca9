//! Paced emission of bot utterances
//!
//! A transition can produce several utterances; they are appended to the
//! transcript one at a time with a fixed delay in front of each, the way a
//! person types one message after another. The session runtime awaits the
//! whole drain before it reads the next input, so replies from different
//! transitions never interleave.

use crate::state_machine::Utterance;
use crate::transcript::Transcript;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default delay in front of each bot utterance
pub const DEFAULT_PACING: Duration = Duration::from_millis(700);

/// How a drain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed { emitted: usize },
    /// The session was torn down; the remaining utterances were dropped
    Cancelled { emitted: usize, dropped: usize },
}

pub struct TurnScheduler {
    pacing: Duration,
    cancel: CancellationToken,
}

impl TurnScheduler {
    pub fn new(pacing: Duration, cancel: CancellationToken) -> Self {
        Self { pacing, cancel }
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Emit `utterances` in order. Stops at the first sign of cancellation,
    /// either through the token or a disposed transcript.
    pub async fn drain(&self, transcript: &Transcript, utterances: Vec<Utterance>) -> DrainOutcome {
        let total = utterances.len();

        for (emitted, utterance) in utterances.into_iter().enumerate() {
            let cancelled = DrainOutcome::Cancelled {
                emitted,
                dropped: total - emitted,
            };

            if !self.pacing.is_zero() {
                tokio::select! {
                    biased;

                    () = self.cancel.cancelled() => return cancelled,
                    () = tokio::time::sleep(self.pacing) => {}
                }
            }

            if self.cancel.is_cancelled() {
                return cancelled;
            }

            if transcript.append_bot(utterance).is_err() {
                tracing::debug!(emitted, dropped = total - emitted, "Transcript disposed mid-drain");
                return cancelled;
            }
        }

        DrainOutcome::Completed { emitted: total }
    }
}
