//! Scan confirmation state machine
//!
//! Turns the continuous stream of raw camera decode events into a single
//! trustworthy "operator scanned code X" signal. A code must be decoded on
//! two consecutive accepted events before it confirms; a different valid
//! code replaces the pending candidate instead of accumulating, so
//! alternating misreads never confirm. After a confirmation the verifier
//! suspends and ignores everything until the caller explicitly resets it,
//! which keeps at most one lookup in flight per confirmation.
//!
//! The machine is pure and synchronous; it owns no timers. Transitions:
//! `Idle → Candidate(count=1) → Confirmed → Suspended → (reset) → Idle`,
//! with candidate replacement on a differing valid code and `cancel()`
//! returning to `Idle` from any state.

use std::time::{Duration, Instant};

use barinv_common::ean::is_valid_ean;
use barinv_common::{Error, Result};

/// Consecutive identical reads required to confirm a code.
const REQUIRED_READS: u32 = 2;

/// Verifier state, visible to the host for status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    /// No candidate; waiting for the first valid decode.
    Idle,
    /// One or more consecutive reads of `code` observed.
    Candidate {
        code: String,
        count: u32,
        first_seen: Instant,
    },
    /// A confirmation was emitted and not yet resolved; all raw events are
    /// ignored until `reset()`.
    Suspended,
}

/// Result of feeding one raw decode event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The code was read twice in a row; the verifier is now suspended.
    Confirmed(String),
    /// A candidate is pending; `count` of `REQUIRED_READS` reads seen.
    Pending { code: String, count: u32 },
    /// Invalid shape, or the verifier is suspended. No state change.
    Ignored,
}

/// Debouncing verifier for raw barcode decode events.
#[derive(Debug)]
pub struct ScanVerifier {
    state: ScanState,
}

impl ScanVerifier {
    pub fn new() -> Self {
        Self {
            state: ScanState::Idle,
        }
    }

    /// Feed one raw decode event.
    pub fn accept(&mut self, raw: &str) -> ScanOutcome {
        if matches!(self.state, ScanState::Suspended) {
            return ScanOutcome::Ignored;
        }
        if !is_valid_ean(raw) {
            return ScanOutcome::Ignored;
        }

        match &mut self.state {
            ScanState::Candidate { code, count, .. } if code.as_str() == raw => {
                *count += 1;
                if *count >= REQUIRED_READS {
                    let confirmed = code.clone();
                    self.state = ScanState::Suspended;
                    tracing::debug!(code = %confirmed, "scan confirmed");
                    return ScanOutcome::Confirmed(confirmed);
                }
                ScanOutcome::Pending {
                    code: raw.to_string(),
                    count: *count,
                }
            }
            // First valid read, or a different code replacing the candidate
            _ => {
                self.state = ScanState::Candidate {
                    code: raw.to_string(),
                    count: 1,
                    first_seen: Instant::now(),
                };
                ScanOutcome::Pending {
                    code: raw.to_string(),
                    count: 1,
                }
            }
        }
    }

    /// Confirm an externally-sourced EAN (manual entry or a missing-product
    /// retry), bypassing the debounce. The shape is still validated; on
    /// success the verifier suspends exactly as after a camera confirmation.
    pub fn submit(&mut self, code: &str) -> Result<String> {
        if !is_valid_ean(code) {
            return Err(Error::Validation(format!(
                "not an EAN-8/EAN-13 code: {code:?}"
            )));
        }
        self.state = ScanState::Suspended;
        Ok(code.to_string())
    }

    /// Re-arm after a confirmation has been fully resolved.
    pub fn reset(&mut self) {
        self.state = ScanState::Idle;
    }

    /// Abandon whatever is pending and return to idle.
    pub fn cancel(&mut self) {
        self.state = ScanState::Idle;
    }

    /// Discard a candidate that has been pending longer than `max_age`.
    /// Called by the host on scan-screen re-entry; the verifier itself
    /// never runs a timer.
    pub fn clear_stale(&mut self, max_age: Duration) {
        if let ScanState::Candidate { first_seen, .. } = &self.state {
            if first_seen.elapsed() > max_age {
                self.state = ScanState::Idle;
            }
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.state, ScanState::Suspended)
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }
}

impl Default for ScanVerifier {
    fn default() -> Self {
        Self::new()
    }
}
