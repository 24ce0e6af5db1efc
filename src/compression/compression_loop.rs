//! Budget-driven compression loop
//!
//! Each outer pass re-sorts the segments (least relevant, then largest,
//! first) and walks them, asking the shortener for a rewrite capped at a
//! fraction of the segment or the remaining global need, whichever is
//! smaller. The first strictly shorter rewrite is committed and the pass
//! restarts. A pass without any committed rewrite ends the run.

use super::models::{total_tokens, Segment};
use super::selector::candidate_order;
use super::shortener::{compression_directive, ShortenRequest, ShortenerError, TextShortener};
use super::token_estimator::TokenCounter;
use crate::config::CompressionConfig;
use crate::metrics::{AttemptOutcome, METRICS};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Hard cap on outer passes
pub const MAX_PASSES: usize = 64;

/// Largest share of a segment one request may remove
pub const STEP_FRACTION: f64 = 0.3;

/// Characters of segment text sent with one request
pub const MAX_INPUT_CHARS: usize = 12_000;

/// Loop parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    pub max_passes: usize,
    pub step_fraction: f64,
    pub max_input_chars: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_passes: MAX_PASSES,
            step_fraction: STEP_FRACTION,
            max_input_chars: MAX_INPUT_CHARS,
        }
    }
}

impl From<&CompressionConfig> for LoopConfig {
    fn from(config: &CompressionConfig) -> Self {
        Self {
            max_passes: config.max_passes,
            step_fraction: config.step_fraction,
            max_input_chars: config.max_input_chars,
        }
    }
}

/// Loop states; the last three are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Scanning,
    Attempting,
    Converged,
    Stalled,
    Exhausted,
}

impl LoopState {
    pub fn outcome(&self) -> Option<LoopOutcome> {
        match self {
            Self::Converged => Some(LoopOutcome::Converged),
            Self::Stalled => Some(LoopOutcome::Stalled),
            Self::Exhausted => Some(LoopOutcome::Exhausted),
            Self::Scanning | Self::Attempting => None,
        }
    }
}

/// How a run ended. Only `Converged` means the target was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopOutcome {
    Converged,
    Stalled,
    Exhausted,
}

impl LoopOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::Stalled => "stalled",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Summary of one compression run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionReport {
    pub outcome: LoopOutcome,
    /// Outer passes started
    pub passes: usize,
    /// Shortening requests issued
    pub attempts: usize,
    /// Rewrites committed
    pub accepted: usize,
    pub initial_tokens: usize,
    pub final_tokens: usize,
    pub target_tokens: usize,
}

/// Token ceiling for one request: remove at most `step_fraction` of `t0`
/// (truncated) and never more than `need`, but at least one token; the
/// ceiling itself never drops below one.
pub fn shortening_target(t0: usize, need: usize, step_fraction: f64) -> usize {
    let step = ((t0 as f64 * step_fraction) as usize).min(need).max(1);
    t0.saturating_sub(step).max(1)
}

/// Prefix of `text` holding at most `max_chars` characters
pub fn cap_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// `rewrite` with the trailing whitespace of `original`.
///
/// Segments end with the blank lines that separate them from the next one;
/// shorteners usually return trimmed text, which would glue the following
/// heading or paragraph onto this one.
pub fn keep_trailing_break(original: &str, rewrite: &str) -> String {
    let body = rewrite.trim_end();
    let tail = &original[original.trim_end().len()..];
    let mut text = String::with_capacity(body.len() + tail.len());
    text.push_str(body);
    text.push_str(tail);
    text
}

/// The compression state machine.
///
/// Holds exclusive access to the segment slice for the duration of
/// [`CompressionLoop::run`]; exactly one shortening request is in flight at
/// any time.
pub struct CompressionLoop<'a> {
    shortener: &'a dyn TextShortener,
    counter: &'a dyn TokenCounter,
    config: LoopConfig,
}

impl<'a> CompressionLoop<'a> {
    pub fn new(shortener: &'a dyn TextShortener, counter: &'a dyn TokenCounter) -> Self {
        Self { shortener, counter, config: LoopConfig::default() }
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Shorten segments in place until `target_tokens` is met or no pass
    /// makes progress.
    ///
    /// Rejected rewrites are absorbed. A shortener error aborts the run and
    /// is returned as-is; rewrites committed before it stay applied.
    pub async fn run(
        &self,
        segments: &mut [Segment],
        target_tokens: usize,
        intent: Option<&str>,
    ) -> Result<CompressionReport, ShortenerError> {
        for segment in segments.iter_mut() {
            segment.refresh_count(self.counter);
        }
        let initial_tokens = total_tokens(segments);
        info!(
            "Starting compression loop: {} -> {} tokens ({} segments, counter={})",
            initial_tokens,
            target_tokens,
            segments.len(),
            self.counter.name()
        );

        let mut state = LoopState::Scanning;
        let mut passes = 0;
        let mut attempts = 0;
        let mut accepted = 0;

        let outcome = loop {
            let current = total_tokens(segments);
            if current <= target_tokens {
                transition(&mut state, LoopState::Converged);
                break LoopOutcome::Converged;
            }
            if passes >= self.config.max_passes {
                transition(&mut state, LoopState::Exhausted);
                break LoopOutcome::Exhausted;
            }

            passes += 1;
            METRICS.record_pass();

            let order = candidate_order(segments);
            let mut improved = false;

            for (rank, pos) in order.into_iter().enumerate() {
                let t0 = segments[pos].token_count;
                if t0 <= 1 {
                    continue;
                }

                let need = current - target_tokens;
                let ceiling = shortening_target(t0, need, self.config.step_fraction);
                debug!(
                    "Pass {}: trying segment {} ({}/{}), {} -> {} tokens",
                    passes,
                    segments[pos].index,
                    rank + 1,
                    segments.len(),
                    t0,
                    ceiling
                );

                transition(&mut state, LoopState::Attempting);
                attempts += 1;
                let directive = compression_directive(ceiling, intent);
                let request = ShortenRequest {
                    text: cap_chars(&segments[pos].text, self.config.max_input_chars),
                    max_tokens: ceiling,
                    directive: &directive,
                    intent,
                };

                let started = Instant::now();
                let output = match self.shortener.shorten(request).await {
                    Ok(output) => output,
                    Err(e) => {
                        METRICS.record_attempt(
                            AttemptOutcome::Failed,
                            started.elapsed().as_secs_f64(),
                            0,
                        );
                        return Err(e);
                    }
                };
                let elapsed = started.elapsed().as_secs_f64();

                // Nothing usable falls back to the current text, which is then rejected
                let (output, new_count) = if output.trim().is_empty() {
                    (None, t0)
                } else {
                    let text = keep_trailing_break(&segments[pos].text, &output);
                    let count = self.counter.count(&text);
                    (Some(text), count)
                };

                if let Some(output) = output.filter(|_| new_count < t0) {
                    let segment = &mut segments[pos];
                    segment.text = output;
                    segment.token_count = new_count;
                    let index = segment.index;
                    accepted += 1;
                    improved = true;
                    METRICS.record_attempt(AttemptOutcome::Accepted, elapsed, t0 - new_count);
                    info!(
                        "Pass {}: compressed segment {} ({} -> {} tokens, total: {})",
                        passes,
                        index,
                        t0,
                        new_count,
                        total_tokens(segments)
                    );
                    transition(&mut state, LoopState::Scanning);
                    break;
                }

                METRICS.record_attempt(AttemptOutcome::Rejected, elapsed, 0);
                debug!(
                    "Pass {}: rejected rewrite of segment {} ({} -> {} tokens)",
                    passes, segments[pos].index, t0, new_count
                );
                transition(&mut state, LoopState::Scanning);
            }

            if !improved {
                info!("No more improvements possible at pass {}", passes);
                transition(&mut state, LoopState::Stalled);
                break LoopOutcome::Stalled;
            }
        };

        debug_assert_eq!(state.outcome(), Some(outcome));
        METRICS.record_run(outcome.as_str());

        let final_tokens = total_tokens(segments);
        info!(
            "Compression {}: {} tokens (target was {}) after {} passes, {} attempts",
            outcome.as_str(),
            final_tokens,
            target_tokens,
            passes,
            attempts
        );

        Ok(CompressionReport {
            outcome,
            passes,
            attempts,
            accepted,
            initial_tokens,
            final_tokens,
            target_tokens,
        })
    }
}

fn transition(state: &mut LoopState, next: LoopState) {
    if *state != next {
        debug!("Loop state {:?} -> {:?}", state, next);
        *state = next;
    }
}

/// Run the loop with default parameters
pub async fn compress_to_target(
    segments: &mut [Segment],
    target_tokens: usize,
    shortener: &dyn TextShortener,
    counter: &dyn TokenCounter,
    intent: Option<&str>,
) -> Result<CompressionReport, ShortenerError> {
    CompressionLoop::new(shortener, counter)
        .run(segments, target_tokens, intent)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_caps_at_step_fraction() {
        // 180 - 120 = 60 still needed, 30% of 100 is smaller
        assert_eq!(shortening_target(100, 60, 0.3), 70);
    }

    #[test]
    fn test_target_caps_at_remaining_need() {
        assert_eq!(shortening_target(100, 5, 0.3), 95);
    }

    #[test]
    fn test_target_removes_at_least_one() {
        // 30% of 3 truncates to 0
        assert_eq!(shortening_target(3, 10, 0.3), 2);
    }

    #[test]
    fn test_target_floor_is_one() {
        assert_eq!(shortening_target(2, 10, 0.3), 1);
        assert_eq!(shortening_target(2, 10, 1.0), 1);
        for t0 in 2..200 {
            for need in [1, 7, 1000] {
                assert!(shortening_target(t0, need, 0.3) >= 1);
                assert!(shortening_target(t0, need, 0.3) < t0);
            }
        }
    }

    #[test]
    fn test_cap_chars_respects_char_boundaries() {
        assert_eq!(cap_chars("héllo wörld", 4), "héll");
        assert_eq!(cap_chars("short", 100), "short");
        assert_eq!(cap_chars("", 3), "");
    }

    #[test]
    fn test_keep_trailing_break() {
        assert_eq!(keep_trailing_break("Long intro.\n\n", "Intro."), "Intro.\n\n");
        assert_eq!(keep_trailing_break("Long intro.\n", "Intro.\n\n\n"), "Intro.\n");
        assert_eq!(keep_trailing_break("last words", "words  \n"), "words");
    }

    #[test]
    fn test_terminal_states() {
        assert_eq!(LoopState::Scanning.outcome(), None);
        assert_eq!(LoopState::Attempting.outcome(), None);
        assert_eq!(LoopState::Stalled.outcome(), Some(LoopOutcome::Stalled));
    }

    #[test]
    fn test_outcome_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LoopOutcome::Exhausted).unwrap(),
            "\"exhausted\""
        );
    }

    #[test]
    fn test_loop_config_from_compression_config() {
        let config = LoopConfig::from(&CompressionConfig::default());
        assert_eq!(config, LoopConfig::default());
    }
}
