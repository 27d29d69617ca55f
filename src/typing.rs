//! Typing indicator shown while the bot is answering.
//!
//! Three dots pulse with the same period, each shifted by a fixed phase
//! offset so the pulse appears to travel left to right. The widget has no
//! state; a frame depends only on the time elapsed since the indicator
//! appeared.

use std::time::Duration;

/// Length of one full pulse.
pub const PULSE_PERIOD: Duration = Duration::from_millis(1000);

/// Per-dot animation delays in milliseconds (negative starts early).
const DELAYS_MS: [i64; 3] = [-300, -150, 0];

const LIT: char = '●';
const DIM: char = '·';

/// The three pulsing dots.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypingIndicator;

impl TypingIndicator {
    /// Render the dots as they look `elapsed` after the indicator appeared.
    pub fn frame(elapsed: Duration) -> String {
        let period = PULSE_PERIOD.as_millis() as i64;
        let now = elapsed.as_millis() as i64;
        let mut out = String::with_capacity(8);
        for (i, delay) in DELAYS_MS.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let phase = (now - delay).rem_euclid(period);
            out.push(if phase < period / 2 { LIT } else { DIM });
        }
        out
    }
}
