// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-timestep clock driving preview playback.

/// Steps handed out per frame before the backlog is dropped
pub const MAX_STEPS_PER_FRAME: u32 = 8;

/// Turns variable frame deltas into whole fixed steps
#[derive(Debug, Clone)]
pub struct PreviewClock {
    /// Length of one step in seconds
    step: f64,
    /// Time not yet handed out as a step
    accumulated: f64,
    /// Total time fed in
    elapsed: f64,
    /// Steps handed out so far
    steps: u64,
}

impl PreviewClock {
    /// Create a clock ticking `tick_rate` times per second
    pub fn new(tick_rate: f64) -> Self {
        let step = if tick_rate.is_finite() && tick_rate > 0.0 {
            tick_rate.recip()
        } else {
            1.0 / 60.0
        };
        Self {
            step,
            accumulated: 0.0,
            elapsed: 0.0,
            steps: 0,
        }
    }

    /// Step length in seconds
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Total time fed in
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Steps handed out so far
    pub fn total_steps(&self) -> u64 {
        self.steps
    }

    /// Feed a frame delta and return how many steps to run
    pub fn advance(&mut self, delta_time: f64) -> u32 {
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return 0;
        }

        self.elapsed += delta_time;
        self.accumulated += delta_time;

        let mut steps = 0;
        while self.accumulated >= self.step {
            self.accumulated -= self.step;
            steps += 1;

            if steps >= MAX_STEPS_PER_FRAME {
                tracing::debug!("Dropping {:.3}s of preview backlog", self.accumulated);
                self.accumulated = 0.0;
                break;
            }
        }

        self.steps += u64::from(steps);
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_partial_frames() {
        let mut clock = PreviewClock::new(10.0);
        assert_eq!(clock.advance(0.05), 0);
        assert_eq!(clock.advance(0.06), 1);
        assert_eq!(clock.advance(0.2), 2);
        assert_eq!(clock.total_steps(), 3);
    }

    #[test]
    fn test_caps_steps_per_frame() {
        let mut clock = PreviewClock::new(10.0);
        assert_eq!(clock.advance(5.0), MAX_STEPS_PER_FRAME);
        assert_eq!(clock.advance(0.05), 0);
        assert!((clock.elapsed() - 5.05).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut clock = PreviewClock::new(0.0);
        assert!((clock.step() - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(clock.advance(f64::NAN), 0);
        assert_eq!(clock.advance(-1.0), 0);
    }
}
