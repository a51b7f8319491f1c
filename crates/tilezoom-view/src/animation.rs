//! Time-driven animations for the transform engine.
//!
//! Nothing here owns a clock. The host advances animations by passing the
//! current [`Instant`] to [`TransformEngine::tick`](crate::TransformEngine::tick);
//! the first tick after an animation starts becomes its time origin.

use std::f32::consts::PI;
use std::time::{Duration, Instant};

use glam::Vec2;

/// Accelerate-decelerate easing: slow start, fast middle, slow end.
#[inline]
pub fn accelerate_decelerate(t: f32) -> f32 {
    ((t.clamp(0.0, 1.0) + 1.0) * PI).cos() / 2.0 + 0.5
}

/// Eased progress over a fixed duration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tween {
    start: Option<Instant>,
    duration: Duration,
}

impl Tween {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            start: None,
            duration,
        }
    }

    /// Eased progress in `[0, 1]` at `now`; the first call returns 0.
    pub(crate) fn progress(&mut self, now: Instant) -> f32 {
        let start = *self.start.get_or_insert(now);
        if self.duration.is_zero() {
            return 1.0;
        }
        let t = now.saturating_duration_since(start).as_secs_f32() / self.duration.as_secs_f32();
        if t >= 1.0 {
            1.0
        } else if t <= 0.0 {
            0.0
        } else {
            accelerate_decelerate(t)
        }
    }
}

/// Inertial scroll with exponential velocity decay.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fling {
    last: Option<Instant>,
    velocity: Vec2,
    damping: f32,
    min_velocity: f32,
}

impl Fling {
    pub(crate) fn new(velocity: Vec2, damping: f32, min_velocity: f32) -> Self {
        Self {
            last: None,
            velocity,
            damping,
            min_velocity,
        }
    }

    /// Displacement since the previous step, and whether the fling goes on.
    ///
    /// Integrates `v(t) = v0 * exp(-damping * t)` exactly over the step.
    pub(crate) fn step(&mut self, now: Instant) -> (Vec2, bool) {
        let Some(last) = self.last.replace(now) else {
            return (Vec2::ZERO, true);
        };
        let dt = now.saturating_duration_since(last).as_secs_f32();
        if dt <= 0.0 {
            return (Vec2::ZERO, true);
        }
        let attenuation = (-self.damping * dt).exp();
        let delta = self.velocity * (1.0 - attenuation) / self.damping;
        self.velocity *= attenuation;
        (delta, self.velocity.length() >= self.min_velocity)
    }

    /// Returns `true` once both axes have been stopped.
    pub(crate) fn is_stopped(&self) -> bool {
        self.velocity == Vec2::ZERO
    }

    /// Stops motion on the axes where `blocked` is set.
    pub(crate) fn stop_axes(&mut self, blocked: (bool, bool)) {
        if blocked.0 {
            self.velocity.x = 0.0;
        }
        if blocked.1 {
            self.velocity.y = 0.0;
        }
    }
}

/// In-flight engine animation.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Animation {
    /// Zoom from `from` to `to` about a view-space focus.
    Scale {
        tween: Tween,
        from: f32,
        to: f32,
        focus: Vec2,
    },
    /// Scroll the draw origin from `from` to `to` (view pixels).
    Locate {
        tween: Tween,
        from: Vec2,
        to: Vec2,
        current: Vec2,
    },
    /// Inertial drag.
    Fling(Fling),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn easing_endpoints() {
        assert_relative_eq!(accelerate_decelerate(0.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(accelerate_decelerate(0.5), 0.5, epsilon = 1e-6);
        assert_relative_eq!(accelerate_decelerate(1.0), 1.0, epsilon = 1e-6);
        assert!(accelerate_decelerate(0.1) < 0.1);
        assert!(accelerate_decelerate(0.9) > 0.9);
    }

    #[test]
    fn tween_starts_on_first_tick() {
        let t0 = Instant::now();
        let mut tween = Tween::new(Duration::from_millis(200));
        assert_eq!(tween.progress(t0 + Duration::from_secs(5)), 0.0);
        assert_relative_eq!(
            tween.progress(t0 + Duration::from_millis(5100)),
            0.5,
            epsilon = 1e-4
        );
        assert_eq!(tween.progress(t0 + Duration::from_secs(6)), 1.0);
    }

    #[test]
    fn fling_decays_and_stops() {
        let t0 = Instant::now();
        let mut fling = Fling::new(Vec2::new(1000.0, 0.0), 6.0, 50.0);
        assert_eq!(fling.step(t0), (Vec2::ZERO, true));

        let (delta, going) = fling.step(t0 + Duration::from_millis(100));
        assert!(going);
        // 1000 * (1 - e^-0.6) / 6
        assert_relative_eq!(delta.x, 75.1981, epsilon = 1e-2);

        let (_, going) = fling.step(t0 + Duration::from_secs(2));
        assert!(!going);
    }

    #[test]
    fn fling_total_distance_is_bounded() {
        let t0 = Instant::now();
        let mut fling = Fling::new(Vec2::new(600.0, -600.0), 6.0, 1.0);
        fling.step(t0);
        let mut total = Vec2::ZERO;
        for i in 1..=200 {
            let (d, _) = fling.step(t0 + Duration::from_millis(i * 16));
            total += d;
        }
        // Converges to v0 / damping.
        assert_relative_eq!(total.x, 100.0, epsilon = 0.5);
        assert_relative_eq!(total.y, -100.0, epsilon = 0.5);
    }
}
