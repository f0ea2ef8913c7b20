use nalgebra::Vector3;
use rand::Rng;

use crate::config;

/// Linear interpolation between two values of the same type.
pub trait Lerp {
    /// `t = 0` gives `self`, `t = 1` gives `other`.
    fn lerp_to(&self, other: &Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp_to(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Vector3<f32> {
    #[inline]
    fn lerp_to(&self, other: &Self, t: f32) -> Self {
        self.lerp(other, t)
    }
}

#[allow(dead_code)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    QuadIn,
    /// Same curve as `power1.out`.
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
}

impl Easing {
    /// Maps linear progress `t` onto the curve. `t` is clamped to `[0, 1]`.
    pub fn ease(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// A value moving from `from` to `to` over `duration` seconds of elapsed
/// time, starting at `start`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tween<T> {
    pub from: T,
    pub to: T,
    pub start: f32,
    pub duration: f32,
    pub easing: Easing,
}

impl<T: Lerp> Tween<T> {
    pub fn progress(&self, now: f32) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start) / self.duration).clamp(0.0, 1.0)
    }

    pub fn sample(&self, now: f32) -> T {
        let eased = self.easing.ease(self.progress(now));
        self.from.lerp_to(&self.to, eased)
    }

    pub fn is_finished(&self, now: f32) -> bool {
        self.progress(now) >= 1.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyCap {
    pub rest: Vector3<f32>,
    pub position: Vector3<f32>,
}

/// Decorative keyboard on top of the computer prop. Key presses dip one cap
/// and ease it back; nothing here touches physics.
#[derive(Debug)]
pub struct KeyboardProp {
    caps: Vec<KeyCap>,
    tweens: Vec<(usize, Tween<f32>)>,
}

impl Default for KeyboardProp {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardProp {
    pub fn new() -> Self {
        const ROWS: [usize; 3] = [8, 8, 7];
        const PITCH: f32 = 0.17;
        const TOP: f32 = 1.25;
        const FRONT_Z: f32 = 2.05;

        let mut caps = Vec::with_capacity(config::KEY_CAP_COUNT);
        for (row, &count) in ROWS.iter().enumerate() {
            let width = (count - 1) as f32 * PITCH;
            for col in 0..count {
                let rest = Vector3::new(
                    -width / 2.0 + col as f32 * PITCH,
                    TOP,
                    FRONT_Z + row as f32 * PITCH,
                );
                caps.push(KeyCap {
                    rest,
                    position: rest,
                });
            }
        }
        Self {
            caps,
            tweens: Vec::new(),
        }
    }

    pub fn caps(&self) -> &[KeyCap] {
        &self.caps
    }

    #[cfg(test)]
    pub fn active_tweens(&self) -> usize {
        self.tweens.len()
    }

    /// Dips cap `index` below its rest height and starts easing it back.
    /// A cap that is already moving restarts from the bottom.
    pub fn press(&mut self, index: usize, now: f32) {
        let Some(cap) = self.caps.get_mut(index) else {
            return;
        };
        let tween = Tween {
            from: cap.rest.y - config::KEY_PRESS_DEPTH,
            to: cap.rest.y,
            start: now,
            duration: config::KEY_PRESS_SECS,
            easing: Easing::QuadOut,
        };
        cap.position.y = tween.from;
        self.tweens.retain(|(cap_index, _)| *cap_index != index);
        self.tweens.push((index, tween));
    }

    pub fn press_random<R: Rng>(&mut self, rng: &mut R, now: f32) -> usize {
        let index = rng.gen_range(0..self.caps.len());
        self.press(index, now);
        index
    }

    /// Samples every running tween at `now` and drops the finished ones.
    pub fn update(&mut self, now: f32) {
        let caps = &mut self.caps;
        self.tweens.retain(|(index, tween)| {
            if let Some(cap) = caps.get_mut(*index) {
                cap.position.y = tween.sample(now);
            }
            !tween.is_finished(now)
        });
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    mod easing {
        use super::*;

        const ALL: [Easing; 7] = [
            Easing::Linear,
            Easing::QuadIn,
            Easing::QuadOut,
            Easing::QuadInOut,
            Easing::CubicIn,
            Easing::CubicOut,
            Easing::CubicInOut,
        ];

        #[test]
        fn endpoints_are_fixed() {
            for easing in ALL {
                assert!(easing.ease(0.0).abs() < 1e-6, "{easing:?}");
                assert!((easing.ease(1.0) - 1.0).abs() < 1e-6, "{easing:?}");
            }
        }

        #[test]
        fn input_is_clamped() {
            assert_eq!(Easing::QuadOut.ease(-1.0), 0.0);
            assert_eq!(Easing::QuadOut.ease(2.0), 1.0);
        }

        #[test]
        fn quad_out_is_ahead_of_linear() {
            assert!((Easing::QuadOut.ease(0.5) - 0.75).abs() < 1e-6);
            assert!((Easing::QuadIn.ease(0.5) - 0.25).abs() < 1e-6);
        }

        #[test]
        fn in_out_curves_pass_through_half() {
            assert!((Easing::QuadInOut.ease(0.5) - 0.5).abs() < 1e-6);
            assert!((Easing::CubicInOut.ease(0.5) - 0.5).abs() < 1e-6);
        }
    }

    mod tween {
        use super::*;

        #[test]
        fn samples_between_endpoints() {
            let tween = Tween {
                from: 0.0_f32,
                to: 10.0,
                start: 1.0,
                duration: 2.0,
                easing: Easing::Linear,
            };
            assert_eq!(tween.sample(0.0), 0.0);
            assert!((tween.sample(2.0) - 5.0).abs() < 1e-6);
            assert_eq!(tween.sample(9.0), 10.0);
            assert!(!tween.is_finished(2.0));
            assert!(tween.is_finished(3.0));
        }

        #[test]
        fn zero_duration_jumps_to_end() {
            let tween = Tween {
                from: Vector3::zeros(),
                to: Vector3::new(1.0, 2.0, 3.0),
                start: 0.0,
                duration: 0.0,
                easing: Easing::CubicOut,
            };
            assert_eq!(tween.sample(0.0), Vector3::new(1.0, 2.0, 3.0));
        }
    }

    mod keyboard_prop {
        use super::*;

        #[test]
        fn has_twenty_three_caps_at_rest() {
            let keyboard = KeyboardProp::new();
            assert_eq!(keyboard.caps().len(), config::KEY_CAP_COUNT);
            assert!(keyboard.caps().iter().all(|cap| cap.position == cap.rest));
        }

        #[test]
        fn press_dips_then_returns_to_rest() {
            let mut keyboard = KeyboardProp::new();
            keyboard.press(4, 1.0);
            let rest = keyboard.caps()[4].rest.y;
            let dipped = rest - config::KEY_PRESS_DEPTH;
            assert!((keyboard.caps()[4].position.y - dipped).abs() < 1e-6);

            keyboard.update(1.0 + config::KEY_PRESS_SECS / 2.0);
            let mid = keyboard.caps()[4].position.y;
            assert!(mid > rest - config::KEY_PRESS_DEPTH && mid < rest);
            assert_eq!(keyboard.active_tweens(), 1);

            keyboard.update(1.0 + config::KEY_PRESS_SECS * 2.0);
            assert!((keyboard.caps()[4].position.y - rest).abs() < 1e-6);
            assert_eq!(keyboard.active_tweens(), 0);
        }

        #[test]
        fn concurrent_presses_on_different_caps() {
            let mut keyboard = KeyboardProp::new();
            keyboard.press(0, 0.0);
            keyboard.press(1, 0.01);
            keyboard.press(1, 0.02);
            assert_eq!(keyboard.active_tweens(), 2);
        }

        #[test]
        fn out_of_range_press_is_ignored() {
            let mut keyboard = KeyboardProp::new();
            keyboard.press(99, 0.0);
            assert_eq!(keyboard.active_tweens(), 0);
        }

        #[test]
        fn random_press_stays_in_range() {
            let mut keyboard = KeyboardProp::new();
            let mut rng = StdRng::seed_from_u64(3);
            for i in 0..100 {
                let index = keyboard.press_random(&mut rng, i as f32);
                assert!(index < config::KEY_CAP_COUNT);
            }
        }
    }
}
