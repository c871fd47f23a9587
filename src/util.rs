//! Small utilities used throughout the vm.

use std::time::Instant;

use rand::Rng;

/// A restartable stopwatch measuring elapsed wall-clock time in milliseconds.
///
/// Used for the per-tick work budget, warp timers, and timed blocks like
/// glide and wait.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}
impl Timer {
    /// Creates a new timer, started at the current instant.
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }
    /// Gets the number of milliseconds elapsed since the timer was started.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
    /// Restarts the timer at the current instant.
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

const ID_SOUP: &[u8] = b"!#%()*+,-./:;=?@[]^_`{|}~ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Generates a random 20-character id of the kind used for blocks, variables,
/// and broadcasts in project files.
pub fn uid() -> String {
    let mut rng = rand::thread_rng();
    (0..20).map(|_| ID_SOUP[rng.gen_range(0..ID_SOUP.len())] as char).collect()
}

/// Wrapping clamp of `value` into `[low, high]`, the way stage coordinates
/// wrap for direction values: out-of-range values wrap around the range
/// rather than saturating.
pub fn wrap_clamp(value: f64, low: f64, high: f64) -> f64 {
    let range = (high - low) + 1.0;
    value - ((value - low) / range).floor() * range
}

/// Euclidean-style modulus matching the semantics of the `mod` block:
/// the result always has the sign of the divisor.
pub fn modulus(a: f64, b: f64) -> f64 {
    let res = a % b;
    if res != 0.0 && (res < 0.0) != (b < 0.0) { res + b } else { res }
}

#[test]
fn test_wrap_clamp() {
    assert_eq!(wrap_clamp(90.0, -179.0, 180.0), 90.0);
    assert_eq!(wrap_clamp(180.0, -179.0, 180.0), 180.0);
    assert_eq!(wrap_clamp(181.0, -179.0, 180.0), -179.0);
    assert_eq!(wrap_clamp(-180.0, -179.0, 180.0), 180.0);
    assert_eq!(wrap_clamp(270.0, -179.0, 180.0), -90.0);
    assert_eq!(wrap_clamp(-270.0, -179.0, 180.0), 90.0);
    assert_eq!(wrap_clamp(540.0, -179.0, 180.0), 180.0);
}

#[test]
fn test_modulus() {
    assert_eq!(modulus(7.0, 3.0), 1.0);
    assert_eq!(modulus(-7.0, 3.0), 2.0);
    assert_eq!(modulus(7.0, -3.0), -2.0);
    assert_eq!(modulus(-7.0, -3.0), -1.0);
    assert!(modulus(7.0, 0.0).is_nan());
}

#[test]
fn test_uid() {
    let a = uid();
    let b = uid();
    assert_eq!(a.len(), 20);
    assert_eq!(b.len(), 20);
    assert_ne!(a, b);
    assert!(a.bytes().all(|ch| ID_SOUP.contains(&ch)));
}
