//! Timed state transitions.
//!
//! Every timer here is cancel-and-replace: re-arming moves the single
//! deadline, it never stacks a second one. Timers are polled from the frame
//! loop with the host clock, so they are deterministic under test.

use foundation::time::Time;

/// Fires once, `delay_ms` after the most recent `trigger`.
#[derive(Debug, Clone, PartialEq)]
pub struct Debounce {
    delay_ms: u64,
    deadline: Option<Time>,
}

impl Debounce {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline: None,
        }
    }

    pub fn trigger(&mut self, now: Time) {
        self.deadline = Some(now.plus_millis(self.delay_ms));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns `true` exactly once when the deadline has passed.
    pub fn poll(&mut self, now: Time) -> bool {
        match self.deadline {
            Some(deadline) if now.0 >= deadline.0 => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Rate limiter with a trailing edge: at most one value per interval, and the
/// latest suppressed value is delivered once the interval has elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Throttle<T> {
    interval_ms: u64,
    last_emit: Option<Time>,
    trailing: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_emit: None,
            trailing: None,
        }
    }

    fn ready(&self, now: Time) -> bool {
        match self.last_emit {
            None => true,
            Some(last) => now.millis_since(last) >= self.interval_ms as f64,
        }
    }

    /// Offers a value; returns it if it may be emitted now, otherwise keeps it
    /// as the trailing value (replacing any older one).
    pub fn offer(&mut self, now: Time, value: T) -> Option<T> {
        if self.ready(now) {
            self.last_emit = Some(now);
            self.trailing = None;
            Some(value)
        } else {
            self.trailing = Some(value);
            None
        }
    }

    /// Emits the trailing value once its interval has elapsed.
    pub fn poll(&mut self, now: Time) -> Option<T> {
        if self.trailing.is_some() && self.ready(now) {
            self.last_emit = Some(now);
            return self.trailing.take();
        }
        None
    }

    pub fn reset(&mut self) {
        self.last_emit = None;
        self.trailing = None;
    }
}

/// Tracks how long the same key has been observed without interruption.
#[derive(Debug, Clone, PartialEq)]
pub struct Dwell<K> {
    current: Option<(K, Time)>,
}

impl<K> Default for Dwell<K> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<K: PartialEq> Dwell<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the key seen at `now`; a different key restarts the clock.
    pub fn observe(&mut self, key: Option<K>, now: Time) {
        match (key, &self.current) {
            (None, _) => self.current = None,
            (Some(k), Some((cur, _))) if *cur == k => {}
            (Some(k), _) => self.current = Some((k, now)),
        }
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    /// The dwelled-on key if it has been held for at least `min_ms`.
    pub fn reached(&self, now: Time, min_ms: u64) -> Option<&K> {
        let (key, since) = self.current.as_ref()?;
        (now.millis_since(*since) >= min_ms as f64).then_some(key)
    }
}

/// A displayed value that, once shown, stays up for at least `min_ms` even if
/// a clear is requested earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimumDisplay<T> {
    min_ms: u64,
    current: Option<(T, Time)>,
    clear_requested: bool,
}

impl<T: PartialEq> MinimumDisplay<T> {
    pub fn new(min_ms: u64) -> Self {
        Self {
            min_ms,
            current: None,
            clear_requested: false,
        }
    }

    /// Shows `value`. Returns `true` if the displayed value changed.
    pub fn show(&mut self, value: T, now: Time) -> bool {
        self.clear_requested = false;
        if matches!(&self.current, Some((cur, _)) if *cur == value) {
            return false;
        }
        self.current = Some((value, now));
        true
    }

    pub fn request_clear(&mut self) {
        if self.current.is_some() {
            self.clear_requested = true;
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref().map(|(v, _)| v)
    }

    /// Clears the value once the minimum dwell has passed. Returns `true`
    /// when the value was cleared by this call.
    pub fn poll(&mut self, now: Time) -> bool {
        if !self.clear_requested {
            return false;
        }
        let Some((_, shown_at)) = &self.current else {
            self.clear_requested = false;
            return false;
        };
        if now.millis_since(*shown_at) < self.min_ms as f64 {
            return false;
        }
        self.current = None;
        self.clear_requested = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: f64) -> Time {
        Time::from_millis(v)
    }

    #[test]
    fn debounce_fires_once_after_last_trigger() {
        let mut d = Debounce::new(500);
        d.trigger(ms(0.0));
        d.trigger(ms(300.0));
        assert!(!d.poll(ms(600.0)));
        assert!(d.poll(ms(800.0)));
        assert!(!d.poll(ms(900.0)));
        assert!(!d.is_pending());
    }

    #[test]
    fn throttle_emits_leading_and_trailing() {
        let mut t = Throttle::new(100);
        assert_eq!(t.offer(ms(0.0), 1), Some(1));
        assert_eq!(t.offer(ms(30.0), 2), None);
        assert_eq!(t.offer(ms(60.0), 3), None);
        assert_eq!(t.poll(ms(90.0)), None);
        assert_eq!(t.poll(ms(100.0)), Some(3));
        assert_eq!(t.poll(ms(300.0)), None);
    }

    #[test]
    fn dwell_restarts_on_key_change() {
        let mut d = Dwell::new();
        d.observe(Some("a"), ms(0.0));
        d.observe(Some("a"), ms(200.0));
        assert_eq!(d.reached(ms(400.0), 400), Some(&"a"));
        d.observe(Some("b"), ms(400.0));
        assert_eq!(d.reached(ms(500.0), 400), None);
        d.observe(None, ms(900.0));
        assert_eq!(d.reached(ms(2000.0), 400), None);
    }

    #[test]
    fn minimum_display_holds_value() {
        let mut m = MinimumDisplay::new(1000);
        assert!(m.show("loading", ms(0.0)));
        assert!(!m.show("loading", ms(10.0)));
        m.request_clear();
        assert!(!m.poll(ms(500.0)));
        assert_eq!(m.current(), Some(&"loading"));
        assert!(m.poll(ms(1000.0)));
        assert_eq!(m.current(), None);
    }

    #[test]
    fn showing_again_cancels_pending_clear() {
        let mut m = MinimumDisplay::new(100);
        m.show("a", ms(0.0));
        m.request_clear();
        m.show("b", ms(50.0));
        assert!(!m.poll(ms(500.0)));
        assert_eq!(m.current(), Some(&"b"));
    }
}
