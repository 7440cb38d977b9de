/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64); // seconds

impl Time {
    pub const ZERO: Self = Time(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Time(ms / 1000.0)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    pub fn plus_millis(self, ms: u64) -> Self {
        Time(self.0 + ms as f64 / 1000.0)
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn millis_since(self, earlier: Time) -> f64 {
        ((self.0 - earlier.0) * 1000.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Time;

    #[test]
    fn millis_since_saturates() {
        let a = Time::from_millis(1500.0);
        let b = a.plus_millis(250);
        assert!((b.millis_since(a) - 250.0).abs() < 1e-9);
        assert_eq!(a.millis_since(b), 0.0);
    }
}
