use foundation::time::Time;

/// Frame metadata handed to every per-frame update.
///
/// The host supplies the clock; the runtime never reads wall-clock time
/// itself, so a recorded sequence of `advance` calls replays exactly.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Seconds since the previous frame, clamped to avoid large jumps.
    pub dt_s: f64,
    /// Host time at the start of the frame.
    pub time: Time,
}

/// Upper bound for a single frame step (seconds).
pub const MAX_FRAME_DT_S: f64 = 0.1;

impl Frame {
    pub fn first(time: Time) -> Self {
        Self {
            index: 0,
            dt_s: 0.0,
            time,
        }
    }

    /// Next frame at host time `now`. Time never runs backwards.
    pub fn advance(self, now: Time) -> Self {
        let now = if now.0 < self.time.0 { self.time } else { now };
        Self {
            index: self.index + 1,
            dt_s: (now.0 - self.time.0).clamp(0.0, MAX_FRAME_DT_S),
            time: now,
        }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::first(Time::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, MAX_FRAME_DT_S};
    use foundation::time::Time;

    #[test]
    fn advance_increments_index_and_dt() {
        let f0 = Frame::first(Time(1.0));
        let f1 = f0.advance(Time(1.016));
        assert_eq!(f1.index, 1);
        assert!((f1.dt_s - 0.016).abs() < 1e-12);
        assert_eq!(f1.time, Time(1.016));
    }

    #[test]
    fn advance_clamps_large_gaps_and_backwards_time() {
        let f0 = Frame::first(Time(5.0));
        assert_eq!(f0.advance(Time(9.0)).dt_s, MAX_FRAME_DT_S);
        let back = f0.advance(Time(4.0));
        assert_eq!(back.dt_s, 0.0);
        assert_eq!(back.time, Time(5.0));
    }
}
