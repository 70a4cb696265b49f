use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use labdesk_core::ValueObject;

use crate::error::ReservationError;

/// A half-open time interval `[start, end)` with `end > start`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TimeSlot {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ValueObject for TimeSlot {}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ReservationError> {
        if end <= start {
            return Err(ReservationError::InvalidTimeRange);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap: slots that merely touch (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Closed containment, matching how "currently active" is displayed.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 15, hour, minute, 0).unwrap()
    }

    fn slot(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeSlot {
        TimeSlot::new(start, end).unwrap()
    }

    #[test]
    fn empty_and_inverted_ranges_are_rejected() {
        assert_eq!(TimeSlot::new(at(10, 0), at(10, 0)), Err(ReservationError::InvalidTimeRange));
        assert_eq!(TimeSlot::new(at(11, 0), at(10, 0)), Err(ReservationError::InvalidTimeRange));
    }

    #[test]
    fn touching_slots_do_not_overlap() {
        let morning = slot(at(9, 0), at(10, 0));
        let next = slot(at(10, 0), at(11, 0));
        assert!(!morning.overlaps(&next));
        assert!(!next.overlaps(&morning));
    }

    #[test]
    fn nested_and_partial_slots_overlap() {
        let outer = slot(at(9, 0), at(13, 0));
        assert!(outer.overlaps(&slot(at(10, 0), at(11, 0))));
        assert!(outer.overlaps(&slot(at(12, 30), at(14, 0))));
        assert!(outer.overlaps(&slot(at(8, 0), at(9, 1))));
    }

    proptest! {
        #[test]
        fn overlap_is_commutative(a in 0i64..1_000, alen in 1i64..300, b in 0i64..1_000, blen in 1i64..300) {
            let base = at(0, 0);
            let x = slot(base + Duration::minutes(a), base + Duration::minutes(a + alen));
            let y = slot(base + Duration::minutes(b), base + Duration::minutes(b + blen));
            prop_assert_eq!(x.overlaps(&y), y.overlaps(&x));
        }

        #[test]
        fn adjacent_slots_never_overlap(start in 0i64..1_000, first in 1i64..300, second in 1i64..300) {
            let base = at(0, 0);
            let boundary = base + Duration::minutes(start + first);
            let x = slot(base + Duration::minutes(start), boundary);
            let y = slot(boundary, boundary + Duration::minutes(second));
            prop_assert!(!x.overlaps(&y));
        }
    }
}
