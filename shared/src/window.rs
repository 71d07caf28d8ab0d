use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AvailabilityError;

/// A rental period. Overlap treats it as half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<Self, AvailabilityError> {
        let window = Self { start_date, end_date };
        window.validate("requested_window")?;
        Ok(window)
    }

    pub fn validate(&self, field: &'static str) -> Result<(), AvailabilityError> {
        if self.end_date < self.start_date {
            return Err(AvailabilityError::invalid(
                field,
                format!("end date {} is before start date {}", self.end_date, self.start_date),
            ));
        }
        Ok(())
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start_date < other.end_date && other.start_date < self.end_date
    }

    /// Inclusive on both ends, unlike [`TimeWindow::overlaps`].
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_date <= instant && instant <= self.end_date
    }

    /// Current or future: the window has not ended yet at `instant`.
    pub fn is_pending_at(&self, instant: DateTime<Utc>) -> bool {
        self.end_date >= instant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    fn window(a: u32, b: u32) -> TimeWindow {
        TimeWindow { start_date: day(a), end_date: day(b) }
    }

    #[test]
    fn rejects_inverted_window() {
        assert!(TimeWindow::new(day(5), day(4)).is_err());
        assert!(TimeWindow::new(day(4), day(4)).is_ok());
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        assert!(!window(1, 3).overlaps(&window(3, 6)));
        assert!(!window(3, 6).overlaps(&window(1, 3)));
    }

    #[test]
    fn overlap_is_symmetric() {
        let cases = [(1, 3), (2, 5), (3, 3), (4, 9), (1, 10), (6, 7), (9, 10)];
        for &(a, b) in &cases {
            for &(c, d) in &cases {
                let (x, y) = (window(a, b), window(c, d));
                assert_eq!(x.overlaps(&y), y.overlaps(&x), "{:?} vs {:?}", x, y);
            }
        }
    }

    #[test]
    fn point_window_inside_reservation_overlaps() {
        assert!(window(4, 4).overlaps(&window(1, 10)));
        assert!(window(1, 10).overlaps(&window(4, 4)));
    }

    #[test]
    fn point_window_on_boundary_does_not_overlap() {
        assert!(!window(1, 1).overlaps(&window(1, 10)));
        assert!(!window(10, 10).overlaps(&window(1, 10)));
    }

    #[test]
    fn point_queries_are_inclusive() {
        let w = window(2, 5);
        assert!(w.contains(day(2)));
        assert!(w.contains(day(5)));
        assert!(!w.contains(day(6)));
        assert!(w.is_pending_at(day(5)));
        assert!(w.is_pending_at(day(1)));
        assert!(!w.is_pending_at(day(6)));
    }
}
