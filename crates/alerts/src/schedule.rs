use chrono::{Duration, Local, NaiveDateTime, NaiveTime};

/// Source of the local wall-clock time the scheduler compares against.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The system clock in the process's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Once-a-day run time on the local wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// The first scheduled instant strictly after `now`.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.at);
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

impl Default for DailySchedule {
    /// Midnight.
    fn default() -> Self {
        Self::new(NaiveTime::MIN)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn midnight_is_next_day_once_passed() {
        let schedule = DailySchedule::default();
        assert_eq!(schedule.next_after(at(10, 15, 0, 0)), at(11, 0, 0, 0));
        // Exactly at the run instant the next one is a day later.
        assert_eq!(schedule.next_after(at(10, 0, 0, 0)), at(11, 0, 0, 0));
        assert_eq!(schedule.next_after(at(10, 23, 59, 59)), at(11, 0, 0, 0));
    }

    #[test]
    fn later_time_today_is_used_when_still_ahead() {
        let schedule = DailySchedule::new(NaiveTime::from_hms_opt(18, 30, 0).unwrap());
        assert_eq!(schedule.next_after(at(10, 9, 0, 0)), at(10, 18, 30, 0));
        assert_eq!(schedule.next_after(at(10, 18, 30, 1)), at(11, 18, 30, 0));
    }

    #[test]
    fn month_boundary_rolls_over() {
        let schedule = DailySchedule::default();
        let end_of_march = at(31, 12, 0, 0);
        assert_eq!(
            schedule.next_after(end_of_march),
            NaiveDate::from_ymd_opt(2024, 4, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }
}
