/*
Copyright 2021 Jakub Lewandowski

This file is part of JAXA Rainfall Field Generator (jaxa-rfield).

JAXA Rainfall Field Generator (jaxa-rfield) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

JAXA Rainfall Field Generator (jaxa-rfield) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with JAXA Rainfall Field Generator (jaxa-rfield). If not, see https://www.gnu.org/licenses/.
*/

//! Module with the time window identifying a single product snapshot.

use crate::constants::{MAX_LATENCY_MINUTES, MAX_WINDOW_MINUTES};
use chrono::{Duration, NaiveDateTime, Timelike};

/// Closed time interval `[start, end]` at minute resolution.
///
/// The product names its files with the first and the last minute
/// of the window, so a 60-minute window starting at 04:30 ends at 05:29.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    /// Window of `window_minutes` starting at `start`.
    /// Seconds of `start` are dropped and the length is limited to one day.
    pub fn starting_at(start: NaiveDateTime, window_minutes: i64) -> Self {
        let start = truncate_to_minute(start);
        let length = Duration::minutes(window_minutes.clamp(1, MAX_WINDOW_MINUTES) - 1);
        let end = start.checked_add_signed(length).unwrap_or(start);

        TimeWindow { start, end }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// `YYYYMMDD.HHMM_HHMM` stamp used in product file names.
    pub fn product_stamp(&self) -> String {
        format!(
            "{}_{}",
            self.start.format("%Y%m%d.%H%M"),
            self.end.format("%H%M")
        )
    }
}

/// Start of the most recent window expected to be published at `now`.
///
/// `now` is moved back by the publication latency and rounded
/// to the nearest multiple of `step_minutes` (halves round up).
pub fn latest_window_start(now: NaiveDateTime, latency_minutes: i64, step_minutes: i64) -> NaiveDateTime {
    let latency = Duration::minutes(latency_minutes.clamp(0, MAX_LATENCY_MINUTES));
    let lagged = now.checked_sub_signed(latency).unwrap_or(now);

    round_to_step(lagged, step_minutes)
}

fn round_to_step(datetime: NaiveDateTime, step_minutes: i64) -> NaiveDateTime {
    let step = step_minutes.clamp(1, MAX_WINDOW_MINUTES) * 60;
    let midnight = datetime.date().and_hms_opt(0, 0, 0).unwrap_or(datetime);
    let seconds = (datetime - midnight).num_seconds();
    let rounded = (seconds + step / 2) / step * step;

    midnight
        .checked_add_signed(Duration::seconds(rounded))
        .unwrap_or(datetime)
}

fn truncate_to_minute(datetime: NaiveDateTime) -> NaiveDateTime {
    datetime
        .with_second(0)
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(datetime)
}

/// Window starts from `start` to `end` (inclusive) every `step_minutes`.
pub fn window_starts(
    start: NaiveDateTime,
    end: NaiveDateTime,
    step_minutes: i64,
) -> impl Iterator<Item = NaiveDateTime> {
    let step = Duration::minutes(step_minutes.clamp(1, MAX_WINDOW_MINUTES));

    std::iter::successors(Some(start), move |current| current.checked_add_signed(step))
        .take_while(move |current| *current <= end)
}

#[cfg(test)]
mod tests {
    use super::{latest_window_start, window_starts, TimeWindow};
    use chrono::NaiveDateTime;

    fn at(stamp: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn window_ends_on_last_minute() {
        let window = TimeWindow::starting_at(at("2019-03-26 04:30:00"), 60);

        assert_eq!(window.end(), at("2019-03-26 05:29:00"));
        assert_eq!(window.product_stamp(), "20190326.0430_0529");
    }

    #[test]
    fn seconds_are_dropped() {
        let window = TimeWindow::starting_at(at("2019-10-14 07:00:42"), 30);

        assert_eq!(window.start(), at("2019-10-14 07:00:00"));
        assert_eq!(window.product_stamp(), "20191014.0700_0729");
    }

    #[test]
    fn latest_window_is_rounded() {
        assert_eq!(
            latest_window_start(at("2019-10-14 10:14:59"), 180, 30),
            at("2019-10-14 07:00:00")
        );
        assert_eq!(
            latest_window_start(at("2019-10-14 10:15:00"), 180, 30),
            at("2019-10-14 07:30:00")
        );
        assert_eq!(
            latest_window_start(at("2019-10-15 01:50:00"), 180, 30),
            at("2019-10-14 23:00:00")
        );
    }

    #[test]
    fn oversized_lengths_do_not_overflow() {
        let window = TimeWindow::starting_at(at("2019-03-26 04:30:00"), i64::MAX);

        assert_eq!(window.end(), at("2019-03-27 04:29:00"));
        assert_eq!(
            latest_window_start(at("2019-10-14 10:14:59"), i64::MAX, i64::MAX),
            at("2019-10-07 00:00:00")
        );
        assert_eq!(
            window_starts(at("2019-10-14 07:00:00"), at("2019-10-16 07:00:00"), i64::MAX).count(),
            3
        );
    }

    #[test]
    fn range_includes_end() {
        let starts: Vec<_> =
            window_starts(at("2019-10-14 07:00:00"), at("2019-10-14 08:00:00"), 30).collect();

        assert_eq!(
            starts,
            vec![
                at("2019-10-14 07:00:00"),
                at("2019-10-14 07:30:00"),
                at("2019-10-14 08:00:00")
            ]
        );
    }

    #[test]
    fn reversed_range_is_empty() {
        assert_eq!(
            window_starts(at("2019-10-14 08:00:00"), at("2019-10-14 07:00:00"), 30).count(),
            0
        );
    }
}
