//! Period rollover date arithmetic.
//!
//! All arithmetic is calendar-aware (month lengths, quarter and year
//! boundaries) rather than fixed-duration offsets, except weekly periods
//! which are exactly seven days.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};

use super::types::{LeaderboardTimeframe, LeaderboardType};

/// Successor period for a leaderboard ending at `period_end`.
///
/// The successor starts the day after the current period ends. Weekly
/// periods run seven days; monthly periods snap to the next calendar
/// month; quarterly and yearly periods add three and twelve months.
pub fn next_period(
    timeframe: LeaderboardTimeframe,
    period_end: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match timeframe {
        LeaderboardTimeframe::Weekly => {
            let start = start_of_day(period_end + Duration::days(1));
            (start, end_of_day(start + Duration::days(6)))
        }
        LeaderboardTimeframe::Monthly => {
            let first = first_of_next_month(period_end);
            let last = first + Months::new(1) - Duration::days(1);
            (first, end_of_day(last))
        }
        LeaderboardTimeframe::Quarterly => {
            let start = start_of_day(period_end + Duration::days(1));
            (start, end_of_day(start + Months::new(3) - Duration::days(1)))
        }
        LeaderboardTimeframe::Yearly => {
            let start = start_of_day(period_end + Duration::days(1));
            (start, end_of_day(start + Months::new(12) - Duration::days(1)))
        }
    }
}

/// Human-readable name for the period beginning at `start`.
pub fn period_name(
    board_type: LeaderboardType,
    timeframe: LeaderboardTimeframe,
    start: DateTime<Utc>,
) -> String {
    let label = board_type.display_name();
    match timeframe {
        LeaderboardTimeframe::Weekly => {
            format!("{} - Week of {}", label, start.format("%Y-%m-%d"))
        }
        LeaderboardTimeframe::Monthly => format!("{} - {}", label, start.format("%B %Y")),
        LeaderboardTimeframe::Quarterly => {
            let quarter = (start.month0() / 3) + 1;
            format!("{} - Q{} {}", label, quarter, start.year())
        }
        LeaderboardTimeframe::Yearly => format!("{} - {}", label, start.year()),
    }
}

fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(dt.year(), dt.month(), dt.day(), 0, 0, 0)
        .single()
        .unwrap_or(dt)
}

fn end_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(dt.year(), dt.month(), dt.day(), 23, 59, 59)
        .single()
        .unwrap_or(dt)
}

fn first_of_next_month(dt: DateTime<Utc>) -> DateTime<Utc> {
    let first_this_month = Utc
        .with_ymd_and_hms(dt.year(), dt.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(dt);
    first_this_month + Months::new(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 23, 59, 59).unwrap()
    }

    #[test]
    fn test_weekly_successor() {
        // A weekly board ending 2023-05-21 rolls to 05-22..=05-28
        let (start, end) = next_period(LeaderboardTimeframe::Weekly, utc(2023, 5, 21));
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2023-05-22");
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2023-05-28");
    }

    #[test]
    fn test_monthly_successor_snaps_to_calendar() {
        let (start, end) = next_period(LeaderboardTimeframe::Monthly, utc(2023, 5, 31));
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2023-06-01");
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2023-06-30");
    }

    #[test]
    fn test_monthly_successor_across_year_boundary() {
        let (start, end) = next_period(LeaderboardTimeframe::Monthly, utc(2023, 12, 31));
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2024-01-01");
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2024-01-31");
    }

    #[test]
    fn test_monthly_successor_february() {
        let (start, end) = next_period(LeaderboardTimeframe::Monthly, utc(2024, 1, 31));
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2024-02-01");
        // 2024 is a leap year
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2024-02-29");
    }

    #[test]
    fn test_quarterly_successor() {
        let (start, end) = next_period(LeaderboardTimeframe::Quarterly, utc(2023, 3, 31));
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2023-04-01");
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2023-06-30");
    }

    #[test]
    fn test_yearly_successor() {
        let (start, end) = next_period(LeaderboardTimeframe::Yearly, utc(2023, 12, 31));
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2024-01-01");
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2024-12-31");
    }

    #[test]
    fn test_period_names() {
        let start = Utc.with_ymd_and_hms(2023, 5, 22, 0, 0, 0).unwrap();
        assert_eq!(
            period_name(
                LeaderboardType::OverallEfficiency,
                LeaderboardTimeframe::Weekly,
                start
            ),
            "Overall Efficiency - Week of 2023-05-22"
        );
        assert_eq!(
            period_name(
                LeaderboardType::FuelEfficiency,
                LeaderboardTimeframe::Quarterly,
                start
            ),
            "Fuel Efficiency - Q2 2023"
        );
    }
}
