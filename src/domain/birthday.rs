use chrono::{Datelike, Duration, NaiveDate};

/// The date `birthday` is celebrated on in `year`.
///
/// People born on 29 February celebrate on 28 February in non-leap years.
pub fn anniversary_in(birthday: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day()).or_else(|| {
        if birthday.month() == 2 && birthday.day() == 29 {
            NaiveDate::from_ymd_opt(year, 2, 28)
        } else {
            None
        }
    })
}

/// Whether an anniversary of `birthday` falls between `today` and
/// `today + days`, both ends inclusive.
///
/// Only this year's and next year's anniversaries are considered.
pub fn has_upcoming_birthday(birthday: NaiveDate, today: NaiveDate, days: u32) -> bool {
    let end = today
        .checked_add_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDate::MAX);

    [today.year(), today.year() + 1]
        .into_iter()
        .filter_map(|year| anniversary_in(birthday, year))
        .any(|anniversary| anniversary >= today && anniversary <= end)
}
