use chrono::{Local, Timelike};

/// Minutes in one day. The reminder grid and all offset math wrap at this.
pub const DAY_MINUTES: i32 = 24 * 60;

/// Returns the server's current time as minutes since midnight.
pub fn minutes_now() -> i32 {
    let now = Local::now();
    (now.hour() * 60 + now.minute()) as i32
}

/// Formats a minutes-since-midnight value as a zero-padded "HH:MM" string.
///
/// Values outside a single day are wrapped back into it first, so
/// `to_hhmm(1465)` is `"00:25"` and `to_hhmm(-30)` is `"23:30"`.
pub fn to_hhmm(minutes: i32) -> String {
    let wrapped = minutes.rem_euclid(DAY_MINUTES);
    format!("{:02}:{:02}", wrapped / 60, wrapped % 60)
}

/// Parses an "HH:MM" or "HH:MM:SS" string into minutes since midnight.
///
/// Seconds are accepted and discarded. Returns `None` for anything that is
/// not a clock time within a single day.
pub fn from_hhmm(text: &str) -> Option<i32> {
    let mut fields = text.split(':');

    let hour: i32 = fields.next()?.parse().ok()?;
    let minute: i32 = fields.next()?.parse().ok()?;

    if let Some(seconds) = fields.next() {
        let seconds: i32 = seconds.parse().ok()?;
        if !(0..60).contains(&seconds) {
            return None;
        }
    }

    if fields.next().is_some() {
        return None;
    }

    if !(0..24).contains(&hour) || !(0..60).contains(&minute) {
        return None;
    }

    Some(hour * 60 + minute)
}
