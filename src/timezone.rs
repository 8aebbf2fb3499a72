use crate::clock::{self, DAY_MINUTES};
use chrono::{Duration, Local};

/// Half a day in minutes. Offsets are normalized into `[-HALF_DAY, HALF_DAY]`.
const HALF_DAY: i32 = DAY_MINUTES / 2;

/// Resolves a user's clock offset from the time they claim it currently is.
///
/// Both arguments are minutes since midnight: the server's clock and the
/// time the user typed. The server reads its clock after the message was
/// sent, so it can only have drifted past the user's stated time, never
/// behind it; the server minute is walked backwards until the difference
/// lands on the 5-minute grid. The result is server-time minus user-time,
/// normalized into `[-720, 720]`.
pub fn resolve_offset(server_minutes: i32, user_minutes: i32) -> i32 {
    let mut server = server_minutes;
    while (server - user_minutes).rem_euclid(5) != 0 {
        server -= 1;
    }

    let mut offset = server - user_minutes;
    if offset > HALF_DAY {
        offset -= DAY_MINUTES;
    } else if offset < -HALF_DAY {
        offset += DAY_MINUTES;
    }

    offset
}

/// Returns the user's local calendar date as "DD.MM".
///
/// The offset is subtracted from the server clock, so a user twelve hours
/// behind the server can still be on yesterday's date.
pub fn local_date(offset_minutes: i32) -> String {
    let user_now = Local::now() - Duration::minutes(offset_minutes as i64);
    user_now.format("%d.%m").to_string()
}

/// Converts a user-local minutes-since-midnight value into the server-local
/// "HH:MM" bucket it falls in, wrapping across midnight when the offset
/// pushes it out of the day.
pub fn server_bucket(user_minutes: i32, offset_minutes: i32) -> String {
    clock::to_hhmm(user_minutes + offset_minutes)
}

#[cfg(test)]
mod test {
    use super::{resolve_offset, server_bucket};

    #[test]
    fn test_resolve_offset_same_zone() {
        // Server reads 10:03 a few seconds after the user typed "10:00".
        assert_eq!(resolve_offset(603, 600), 0);
    }

    #[test]
    fn test_resolve_offset_lands_on_grid() {
        for server in [600, 601, 602, 603, 604] {
            let offset = resolve_offset(server, 420);
            assert_eq!(offset.rem_euclid(5), 0);
            assert!(offset.abs() <= 720);
            assert_eq!((server - 420 - offset).rem_euclid(5), 0);
        }
    }

    #[test]
    fn test_resolve_offset_user_ahead_of_server() {
        // User is three hours ahead: their 13:00 is the server's 10:03.
        assert_eq!(resolve_offset(603, 780), -180);
    }

    #[test]
    fn test_resolve_offset_wraps_across_midnight() {
        // Server just past midnight, user still on 23:00 yesterday.
        assert_eq!(resolve_offset(62, 1380), 120);
        // Server at 23:02, user already on 01:00 tomorrow.
        assert_eq!(resolve_offset(1382, 60), -120);
    }

    #[test]
    fn test_server_bucket() {
        assert_eq!(server_bucket(600, 30), "10:30");
        assert_eq!(server_bucket(600, -45), "09:15");
        assert_eq!(server_bucket(1435, 30), "00:05");
        assert_eq!(server_bucket(10, -30), "23:40");
    }
}
