//! `HH:MM:SS` format adapters

use crate::error::{KillfeedError, Result};

/// Parse `HH:MM:SS`, `MM:SS` or plain seconds into a second count.
pub fn to_seconds(hms: &str) -> Result<u64> {
    let parts: Vec<&str> = hms.trim().split(':').collect();
    let field = |s: &str| -> Result<u64> {
        s.trim().parse::<u64>().map_err(|_| {
            KillfeedError::InvalidConfig(format!("Invalid time component '{}' in '{}'", s, hms))
        })
    };

    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (field(h)?, field(m)?, field(s)?),
        [m, s] => (0, field(m)?, field(s)?),
        [s] => (0, 0, field(s)?),
        _ => return Err(KillfeedError::InvalidConfig(format!("Invalid time '{}'", hms))),
    };

    h.checked_mul(3600)
        .and_then(|secs| m.checked_mul(60).and_then(|mins| secs.checked_add(mins)))
        .and_then(|total| total.checked_add(s))
        .ok_or_else(|| KillfeedError::InvalidConfig(format!("Time '{}' is out of range", hms)))
}

/// Zero-padded `HH:MM:SS`. Hours are not wrapped at 24.
pub fn to_hhmmss(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_seconds_formats() {
        assert_eq!(to_seconds("02:39:00").unwrap(), 9540);
        assert_eq!(to_seconds("34:40").unwrap(), 2080);
        assert_eq!(to_seconds("75").unwrap(), 75);
        assert_eq!(to_seconds(" 00:00:05 ").unwrap(), 5);
    }

    #[test]
    fn test_to_seconds_rejects_garbage() {
        assert!(to_seconds("aa:bb").is_err());
        assert!(to_seconds("1:2:3:4").is_err());
        assert!(to_seconds("").is_err());
        assert!(to_seconds("-5").is_err());
    }

    #[test]
    fn test_to_seconds_rejects_overflow() {
        assert!(matches!(
            to_seconds("9999999999999999:00:00"),
            Err(KillfeedError::InvalidConfig(_))
        ));
        assert!(matches!(
            to_seconds("0:999999999999999999:00"),
            Err(KillfeedError::InvalidConfig(_))
        ));
        assert!(matches!(
            to_seconds(&format!("1:00:{}", u64::MAX)),
            Err(KillfeedError::InvalidConfig(_))
        ));
        assert_eq!(to_seconds(&u64::MAX.to_string()).unwrap(), u64::MAX);
    }

    #[test]
    fn test_to_hhmmss() {
        assert_eq!(to_hhmmss(0), "00:00:00");
        assert_eq!(to_hhmmss(125), "00:02:05");
        assert_eq!(to_hhmmss(11400), "03:10:00");
        assert_eq!(to_hhmmss(90000), "25:00:00");
        assert_eq!(to_seconds(&to_hhmmss(9540)).unwrap(), 9540);
    }
}
