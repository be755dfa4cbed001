use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date and time keys naming one ring: `2024-5-1` and `14-3-10`, unpadded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingStamp {
    pub date_key: String,
    pub time_key: String,
}

impl RingStamp {
    pub fn from_datetime<T: TimeZone>(datetime: &DateTime<T>) -> Self {
        Self {
            date_key: format!(
                "{}-{}-{}",
                datetime.year(),
                datetime.month(),
                datetime.day()
            ),
            time_key: format!(
                "{}-{}-{}",
                datetime.hour(),
                datetime.minute(),
                datetime.second()
            ),
        }
    }

    /// Stamp for the current instant in the given zone, or local time
    pub fn now(timezone: Option<Tz>) -> Self {
        match timezone {
            Some(tz) => Self::from_datetime(&Utc::now().with_timezone(&tz)),
            None => Self::from_datetime(&Local::now()),
        }
    }

    /// Photo file name inside the day directory
    pub fn image_file_name(&self) -> String {
        format!("{}_{}.jpg", self.date_key, self.time_key)
    }

    /// Key of the uploaded photo in object storage
    pub fn object_key(&self) -> String {
        format!("{} - {}.jpg", self.date_key, self.time_key)
    }
}

impl fmt::Display for RingStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date_key, self.time_key)
    }
}

pub(crate) fn resolve_timezone(tz_name: Option<&str>) -> Option<Tz> {
    let name = tz_name?;
    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            tracing::warn!("Invalid timezone '{}', falling back to local time", name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unpadded() {
        let datetime = Utc.with_ymd_and_hms(2024, 5, 1, 14, 3, 10).unwrap();
        let stamp = RingStamp::from_datetime(&datetime);

        assert_eq!(stamp.date_key, "2024-5-1");
        assert_eq!(stamp.time_key, "14-3-10");
        assert_eq!(stamp.image_file_name(), "2024-5-1_14-3-10.jpg");
        assert_eq!(stamp.object_key(), "2024-5-1 - 14-3-10.jpg");
    }

    #[test]
    fn test_midnight() {
        let datetime = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
        let stamp = RingStamp::from_datetime(&datetime);
        assert_eq!(stamp.to_string(), "2023-12-31 0-0-0");
    }

    #[test]
    fn test_timezone_applied() {
        let utc = Utc.with_ymd_and_hms(2024, 5, 1, 23, 30, 0).unwrap();
        let tokyo = utc.with_timezone(&chrono_tz::Asia::Tokyo);
        let stamp = RingStamp::from_datetime(&tokyo);
        assert_eq!(stamp.date_key, "2024-5-2");
        assert_eq!(stamp.time_key, "8-30-0");
    }

    #[test]
    fn test_resolve_timezone() {
        assert_eq!(resolve_timezone(None), None);
        assert_eq!(resolve_timezone(Some("nowhere")), None);
        assert_eq!(
            resolve_timezone(Some("Europe/Berlin")),
            Some(chrono_tz::Europe::Berlin)
        );
    }
}
