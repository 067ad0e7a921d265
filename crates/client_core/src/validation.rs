//! Creation form model and the client-side checks that gate `create_schedule`.

use std::fmt;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use shared::protocol::CreateScheduleRequest;

use crate::error::{FieldError, ValidationErrors};

pub const DEFAULT_RTMP_SERVER: &str = "rtmp://a.rtmp.youtube.com/live2";
pub const DEFAULT_CUSTOM_DURATION_MINUTES: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    Title,
    VideoIdentifier,
    Date,
    Time,
    RtmpServer,
    StreamKey,
    Duration,
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DraftField::Title => "title",
            DraftField::VideoIdentifier => "videoIdentifier",
            DraftField::Date => "date",
            DraftField::Time => "time",
            DraftField::RtmpServer => "rtmpServer",
            DraftField::StreamKey => "streamKey",
            DraftField::Duration => "duration",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationChoice {
    /// Loop the video until someone stops it.
    Indefinite,
    /// Raw minutes as typed into the form.
    Custom(String),
}

impl DurationChoice {
    pub fn custom_default() -> Self {
        DurationChoice::Custom(DEFAULT_CUSTOM_DURATION_MINUTES.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDraft {
    pub title: String,
    pub video_identifier: String,
    /// `YYYY-MM-DD`, local time zone.
    pub date: String,
    /// `HH:MM`, local time zone.
    pub time: String,
    pub rtmp_server: String,
    pub stream_key: String,
    pub duration: DurationChoice,
}

impl Default for ScheduleDraft {
    fn default() -> Self {
        Self::new(DEFAULT_RTMP_SERVER)
    }
}

impl ScheduleDraft {
    pub fn new(default_rtmp_server: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            title: String::new(),
            video_identifier: String::new(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M").to_string(),
            rtmp_server: default_rtmp_server.into(),
            stream_key: String::new(),
            duration: DurationChoice::Indefinite,
        }
    }

    /// Keeps date, time, endpoint and duration so a similar schedule can be
    /// entered next.
    pub fn clear_after_submit(&mut self) {
        self.title.clear();
        self.video_identifier.clear();
        self.stream_key.clear();
    }

    pub fn validate(&self) -> Result<CreateScheduleRequest, ValidationErrors> {
        let mut errors = Vec::new();
        let mut require = |field: DraftField, value: &str, message: &str| {
            if value.trim().is_empty() {
                errors.push(FieldError {
                    field,
                    message: message.to_string(),
                });
            }
        };
        require(DraftField::Title, &self.title, "title is required");
        require(
            DraftField::VideoIdentifier,
            &self.video_identifier,
            "video file name is required",
        );
        require(
            DraftField::RtmpServer,
            &self.rtmp_server,
            "RTMP server is required",
        );
        require(DraftField::StreamKey, &self.stream_key, "stream key is required");

        let date = match NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(FieldError {
                    field: DraftField::Date,
                    message: format!("'{}' is not a valid date (YYYY-MM-DD)", self.date),
                });
                None
            }
        };
        let time = match parse_time(&self.time) {
            Some(time) => Some(time),
            None => {
                errors.push(FieldError {
                    field: DraftField::Time,
                    message: format!("'{}' is not a valid time (HH:MM)", self.time),
                });
                None
            }
        };

        let duration_minutes = match &self.duration {
            DurationChoice::Indefinite => None,
            DurationChoice::Custom(raw) => match raw.trim().parse::<u32>() {
                Ok(minutes) if minutes > 0 => Some(minutes),
                _ => {
                    errors.push(FieldError {
                        field: DraftField::Duration,
                        message: format!(
                            "'{raw}' is not a positive whole number of minutes"
                        ),
                    });
                    None
                }
            },
        };

        let broadcast_date_time = match (date, time) {
            (Some(date), Some(time)) => {
                let local = Local
                    .from_local_datetime(&NaiveDateTime::new(date, time))
                    .earliest();
                if local.is_none() {
                    errors.push(FieldError {
                        field: DraftField::Time,
                        message: format!(
                            "{} {} does not exist in the local time zone",
                            self.date.trim(),
                            self.time.trim()
                        ),
                    });
                }
                local.map(|instant| instant.with_timezone(&Utc))
            }
            _ => None,
        };

        match broadcast_date_time {
            Some(broadcast_date_time) if errors.is_empty() => Ok(CreateScheduleRequest {
                title: self.title.trim().to_string(),
                video_identifier: self.video_identifier.trim().to_string(),
                broadcast_date_time,
                rtmp_server: self.rtmp_server.trim().to_string(),
                stream_key: self.stream_key.trim().to_string(),
                duration_minutes,
            }),
            _ => Err(ValidationErrors(errors)),
        }
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
