use chrono::{TimeZone, Utc};
use shared::domain::{Schedule, ScheduleId, ScheduleStatus};

pub(crate) fn schedule(id: &str, title: &str, status: ScheduleStatus) -> Schedule {
    Schedule {
        id: ScheduleId::from(id),
        title: title.to_string(),
        video_identifier: format!("{id}.mp4"),
        broadcast_date_time: Utc
            .with_ymd_and_hms(2026, 10, 18, 20, 0, 0)
            .single()
            .expect("valid instant"),
        duration_minutes: Some(60),
        rtmp_server: "rtmp://a.rtmp.youtube.com/live2".to_string(),
        stream_key: format!("key-{id}"),
        status,
    }
}
