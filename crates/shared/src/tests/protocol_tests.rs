use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::{
    domain::{Schedule, ScheduleId, ScheduleStatus},
    protocol::{ClientCommand, ClientFrame, CommandAck, CreateScheduleRequest, ServerEvent},
};

fn schedule_json(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": "Morning show",
        "videoIdentifier": "morning.mp4",
        "broadcastDateTime": "2026-10-18T07:30:00.000Z",
        "durationMinutes": null,
        "rtmpServer": "rtmp://a.rtmp.youtube.com/live2",
        "streamKey": "abcd-efgh",
        "status": status,
    })
}

#[test]
fn create_frame_carries_camel_case_payload_and_ack_id() {
    let frame = ClientFrame {
        ack_id: Some(4),
        command: ClientCommand::CreateSchedule(CreateScheduleRequest {
            title: "Evening".to_string(),
            video_identifier: "evening.mp4".to_string(),
            broadcast_date_time: Utc.with_ymd_and_hms(2026, 10, 18, 19, 0, 0).unwrap(),
            rtmp_server: "rtmp://example/live".to_string(),
            stream_key: "key".to_string(),
            duration_minutes: Some(90),
        }),
    };

    let value = serde_json::to_value(&frame).expect("encode");
    assert_eq!(value["ack_id"], 4);
    assert_eq!(value["command"]["type"], "create_schedule");
    let payload = &value["command"]["payload"];
    assert_eq!(payload["videoIdentifier"], "evening.mp4");
    assert_eq!(payload["rtmpServer"], "rtmp://example/live");
    assert_eq!(payload["streamKey"], "key");
    assert_eq!(payload["durationMinutes"], 90);
    assert_eq!(payload["broadcastDateTime"], "2026-10-18T19:00:00Z");
}

#[test]
fn indefinite_duration_is_sent_as_null() {
    let command = ClientCommand::CreateSchedule(CreateScheduleRequest {
        title: "Loop".to_string(),
        video_identifier: "loop.mp4".to_string(),
        broadcast_date_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        rtmp_server: "rtmp://example/live".to_string(),
        stream_key: "key".to_string(),
        duration_minutes: None,
    });
    let value = serde_json::to_value(&command).expect("encode");
    assert!(value["payload"]["durationMinutes"].is_null());
}

#[test]
fn fire_and_forget_frames_omit_ack_id() {
    let frame = ClientFrame {
        ack_id: None,
        command: ClientCommand::StopSchedule {
            id: ScheduleId::from("s-1"),
        },
    };
    let value = serde_json::to_value(&frame).expect("encode");
    assert!(value.get("ack_id").is_none());
    assert_eq!(value["command"], json!({"type": "stop_schedule", "payload": {"id": "s-1"}}));

    let value = serde_json::to_value(ClientCommand::EmergencyStopAll).expect("encode");
    assert_eq!(value["type"], "emergency_stop_all");
}

#[test]
fn broadcast_update_decodes_full_schedule_list() {
    let raw = json!({
        "type": "broadcast_update",
        "payload": [schedule_json("a", "LIVE"), schedule_json("b", "RETRYING")],
    });
    let event: ServerEvent = serde_json::from_value(raw).expect("decode");
    let ServerEvent::BroadcastUpdate(schedules) = event else {
        panic!("expected broadcast_update");
    };
    assert_eq!(schedules.len(), 2);
    assert_eq!(schedules[0].status, ScheduleStatus::Live);
    assert_eq!(schedules[1].status, ScheduleStatus::Retrying);
    assert_eq!(schedules[0].duration_minutes, None);
}

#[test]
fn unrecognized_status_decodes_as_unknown() {
    let schedule: Schedule =
        serde_json::from_value(schedule_json("a", "PAUSED")).expect("decode");
    assert_eq!(schedule.status, ScheduleStatus::Unknown);
}

#[test]
fn missing_duration_field_means_indefinite() {
    let mut raw = schedule_json("a", "PENDING");
    raw.as_object_mut().expect("object").remove("durationMinutes");
    let schedule: Schedule = serde_json::from_value(raw).expect("decode");
    assert_eq!(schedule.duration_minutes, None);
}

#[test]
fn ack_event_decodes_rejection_message() {
    let raw = json!({
        "type": "ack",
        "payload": {"ack_id": 9, "ack": {"success": false, "error": "video not found"}},
    });
    let event: ServerEvent = serde_json::from_value(raw).expect("decode");
    assert_eq!(
        event,
        ServerEvent::Ack {
            ack_id: 9,
            ack: CommandAck::rejected("video not found"),
        }
    );
}

#[test]
fn process_stats_tolerates_missing_fields() {
    let raw = json!({"type": "process_stats", "payload": {"runningStreams": 2}});
    let event: ServerEvent = serde_json::from_value(raw).expect("decode");
    let ServerEvent::ProcessStats(stats) = event else {
        panic!("expected process_stats");
    };
    assert_eq!(stats.running_streams, 2);
    assert!(stats.process_ids.is_empty());
    assert!(stats.processes.is_empty());
}

#[test]
fn terminal_statuses_are_completed_and_failed() {
    let terminal: Vec<_> = ScheduleStatus::ALL
        .into_iter()
        .filter(|status| status.is_terminal())
        .collect();
    assert_eq!(terminal, vec![ScheduleStatus::Completed, ScheduleStatus::Failed]);
}
