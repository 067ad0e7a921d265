use client_core::{ClientEvent, NotificationLevel, StatusPolicy, View};
use shared::domain::Schedule;

pub fn event(event: &ClientEvent) {
    match event {
        ClientEvent::ConnectionChanged { .. } => {}
        ClientEvent::SchedulesUpdated(schedules) => print_schedules(schedules),
        ClientEvent::Notification(note) => {
            let tag = match note.level {
                NotificationLevel::Loading => "..",
                NotificationLevel::Success => "ok",
                NotificationLevel::Error => "!!",
                NotificationLevel::Info => "--",
            };
            println!("[{tag}] {}", note.message);
        }
        ClientEvent::ViewChanged(View::Manage) => println!("(showing scheduled streams)"),
        ClientEvent::ViewChanged(View::Create) => {}
        ClientEvent::ProcessStats(stats) => {
            println!("{} stream process(es) running", stats.running_streams);
        }
    }
}

fn print_schedules(schedules: &[Schedule]) {
    if schedules.is_empty() {
        println!("no scheduled streams");
        return;
    }
    println!(
        "{:<24} {:<28} {:<10} {:<20} {}",
        "ID", "TITLE", "STATUS", "STARTS", "DURATION"
    );
    for schedule in schedules {
        let duration = schedule
            .duration_minutes
            .map_or_else(|| "until stopped".to_string(), |m| format!("{m} min"));
        println!(
            "{:<24} {:<28} {:<10} {:<20} {}",
            schedule.id,
            schedule.title,
            StatusPolicy::for_status(schedule.status).label,
            schedule.broadcast_label(),
            duration
        );
    }
}
