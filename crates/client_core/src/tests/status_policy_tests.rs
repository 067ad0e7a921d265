use super::*;

#[test]
fn policy_table_matches_status_machine() {
    let expected = [
        (ScheduleStatus::Pending, false, true),
        (ScheduleStatus::Live, true, false),
        (ScheduleStatus::Retrying, true, false),
        (ScheduleStatus::Stopping, false, false),
        (ScheduleStatus::Completed, false, true),
        (ScheduleStatus::Failed, false, true),
    ];

    for (status, can_stop, can_delete) in expected {
        let policy = StatusPolicy::for_status(status);
        assert_eq!(
            (policy.can_stop, policy.can_delete),
            (can_stop, can_delete),
            "unexpected policy for {status}"
        );
    }
}

#[test]
fn no_status_allows_both_stop_and_delete() {
    for status in ScheduleStatus::ALL
        .into_iter()
        .chain(std::iter::once(ScheduleStatus::Unknown))
    {
        let policy = StatusPolicy::for_status(status);
        assert!(
            !(policy.can_stop && policy.can_delete),
            "{status} allows both actions"
        );
    }
}

#[test]
fn unknown_status_is_labelled_and_inert() {
    let policy = StatusPolicy::for_status(ScheduleStatus::Unknown);
    assert_eq!(policy.label, "Unknown");
    assert!(!policy.allows(ScheduleAction::Stop));
    assert!(!policy.allows(ScheduleAction::Delete));
}

#[test]
fn allows_reflects_flags() {
    let live = StatusPolicy::for_status(ScheduleStatus::Live);
    assert!(live.allows(ScheduleAction::Stop));
    assert!(!live.allows(ScheduleAction::Delete));

    let failed = StatusPolicy::for_status(ScheduleStatus::Failed);
    assert_eq!(failed.label, "Failed");
    assert!(failed.allows(ScheduleAction::Delete));
}
