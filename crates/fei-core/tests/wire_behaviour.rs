//! Integration tests for the fei-core public API.
//!
//! These tests exercise the types the way the server uses them: a chat frame
//! goes out as JSON and comes back in through a browser, a refresh event is
//! framed for the SSE stream, and a resumed download is planned from the
//! `Range` and `If-Range` headers of a request.

use fei_core::domain::lifecycle::{MIN_PORT, DEFAULT_PORT};
use fei_core::domain::share::{parse_share_log, render_share_log, without_locator};
use fei_core::protocol::{content_disposition, entity_tag, if_range_matches};
use fei_core::{
    encode_sse_event, parse_locator, parse_range_header, plan_transition, ByteRange, Message,
    Phase, RangeError, ServerCommand, SharedFileInfo, SseEvent, StopReason, Transition,
};

#[test]
fn test_chat_message_survives_json_transport() {
    // Arrange: a message with characters that need escaping in JSON
    let original = Message::new("user3", "line one\nline \"two\" ✓");

    // Act
    let json = serde_json::to_string(&original).expect("serialize");
    let decoded: Message = serde_json::from_str(&json).expect("deserialize");

    // Assert
    assert_eq!(decoded, original);
}

#[test]
fn test_share_listing_is_a_json_array_of_uri_and_name() {
    let snapshot = vec![
        SharedFileInfo::new("/data/files/a.txt", "a.txt"),
        SharedFileInfo::new("content://docs/7", "Holiday.jpg"),
    ];

    let value = serde_json::to_value(&snapshot).expect("serialize");

    assert_eq!(
        value,
        serde_json::json!([
            {"uri": "/data/files/a.txt", "name": "a.txt"},
            {"uri": "content://docs/7", "name": "Holiday.jpg"}
        ])
    );
}

#[test]
fn test_ping_frame_carries_timestamp_id() {
    let frame = encode_sse_event(&SseEvent::ping(1234));
    assert_eq!(frame, "id: 1234\nevent: ping\ndata: 1234\n\n");
}

#[test]
fn test_resume_download_with_matching_if_range() {
    // Arrange: a 1000-byte file last modified at t=5000ms
    let tag = entity_tag(5000, 1000);

    // Act: the browser resumes with the tag it saw earlier
    let applies = if_range_matches(&tag, &tag);
    let range = parse_range_header("bytes=100-199", 1000).expect("valid range");

    // Assert
    assert!(applies);
    assert_eq!(range, ByteRange { start: 100, end: 199 });
    assert_eq!(range.len(), 100);
    assert_eq!(range.content_range(1000), "bytes 100-199/1000");
}

#[test]
fn test_resume_download_after_file_changed_falls_back_to_full_body() {
    let old_tag = entity_tag(5000, 1000);
    let new_tag = entity_tag(6000, 1200);
    assert!(!if_range_matches(&old_tag, &new_tag));
}

#[test]
fn test_range_past_end_is_unsatisfiable() {
    assert_eq!(
        parse_range_header("bytes=2000-", 1000),
        Err(RangeError::Unsatisfiable { total: 1000 })
    );
}

#[test]
fn test_disposition_header_names_the_file() {
    let header = content_disposition("Holiday.jpg");
    assert!(header.starts_with("attachment; filename=\"Holiday.jpg\""));
}

#[test]
fn test_share_log_heals_by_rewriting_valid_subset() {
    // Arrange: a log with a garbage line and a relative path
    let log = "/srv/a.txt\nnot a locator\ncontent://p/1\n";

    // Act: keep only parseable entries, then render again
    let kept: Vec<String> = parse_share_log(log)
        .into_iter()
        .filter(|line| parse_locator(line).is_ok())
        .collect();
    let rewritten = render_share_log(&kept);

    // Assert
    assert_eq!(rewritten, "/srv/a.txt\ncontent://p/1\n");
    assert_eq!(
        render_share_log(&without_locator(kept, "/srv/a.txt")),
        "content://p/1\n"
    );
}

#[test]
fn test_default_port_scenario_start_then_stop() {
    // Configure 8080, start, then stop with a placeholder port.
    let start = plan_transition(Phase::Idle, i32::from(DEFAULT_PORT), None);
    assert_eq!(start, Transition::Start { port: 8080 });

    let stop = plan_transition(Phase::Running { port: 8080 }, 0, Some(ServerCommand::Stop));
    assert_eq!(stop, Transition::Stop { reason: StopReason::Command });
}

#[test]
fn test_port_just_below_minimum_is_rejected() {
    assert_eq!(
        plan_transition(Phase::Idle, MIN_PORT - 1, None),
        Transition::Reject { port: MIN_PORT - 1 }
    );
}
