//! Text framing for Server-Sent Events.
//!
//! Wire format of one event:
//!
//! ```text
//! id: <id>            (optional)
//! event: <label>      (optional)
//! data: <line 1>
//! data: <line 2>      (one line per payload line)
//!                     (blank line terminates the event)
//! ```
//!
//! The browser's `EventSource` joins the `data:` lines back together with
//! `\n`, so multi-line payloads survive the trip unchanged.

use crate::protocol::messages::SseEvent;

/// Renders `event` as one complete SSE frame, including the terminating
/// blank line.
///
/// `id` and `event` values cannot contain line breaks on the wire; any
/// `\r` or `\n` in them is replaced by a space.  `\r\n` and lone `\r` in the
/// payload are treated as line breaks.
///
/// # Example
///
/// ```rust
/// use fei_core::{encode_sse_event, SseEvent};
///
/// let frame = encode_sse_event(&SseEvent::new("a\nb").with_event("refresh"));
/// assert_eq!(frame, "event: refresh\ndata: a\ndata: b\n\n");
/// ```
pub fn encode_sse_event(event: &SseEvent) -> String {
    let mut out = String::with_capacity(event.data.len() + 48);

    if let Some(id) = &event.id {
        push_field(&mut out, "id", id);
    }
    if let Some(label) = &event.event {
        push_field(&mut out, "event", label);
    }

    let normalized = event.data.replace("\r\n", "\n").replace('\r', "\n");
    for line in normalized.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }

    out.push('\n');
    out
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.extend(value.chars().map(|c| if c == '\r' || c == '\n' { ' ' } else { c }));
    out.push('\n');
}

// ── Tests ─────────────────────────────────────────────────────────────────────
