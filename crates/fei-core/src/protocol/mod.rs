//! Protocol module: chat and SSE message types plus HTTP helper encodings.

pub mod headers;
pub mod messages;
pub mod range;
pub mod sequence;
pub mod sse;

pub use headers::{content_disposition, entity_tag, if_range_matches};
pub use messages::{Message, SseEvent};
pub use range::{parse_range_header, unsatisfied_content_range, ByteRange, RangeError};
pub use sequence::SequenceCounter;
pub use sse::encode_sse_event;
