//! Dify upstream client.
//!
//! One generic forwarding surface multiplexed over N upstream applications,
//! each identified by a `(url, key)` credential pair resolved by the
//! caller. Streaming replies are handed back as opaque byte streams;
//! blocking replies are parsed; error bodies pass through verbatim.

mod client;
mod conversations;
mod params;
mod upload;

pub use client::{Forwarded, UpstreamClient};
pub use conversations::{delete_conversation, rename_conversation};
pub use params::{validate_conversation_params, validate_message_params};
pub use upload::{sanitize_for_upstream, upload_file, valid_extension, ALLOWED_EXTENSIONS, MAX_FILE_SIZE};
