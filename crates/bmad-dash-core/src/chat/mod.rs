//! Streaming coach chat: wire decoding, the exchange controller and the
//! incremental message view.

pub mod decoder;
pub mod frame;
pub mod markdown;
pub mod render;
pub mod session;
pub mod sidebar;

pub use decoder::{frames, StreamDecoder};
pub use frame::{parse_frame, StreamSignal};
pub use markdown::{escape_html, format_message};
pub use render::{MessageList, MessageNode, STREAMING_INDICATOR};
pub use session::{Callbacks, ChatHandler, ChatSession, ErrorPolicy, Exchange, ExchangeState};
pub use sidebar::{ChatSidebar, GREETING};
