pub mod frame;
pub mod message;

/// The number of ascii digits that state the payload length
pub const HEADER_LEN: usize = 8;

/// The biggest payload whose length fits in the header
pub const MAX_PAYLOAD_LEN: usize = 99_999_999;
