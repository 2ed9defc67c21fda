//! Wire-protocol framing: message types, encoder, and decoder.

pub mod messages;
pub mod reader;
pub mod writer;

pub use messages::{
    BackendMessage, DescribeKind, FieldDescription, FrontendMessage, PROTOCOL_VERSION,
    SSL_REQUEST_CODE, TransactionStatus, backend_type, frontend_type,
};
pub use reader::MessageReader;
pub use writer::MessageWriter;
