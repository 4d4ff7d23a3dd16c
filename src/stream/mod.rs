//! Incremental summary streaming: wire frames, encoder, decoder and transports.
//!
//! - `frame`: the `<tag>:<json string>\n` wire format
//! - `encoder`: fragments to bytes (producer side)
//! - `decoder`: bytes to frames plus the running text (consumer side)
//! - `transport`: HTTP and in-process byte channels
//! - `error`: stream, decode and generation errors

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod transport;

pub use decoder::{Accumulator, FrameDecoder};
pub use encoder::{encode_fragments, open_summary_stream};
pub use error::{DecodeError, GenerationError, StreamError};
pub use frame::WireFrame;
pub use transport::{ByteStream, HttpTransport, LocalTransport, Transport};
