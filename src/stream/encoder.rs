//! Producer side: fragments in, wire bytes out.

use futures::StreamExt;
use std::time::Duration;

use super::error::StreamError;
use super::frame::WireFrame;
use super::transport::ByteStream;
use crate::backends::{BackendError, FragmentSource, FragmentStream};
use crate::models::GenerationRequest;

/// Starts generation and waits for the first fragment before committing to a
/// stream, so a backend that fails up front is reported as a plain error with
/// no bytes sent.
pub async fn open_summary_stream(
    source: &dyn FragmentSource,
    request: &GenerationRequest,
    pacing: Duration,
) -> Result<ByteStream, BackendError> {
    let mut fragments = source.fragments(request).await?;
    let first = match fragments.next().await {
        Some(Ok(fragment)) => Some(fragment),
        Some(Err(e)) => return Err(e),
        None => None,
    };
    Ok(encode_fragments(first, fragments, pacing))
}

/// Encodes fragments as text-delta frames. Every fragment after the first
/// gets a leading space. A failure mid-stream emits an error frame, lets it
/// flush, and then ends the stream with `Err`, which aborts the response body.
pub fn encode_fragments(
    first: Option<String>,
    mut rest: FragmentStream,
    pacing: Duration,
) -> ByteStream {
    let stream = async_stream::stream! {
        let Some(first) = first else {
            return;
        };
        yield Ok(WireFrame::TextDelta(first).encode());

        while let Some(item) = rest.next().await {
            if !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            match item {
                Ok(fragment) => {
                    yield Ok(WireFrame::TextDelta(format!(" {}", fragment)).encode());
                }
                Err(e) => {
                    log::error!("❌ Fragment source failed mid-stream: {}", e);
                    yield Ok(WireFrame::Error(e.message.clone()).encode());
                    // The body writer flushes on `Pending`; without this the
                    // abort below drops the buffered error frame.
                    tokio::task::yield_now().await;
                    yield Err(StreamError::Backend(e.message));
                    return;
                }
            }
        }
    };
    Box::pin(stream)
}
