//! Response body type for the middleware's own responses.
//!
//! Rejection responses carry small fixed bodies; pass-through responses from
//! the wrapped handler are re-bodied by the handler itself. [`ResponseBody`]
//! supports exactly those two shapes: a buffered payload or nothing.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;

/// Response body supporting buffered and empty modes.
///
/// Implements [`http_body::Body`] so it can be used directly with hyper
/// responses.
#[derive(Debug, Default)]
pub enum ResponseBody {
    /// Buffered body for rejection messages and handler payloads.
    Buffered(Full<Bytes>),
    /// Empty body.
    #[default]
    Empty,
}

impl ResponseBody {
    /// Create a buffered body from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(s.into())))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }
}

impl http_body::Body for ResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
