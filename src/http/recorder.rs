//! Recording response body.
//!
//! Wraps a response body, forwarding every frame unchanged while counting the
//! data bytes and optionally keeping a copy. When the body ends, or is dropped
//! before it ends, the recording is handed to a completion callback exactly once.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use pin_project_lite::pin_project;

/// What passed through a [`RecordingBody`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recorded {
    /// Copy of the data, up to the retention limit.
    pub body: Vec<u8>,
    /// Total data bytes forwarded.
    pub size: u64,
    /// The copy stopped short of `size`.
    pub truncated: bool,
}

type OnComplete = Box<dyn FnOnce(Recorded) + Send>;

struct Recorder {
    retain: Option<usize>,
    recorded: Recorded,
    on_complete: Option<OnComplete>,
}

impl Recorder {
    fn observe(&mut self, data: &[u8]) {
        self.recorded.size += data.len() as u64;

        let Some(limit) = self.retain else {
            return;
        };
        let room = limit.saturating_sub(self.recorded.body.len());
        if data.len() > room {
            self.recorded.truncated = true;
        }
        self.recorded
            .body
            .extend_from_slice(&data[..data.len().min(room)]);
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(std::mem::take(&mut self.recorded));
        }
    }
}

pin_project! {
    /// Response body decorator that tees data frames into a [`Recorded`].
    pub struct RecordingBody<B> {
        #[pin]
        inner: B,
        recorder: Option<Recorder>,
    }
}

impl<B> RecordingBody<B> {
    /// Wrap `inner`. With `retain = Some(n)` the first `n` bytes are copied;
    /// with `None` bytes are only counted.
    pub fn new<F>(inner: B, retain: Option<usize>, on_complete: F) -> Self
    where
        F: FnOnce(Recorded) + Send + 'static,
    {
        Self {
            inner,
            recorder: Some(Recorder {
                retain,
                recorded: Recorded::default(),
                on_complete: Some(Box::new(on_complete)),
            }),
        }
    }
}

impl<B> HttpBody for RecordingBody<B>
where
    B: HttpBody<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let poll = this.inner.poll_frame(cx);

        match &poll {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(data), Some(recorder)) = (frame.data_ref(), this.recorder.as_mut()) {
                    recorder.observe(data);
                }
            }
            Poll::Ready(None) => {
                drop(this.recorder.take());
            }
            Poll::Ready(Some(Err(_))) | Poll::Pending => {}
        }

        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
