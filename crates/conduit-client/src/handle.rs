//! One-shot result handles for dispatcher jobs and session replies.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use conduit_core::{ErrorKind, Response};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Create a linked responder/handle pair.
pub(crate) fn response_channel() -> (Responder, ResponseHandle) {
    let (tx, rx) = oneshot::channel();
    (Responder(tx), ResponseHandle { rx: Some(rx) })
}

/// Producer side. Consumed on resolve, so a result is delivered at most once.
#[derive(Debug)]
pub(crate) struct Responder(oneshot::Sender<Response>);

impl Responder {
    pub(crate) fn resolve(self, response: Response) {
        // The caller may have dropped its handle; that is not an error.
        let _ = self.0.send(response);
    }
}

/// Eventual [`Response`] of a submitted request or a session request.
///
/// Await it, or poll it from a tick loop with [`try_take`](Self::try_take).
/// It yields exactly one response.
#[derive(Debug)]
#[must_use = "the response is lost if the handle is dropped"]
pub struct ResponseHandle {
    rx: Option<oneshot::Receiver<Response>>,
}

impl ResponseHandle {
    /// A handle that is already resolved.
    pub fn resolved(response: Response) -> Self {
        let (responder, handle) = response_channel();
        responder.resolve(response);
        handle
    }

    /// Take the response if it is ready. Returns `None` while pending and
    /// after the response has been taken.
    pub fn try_take(&mut self) -> Option<Response> {
        let rx = self.rx.as_mut()?;
        let response = match rx.try_recv() {
            Ok(response) => response,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => closed(),
        };
        self.rx = None;
        Some(response)
    }

    pub fn is_taken(&self) -> bool {
        self.rx.is_none()
    }
}

impl Future for ResponseHandle {
    type Output = Response;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Response> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(closed());
        };
        let response = match Pin::new(rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result.unwrap_or_else(|_| closed()),
        };
        self.rx = None;
        Poll::Ready(response)
    }
}

fn closed() -> Response {
    Response::failure(ErrorKind::DataParsingError, "response channel closed", 0)
}
