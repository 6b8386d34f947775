//! The `Loading → Success | Error` envelope every asynchronous operation
//! reports through.

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;

use crate::error::SwapError;

/// Outcome of an asynchronous operation as observed by a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    Loading,
    Success(T),
    Error(SwapError),
}

impl<T> Resource<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading)
    }

    /// True for `Success` and `Error`.
    pub fn is_terminal(&self) -> bool {
        !self.is_loading()
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Resource::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SwapError> {
        match self {
            Resource::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Converts a terminal value back into a `Result`. `Loading` yields `None`.
    pub fn into_result(self) -> Option<Result<T, SwapError>> {
        match self {
            Resource::Loading => None,
            Resource::Success(data) => Some(Ok(data)),
            Resource::Error(e) => Some(Err(e)),
        }
    }
}

impl<T> From<Result<T, SwapError>> for Resource<T> {
    fn from(result: Result<T, SwapError>) -> Self {
        match result {
            Ok(data) => Resource::Success(data),
            Err(e) => Resource::Error(e),
        }
    }
}

/// A stream that yields one `Loading` followed by one terminal value.
pub type ResourceStream<T> = BoxStream<'static, Resource<T>>;

/// Builds a [`ResourceStream`] around a single operation.
///
/// `Loading` is yielded before the operation is polled, so the terminal
/// value can never overtake it.
pub fn resource_stream<T, F>(operation: F) -> ResourceStream<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T, SwapError>> + Send + 'static,
{
    let operation: BoxFuture<'static, Result<T, SwapError>> = Box::pin(operation);
    stream::once(async { Resource::Loading })
        .chain(stream::once(async move { Resource::from(operation.await) }))
        .boxed()
}

/// Drives a resource stream to completion and returns its terminal value.
pub async fn settle<T>(mut stream: ResourceStream<T>) -> Result<T, SwapError> {
    while let Some(state) = stream.next().await {
        if let Some(result) = state.into_result() {
            return result;
        }
    }
    Err(SwapError::Local("operation ended without a result".to_string()))
}
