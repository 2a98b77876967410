use std::{fmt, sync::Arc};

#[derive(Debug)]
/// Coalescion service error.
pub enum Error<E> {
    /// The delegated operation failed, every caller attached to it shares the same failure
    Delegate(Arc<E>),
    /// Failed to receive the outcome from the channel, the leader went away before settling
    RecvError,
}

impl<E> Error<E> {
    /// The delegated failure, if this is one
    pub fn delegate(&self) -> Option<&Arc<E>> {
        match self {
            Error::Delegate(err) => Some(err),
            Error::RecvError => None,
        }
    }
}

impl<E> Clone for Error<E> {
    fn clone(&self) -> Self {
        match self {
            Error::Delegate(err) => Error::Delegate(err.clone()),
            Error::RecvError => Error::RecvError,
        }
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Delegate(err) => write!(f, "Delegated operation failed: {err}"),
            Error::RecvError => write!(f, "Unable to receive data from the channel"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Error<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Delegate(err) => Some(err.as_ref()),
            Error::RecvError => None,
        }
    }
}
