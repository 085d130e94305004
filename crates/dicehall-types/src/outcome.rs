//! Structured outcome envelope for the chat collaborator.
//!
//! Every operation the collaborator calls answers with `(ok, reason, data)`.
//! The collaborator renders it; it never inspects [`DicehallError`] itself.

use serde::Serialize;

use crate::{DicehallError, Reason};

/// `(ok, reason, data)` as one serializable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome<T> {
    pub ok: bool,
    pub reason: Option<Reason>,
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            reason: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn failure(reason: Reason) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            data: None,
        }
    }
}

impl<T> From<crate::Result<T>> for Outcome<T> {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::from(err),
        }
    }
}

impl<T> From<DicehallError> for Outcome<T> {
    fn from(err: DicehallError) -> Self {
        Self::failure(err.reason())
    }
}
