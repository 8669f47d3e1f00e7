// Request extractors that reject with the standard error envelope

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejection is rendered as `BAD_REQUEST` in the envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
