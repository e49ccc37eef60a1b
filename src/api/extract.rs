//! Request body extraction

use axum::extract::FromRequest;

use crate::error::PortalError;

/// `Json` body whose rejections answer with the portal error body
#[derive(Debug, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(PortalError))]
pub struct AppJson<T>(pub T);
