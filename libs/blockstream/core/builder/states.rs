//! Type-state markers for [`StreamClientBuilder`](super::StreamClientBuilder)
//!
//! `build()` only exists once an API key has been supplied.

/// Marker trait for the API key state
pub trait ApiKeyState {}

/// API key has not been set
pub struct NoApiKey;
impl ApiKeyState for NoApiKey {}

/// API key has been set
pub struct HasApiKey;
impl ApiKeyState for HasApiKey {}
