//! HTTP handlers. Each one extracts the caller and the request, delegates
//! to `DriveService`, and maps `DriveError` through `AppError`.

pub mod actor;
pub mod file_handlers;
pub mod folder_handlers;
pub mod health_handlers;
