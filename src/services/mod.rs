/// OpenAPI documentation generation.
pub mod documentation;
/// Turn timer operations on the shared game document.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Optimistic-lock retry driver.
pub mod retry;
/// Storage connection supervisor driving degraded mode.
pub mod storage_supervisor;
