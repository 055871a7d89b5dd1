//! Infrastructure layer - External service implementations

pub mod api_key;
pub mod logging;
pub mod side_call;
pub mod storage;
