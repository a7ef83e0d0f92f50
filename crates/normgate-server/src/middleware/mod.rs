//! Request middleware: authentication and structured request logging.

mod auth;
mod logging;

pub use auth::auth_middleware;
pub use logging::logging_middleware;
