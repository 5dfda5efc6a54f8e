//! ctxmenu-server - local JSON API over the context-menu engine
//!
//! Every registry and log call runs on the blocking pool; handlers only
//! translate between JSON and [`ctxmenu_core`] types. Errors come back as
//! `{"error": "..."}` with a status derived from the core error kind.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
