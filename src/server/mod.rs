//! HTTP session API over a running [`SessionCoordinator`](crate::SessionCoordinator)

mod routes;

pub use routes::{create_router, create_router_with_name, SessionState};
