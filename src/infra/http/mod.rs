pub mod api;
mod middleware;

pub use api::{HttpState, build_router};
pub use middleware::RequestContext;
