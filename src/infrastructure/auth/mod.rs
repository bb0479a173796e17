pub mod middleware;
pub mod rate_limit;
pub mod request_id;

pub use middleware::{gate_middleware, CallerToken};
pub use rate_limit::RateLimiter;
pub use request_id::{request_id_middleware, RequestId};
