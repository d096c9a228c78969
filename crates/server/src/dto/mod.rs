mod direction;
mod route;
mod vehicle;

pub use direction::*;
pub use route::*;
pub use vehicle::*;
