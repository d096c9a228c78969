pub mod config;
pub mod direction;
pub mod motion;
pub mod polyline;
pub mod repository;
pub mod session;
pub mod shared;
pub mod snap;
pub mod source;
pub mod swap;
pub mod vehicle;

pub use config::Config;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::direction::{Direction, DirectionResolver, RouteStop};
    pub use crate::motion::{Animator, Fleet, MotionFrame, MotionOptions};
    pub use crate::polyline::{Polyline, Projection, RoutePolylines, SearchHint};
    pub use crate::repository::{Repository, RouteShape, RouteVariant, Station};
    pub use crate::session::{RouteSession, VehicleFrame, VehicleSnapshot};
    pub use crate::shared::{Coordinate, Distance, Timestamp};
    pub use crate::snap::{SnapEngine, SnapHints, SnapResult};
    pub use crate::source::Source;
    pub use crate::vehicle::VehicleFix;
}
