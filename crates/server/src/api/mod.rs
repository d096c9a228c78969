mod control;
mod direction;
mod stream;
mod vehicles;

pub use control::*;
pub use direction::*;
pub use stream::*;
pub use vehicles::*;
