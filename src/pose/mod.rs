pub mod landmark;
#[cfg(feature = "desktop")]
pub mod movenet;
pub mod source;
pub mod synthetic;

pub use landmark::{FrameSnapshot, Joint, Landmark, LandmarkLayout};
#[cfg(feature = "desktop")]
pub use movenet::MoveNetSource;
pub use source::{FrameIter, PoseSource, ReplaySource};
pub use synthetic::side_view_frame;
