pub mod overlay;
pub mod renderer;
pub mod style;
pub mod surface;

pub use overlay::{OverlayError, SurfaceManager};
