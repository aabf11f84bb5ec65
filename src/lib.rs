mod camera;
pub mod geometry;
pub mod render_target;
pub mod renderer;
pub mod scene;
pub mod util;

pub use camera::Camera;
pub use render_target::{FrameBuffer, ImageSaveError, RenderTarget};
pub use renderer::{
    PostProcess, RenderError, RenderProgress, RenderSettings, WorkerCount, render_all,
    render_frame,
};
pub use scene::{KdTree, Object, Scene, Trace};
