pub mod background;
pub mod batch;
pub mod camera;
pub mod color;
pub mod effects;
pub mod frame;
pub mod hash;
pub mod hud;
pub mod lighting;
pub mod particles;
pub mod renderer;
pub mod state;
pub mod text;
pub mod transform;

/// Width of one isometric tile diamond in screen pixels.
pub const TILE_W: f32 = 64.0;
/// Height of one isometric tile diamond in screen pixels.
pub const TILE_H: f32 = 32.0;

pub use frame::GameRenderer;
pub use renderer::GpuContext;
pub use state::RenderSettings;

use thiserror::Error;

/// Top-level error type for fallible library operations.
///
/// Programmer-usage errors (drawing outside an active batch, disposing the
/// GPU context twice) are contract violations and panic instead — see the
/// module docs of [`batch`] and [`renderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// Render settings could not be parsed.
    #[error("invalid render settings: {0}")]
    Settings(#[from] serde_json::Error),
    /// The graphics driver failed in a way the core cannot recover from.
    /// Propagated to the host; the frame is abandoned.
    #[error("gpu failure: {0}")]
    Gpu(String),
}
