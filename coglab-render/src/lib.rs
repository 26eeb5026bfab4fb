mod render;
pub mod text;

pub use ab_glyph::FontArc;
pub use render::{SkiaSurface, SurfaceStyle};
pub use text::{DEFAULT_FONT_PATH, TextCache, load_font, render_text_pixmap};
