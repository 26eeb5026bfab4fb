use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow};
use coglab_cache::{Atom, get_text, intern_text};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Where the renderer looks when no font is given.
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("font {} is not usable: {e}", path.display()))
}

/// Rasterizes `text` on one line into a tight, transparent, premultiplied
/// pixmap. `None` when nothing in the string has an outline.
pub fn render_text_pixmap(text: &str, font_size: f32, font: &FontArc, rgba: [u8; 4]) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }

    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;

    // fresh pixmaps are transparent black
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * rgba[3] as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let premul = |c: u8| ((c as f32 * a) as u8).min(sa);
            let bg = dst[i];
            // src over dst, premultiplied
            let inv = 1.0 - sa as f32 / 255.0;
            let over = |s: u8, d: u8| s.saturating_add((d as f32 * inv) as u8);
            let alpha = over(sa, bg.alpha());
            let blended = PremultipliedColorU8::from_rgba(
                over(premul(rgba[0]), bg.red()).min(alpha),
                over(premul(rgba[1]), bg.green()).min(alpha),
                over(premul(rgba[2]), bg.blue()).min(alpha),
                alpha,
            );
            if let Some(px) = blended {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

/// Glyph pixmaps keyed by interned string id.
pub struct TextCache {
    font: Option<FontArc>,
    size_px: f32,
    rgba: [u8; 4],
    map: HashMap<usize, Option<Arc<Pixmap>>>,
}

impl TextCache {
    pub fn new(font: Option<FontArc>, size_px: f32, rgba: [u8; 4]) -> Self {
        Self {
            font,
            size_px,
            rgba,
            map: HashMap::new(),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get_or_render(&mut self, text: &str) -> Option<Arc<Pixmap>> {
        let id = intern_text(text);
        self.get_or_render_id(id)
    }

    pub fn get_or_render_id(&mut self, id: usize) -> Option<Arc<Pixmap>> {
        if let Some(cached) = self.map.get(&id) {
            return cached.clone();
        }
        let font = self.font.as_ref()?;
        let atom: Atom = get_text(id)?;
        let rendered = render_text_pixmap(&atom, self.size_px, font, self.rgba).map(Arc::new);
        self.map.insert(id, rendered.clone());
        rendered
    }
}
