use crate::text::TextCache;
use ab_glyph::FontArc;
use anyhow::{Context, Result};
use coglab_core::{Coordinate, Position, PresentationSurface, ResolvedStimulus, Shape, Visual};
use log::{debug, warn};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceStyle {
    pub background: [u8; 4],
    pub foreground: [u8; 4],
    pub text_px: f32,
}

impl Default for SurfaceStyle {
    fn default() -> Self {
        Self {
            background: [0, 0, 0, 255],
            foreground: [255, 255, 255, 255],
            text_px: 32.0,
        }
    }
}

fn color(rgba: [u8; 4]) -> Color {
    Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3])
}

/// Off-screen presentation canvas. Always opaque, so its premultiplied
/// bytes can go straight into an RGBA8 frame buffer.
pub struct SkiaSurface {
    width: u32,
    height: u32,
    style: SurfaceStyle,
    canvas: Pixmap,
    text_cache: TextCache,
    generation: u64,
    warned_no_font: bool,
}

impl SkiaSurface {
    pub fn new(width: u32, height: u32, font: Option<FontArc>, style: SurfaceStyle) -> Result<Self> {
        let canvas = Pixmap::new(width.max(1), height.max(1))
            .with_context(|| format!("creating a {width}x{height} canvas"))?;
        let mut surface = Self {
            width: canvas.width(),
            height: canvas.height(),
            style,
            canvas,
            text_cache: TextCache::new(font, style.text_px, style.foreground),
            generation: 0,
            warned_no_font: false,
        };
        surface.clear();
        Ok(surface)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Bumped by every [`present`](PresentationSurface::present).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Pixmap::new(width.max(1), height.max(1))
            .with_context(|| format!("resizing canvas to {width}x{height}"))?;
        self.width = self.canvas.width();
        self.height = self.canvas.height();
        self.clear();
        debug!("canvas resized to {}x{}", self.width, self.height);
        Ok(())
    }

    /// Copies the canvas into an RGBA8 frame of the same size. Returns
    /// `false`, leaving the frame alone, when the sizes disagree.
    pub fn copy_to(&self, frame: &mut [u8]) -> bool {
        let src = self.canvas.data();
        if frame.len() != src.len() {
            warn!(
                "frame of {} bytes does not match {}x{} canvas",
                frame.len(),
                self.width,
                self.height
            );
            return false;
        }
        frame.copy_from_slice(src);
        true
    }

    fn resolve(&self, position: &Position) -> (f32, f32) {
        let axis = |raw: &str, extent: u32| {
            let extent = extent as f32;
            Coordinate::parse(raw).map_or(extent * 0.5, |c| c.resolve(extent))
        };
        (axis(&position.x, self.width), axis(&position.y, self.height))
    }

    fn draw_text(&mut self, text: &str, centre: (f32, f32)) {
        if !self.text_cache.has_font() {
            if !self.warned_no_font {
                warn!("no font loaded, text stimuli will not be visible");
                self.warned_no_font = true;
            }
            return;
        }
        if let Some(pm) = self.text_cache.get_or_render(text) {
            blit_centred(&mut self.canvas, &pm, centre);
        }
    }

    fn draw_shape(&mut self, shape: Shape, rgba: [u8; 4], size: u32, (cx, cy): (f32, f32)) {
        let s = size as f32;
        let half = s * 0.5;
        let mut paint = Paint::default();
        paint.anti_alias = true;
        paint.set_color(color(rgba));

        let path = match shape {
            Shape::Square => {
                if let Some(rect) = Rect::from_xywh(cx - half, cy - half, s, s) {
                    self.canvas
                        .fill_rect(rect, &paint, Transform::identity(), None);
                }
                return;
            }
            Shape::Circle => PathBuilder::from_circle(cx, cy, half),
            Shape::Triangle => {
                let mut pb = PathBuilder::new();
                pb.move_to(cx, cy - half);
                pb.line_to(cx + half, cy + half);
                pb.line_to(cx - half, cy + half);
                pb.close();
                pb.finish()
            }
        };
        match path {
            Some(path) => self.canvas.fill_path(
                &path,
                &paint,
                FillRule::Winding,
                Transform::identity(),
                None,
            ),
            None => debug!("{shape} of size {size} has no area, skipped"),
        }
    }
}

/// Premultiplied source-over of `src` centred on `pos`, clipped to `dst`.
fn blit_centred(dst: &mut Pixmap, src: &Pixmap, pos: (f32, f32)) {
    let (w, h) = (src.width() as i32, src.height() as i32);
    let (cw, ch) = (dst.width() as i32, dst.height() as i32);
    let left = (pos.0 - w as f32 * 0.5).floor();
    let top = (pos.1 - h as f32 * 0.5).floor();
    // reject in f32: positions are unchecked strings and may not fit an i32
    let visible = left + w as f32 > 0.0 && top + h as f32 > 0.0 && left < cw as f32 && top < ch as f32;
    if !visible {
        return;
    }
    let (x0, y0) = (left as i32, top as i32);

    let dst_x = x0.max(0);
    let dst_y = y0.max(0);
    let src_x = dst_x - x0;
    let src_y = dst_y - y0;
    let copy_w = (w - src_x).min(cw - dst_x) as usize;
    let copy_h = (h - src_y).min(ch - dst_y) as usize;

    let src_stride = w as usize * 4;
    let dst_stride = cw as usize * 4;
    let src_data = src.data();
    let dst_data = dst.data_mut();

    for row in 0..copy_h {
        let s_row = (src_y as usize + row) * src_stride + src_x as usize * 4;
        let d_row = (dst_y as usize + row) * dst_stride + dst_x as usize * 4;
        for i in 0..copy_w {
            let s = s_row + i * 4;
            let d = d_row + i * 4;
            let sa = src_data[s + 3] as u32;
            if sa == 0 {
                continue;
            }
            let inv = 255 - sa;
            for c in 0..4 {
                let sc = src_data[s + c] as u32;
                let dc = dst_data[d + c] as u32;
                dst_data[d + c] = (sc + (dc * inv + 127) / 255).min(255) as u8;
            }
        }
    }
}

impl PresentationSurface for SkiaSurface {
    fn clear(&mut self) {
        self.canvas.fill(color(self.style.background));
    }

    fn draw(&mut self, stimulus: &ResolvedStimulus) {
        let centre = self.resolve(&stimulus.position);
        match &stimulus.visual {
            Visual::Text(text) => self.draw_text(text, centre),
            Visual::Shape { shape, rgba, size } => self.draw_shape(*shape, *rgba, *size, centre),
            file @ Visual::File { .. } => {
                if let Some(label) = file.placeholder() {
                    self.draw_text(&label, centre);
                }
            }
        }
    }

    fn show_message(&mut self, text: &str) {
        let centre = (self.width as f32 * 0.5, self.height as f32 * 0.5);
        self.draw_text(text, centre);
    }

    fn present(&mut self) {
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{DEFAULT_FONT_PATH, load_font};

    fn surface() -> SkiaSurface {
        SkiaSurface::new(200, 100, None, SurfaceStyle::default()).unwrap()
    }

    fn pixel(s: &SkiaSurface, x: u32, y: u32) -> [u8; 4] {
        let p = s.canvas().pixel(x, y).unwrap();
        [p.red(), p.green(), p.blue(), p.alpha()]
    }

    fn shape(shape: Shape, rgba: [u8; 4], size: u32, x: &str, y: &str) -> ResolvedStimulus {
        ResolvedStimulus {
            name: "s".into(),
            visual: Visual::Shape { shape, rgba, size },
            position: Position::new(x, y),
        }
    }

    #[test]
    fn clear_paints_the_background() {
        let mut s = SkiaSurface::new(
            4,
            4,
            None,
            SurfaceStyle {
                background: [10, 20, 30, 255],
                ..SurfaceStyle::default()
            },
        )
        .unwrap();
        s.clear();
        assert_eq!(pixel(&s, 3, 3), [10, 20, 30, 255]);
    }

    #[test]
    fn shapes_are_centred_on_their_position() {
        let mut s = surface();
        s.draw(&shape(Shape::Square, [255, 0, 0, 255], 20, "25%", "50%"));
        assert_eq!(pixel(&s, 50, 50), [255, 0, 0, 255]);
        assert_eq!(pixel(&s, 100, 50), [0, 0, 0, 255]);

        s.draw(&shape(Shape::Circle, [0, 255, 0, 255], 30, "150px", "50"));
        assert_eq!(pixel(&s, 150, 50), [0, 255, 0, 255]);
        // outside the radius, inside the bounding box
        assert_eq!(pixel(&s, 136, 36), [0, 0, 0, 255]);

        s.draw(&shape(Shape::Triangle, [0, 0, 255, 255], 40, "50%", "50%"));
        assert_eq!(pixel(&s, 100, 60), [0, 0, 255, 255]);
        assert_eq!(pixel(&s, 82, 32), [0, 0, 0, 255]);
    }

    #[test]
    fn unreadable_coordinates_fall_back_to_centre() {
        let mut s = surface();
        s.draw(&shape(Shape::Square, [255, 255, 255, 255], 4, "left", "top"));
        assert_eq!(pixel(&s, 100, 50), [255, 255, 255, 255]);
        // far off-canvas draws are clipped, not panics
        s.draw(&shape(Shape::Square, [255, 255, 255, 255], 4, "-500px", "900%"));
    }

    #[test]
    fn text_without_a_font_is_skipped() {
        let mut s = surface();
        s.show_message("Take a short break!");
        s.draw(&ResolvedStimulus {
            name: "pic".into(),
            visual: Visual::File {
                media: coglab_core::MediaKind::Image,
                file_name: "face.png".into(),
            },
            position: Position::centre(),
        });
        assert!(s.canvas().pixels().iter().all(|p| p.red() == 0));
    }

    #[test]
    fn text_is_drawn_when_a_font_is_available() {
        let Ok(font) = load_font(DEFAULT_FONT_PATH) else {
            return;
        };
        let mut s = SkiaSurface::new(200, 100, Some(font), SurfaceStyle::default()).unwrap();
        s.show_message("Experiment Complete!");
        assert!(s.canvas().pixels().iter().any(|p| p.red() > 128));
    }

    #[test]
    fn present_and_copy() {
        let mut s = surface();
        assert_eq!(s.generation(), 0);
        s.draw(&shape(Shape::Square, [9, 9, 9, 255], 200, "50%", "50%"));
        s.present();
        assert_eq!(s.generation(), 1);

        let mut frame = vec![0u8; 200 * 100 * 4];
        assert!(s.copy_to(&mut frame));
        assert_eq!(&frame[..4], &[9, 9, 9, 255]);
        assert!(!s.copy_to(&mut [0u8; 8]));

        s.resize(10, 10).unwrap();
        assert_eq!((s.width(), s.height()), (10, 10));
        assert_eq!(pixel(&s, 5, 5), [0, 0, 0, 255]);
    }

    #[test]
    fn blit_blends_premultiplied_over() {
        let mut dst = Pixmap::new(4, 4).unwrap();
        dst.fill(Color::from_rgba8(0, 0, 200, 255));
        let mut src = Pixmap::new(2, 2).unwrap();
        // half-transparent white, premultiplied to 128
        src.fill(Color::from_rgba8(255, 255, 255, 128));
        blit_centred(&mut dst, &src, (2.0, 2.0));
        let p = dst.pixel(1, 1).unwrap();
        assert_eq!(p.alpha(), 255);
        assert!(p.red() >= 127 && p.red() <= 129);
        assert!(p.blue() > p.red());
        let untouched = dst.pixel(0, 0).unwrap();
        assert_eq!(untouched.red(), 0);
    }

    #[test]
    fn blit_far_outside_the_canvas_is_dropped() {
        let mut dst = Pixmap::new(4, 4).unwrap();
        let mut src = Pixmap::new(2, 2).unwrap();
        src.fill(Color::WHITE);
        for pos in [(3.0e9, 2.0), (2.0, -3.0e9), (f32::MAX, f32::MAX), (f32::NAN, 2.0)] {
            blit_centred(&mut dst, &src, pos);
        }
        assert!(dst.pixels().iter().all(|p| p.alpha() == 0));

        // the same through the surface, with text when a font is present
        let font = load_font(DEFAULT_FONT_PATH).ok();
        let mut s = SkiaSurface::new(200, 100, font, SurfaceStyle::default()).unwrap();
        s.draw(&ResolvedStimulus {
            name: "far".into(),
            visual: Visual::Text("hi".into()),
            position: Position::new("3000000000px", "50%"),
        });
        assert!(s.canvas().pixels().iter().all(|p| p.red() == 0));
    }
}
