use std::{cell::RefCell, collections::HashMap, rc::Rc};

use kurbo::{Affine, Rect};

use crate::{
    core::Progress,
    error::{CinescrollError, CinescrollResult},
    scroll::{ScrollTimeline, Subscription},
    sequence::{FrameStore, PreparedFrame},
};

/// Rendered canvas contents in RGBA8.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

/// Map scroll progress to a frame index: `floor(p * count)` clamped to
/// `[0, count - 1]`. O(1) in the frame count.
pub fn frame_index_for(progress: Progress, count: u32) -> usize {
    if count == 0 {
        return 0;
    }
    let raw = (progress.as_f64() * f64::from(count)).floor();
    (raw as u32).min(count - 1) as usize
}

/// Pure "contain" fit: the largest aspect-preserving rectangle for the image
/// that sits entirely inside the canvas, centered on both axes.
///
/// Contain (never cover) is the contract here: the product must stay fully
/// visible, letterboxed against the canvas background.
pub fn contain_rect(canvas_w: f64, canvas_h: f64, image_w: f64, image_h: f64) -> Rect {
    if canvas_w <= 0.0 || canvas_h <= 0.0 || image_w <= 0.0 || image_h <= 0.0 {
        return Rect::ZERO;
    }

    let image_ratio = image_w / image_h;
    let canvas_ratio = canvas_w / canvas_h;
    let (draw_w, draw_h) = if canvas_ratio > image_ratio {
        // Canvas is wider than the image: height-bound.
        (canvas_h * image_ratio, canvas_h)
    } else {
        // Canvas is taller (or equal): width-bound.
        (canvas_w, canvas_w / image_ratio)
    };

    let x0 = (canvas_w - draw_w) / 2.0;
    let y0 = (canvas_h - draw_h) / 2.0;
    Rect::new(x0, y0, x0 + draw_w, y0 + draw_h)
}

/// Canvas sizing state owned by the engine.
///
/// `set_viewport` only records the latest displayed size and device pixel
/// ratio; the physical backing store is reconciled inside `redraw` and
/// nowhere else.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    /// Displayed width in logical pixels.
    pub logical_width: f64,
    /// Displayed height in logical pixels.
    pub logical_height: f64,
    /// Device pixel ratio.
    pub scale_factor: f64,
}

impl ViewportState {
    pub fn new(logical_width: f64, logical_height: f64, scale_factor: f64) -> Self {
        Self {
            logical_width,
            logical_height,
            scale_factor,
        }
    }

    /// Physical backing-store size in device pixels.
    pub fn device_size(self) -> (f64, f64) {
        let w = self.logical_width * self.scale_factor;
        let h = self.logical_height * self.scale_factor;
        if w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0 {
            (w.round(), h.round())
        } else {
            (0.0, 0.0)
        }
    }
}

/// Redraw counters, mostly interesting to resize handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Completed draws (ready sequence, non-empty viewport).
    pub redraws: u64,
    /// Backing-store reallocations triggered by size or pixel-ratio changes.
    pub reallocations: u64,
}

struct Backing {
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
}

/// Scroll-synchronized canvas renderer for a frame sequence.
///
/// Every scroll-progress change maps to one synchronous redraw: pick the
/// frame, reconcile the backing store, fill the background and blit the frame
/// into its contain rect. Nothing is drawn while the sequence is loading.
pub struct PlaybackEngine {
    frames: FrameStore,
    background: [u8; 4],
    viewport: ViewportState,
    backing: Option<Backing>,
    paints: HashMap<usize, vello_cpu::Image>,
    stats: EngineStats,
}

impl PlaybackEngine {
    pub fn new(frames: FrameStore, background: [u8; 4], viewport: ViewportState) -> Self {
        Self {
            frames,
            background,
            viewport,
            backing: None,
            paints: HashMap::new(),
            stats: EngineStats::default(),
        }
    }

    pub fn frames(&self) -> &FrameStore {
        &self.frames
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Record the new displayed size / device pixel ratio. The backing store
    /// is not touched until the next redraw.
    pub fn set_viewport(&mut self, viewport: ViewportState) {
        self.viewport = viewport;
    }

    /// Deterministic draw rectangle (logical pixels) for a source image of
    /// `image_w` x `image_h` under the current viewport.
    pub fn draw_rect_for(&self, image_w: u32, image_h: u32) -> Rect {
        contain_rect(
            self.viewport.logical_width,
            self.viewport.logical_height,
            f64::from(image_w),
            f64::from(image_h),
        )
    }

    /// Render the frame for `progress` into the canvas.
    ///
    /// Returns `Ok(None)` while the sequence is still loading or the viewport
    /// has no drawable area; a frame whose slot is unavailable leaves the
    /// background-only canvas. Either way no error escapes the scroll path.
    #[tracing::instrument(skip(self))]
    pub fn redraw(&mut self, progress: Progress) -> CinescrollResult<Option<FrameRGBA>> {
        if !self.frames.is_ready() {
            return Ok(None);
        }

        let (device_w, device_h) = self.viewport.device_size();
        if device_w <= 0.0 || device_h <= 0.0 {
            return Ok(None);
        }
        if device_w > f64::from(u16::MAX) || device_h > f64::from(u16::MAX) {
            return Err(CinescrollError::playback("canvas size exceeds u16"));
        }
        let width = device_w as u16;
        let height = device_h as u16;

        self.ensure_backing(width, height);

        let index = frame_index_for(progress, self.frames.count() as u32);
        let dims = self.frames.frame(index).map(|f| (f.width, f.height));
        let paint = match dims {
            Some(_) => Some(self.paint_for(index)?),
            None => None,
        };

        let backing = self
            .backing
            .as_mut()
            .ok_or_else(|| CinescrollError::playback("backing store missing after reconcile"))?;

        let [r, g, b, a] = self.background;
        clear_pixmap(&mut backing.pixmap, premul_rgba8(r, g, b, a));

        if let (Some(paint), Some((img_w, img_h))) = (paint, dims) {
            let rect = contain_rect(
                self.viewport.logical_width,
                self.viewport.logical_height,
                f64::from(img_w),
                f64::from(img_h),
            );

            let sx = rect.width() / f64::from(img_w);
            let sy = rect.height() / f64::from(img_h);
            let transform = Affine::scale(self.viewport.scale_factor)
                * Affine::translate((rect.x0, rect.y0))
                * Affine::scale_non_uniform(sx, sy);

            let mut ctx = vello_cpu::RenderContext::new(width, height);
            ctx.set_transform(affine_to_cpu(transform));
            ctx.set_paint(paint);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(img_w),
                f64::from(img_h),
            ));
            ctx.flush();
            ctx.render_to_pixmap(&mut backing.pixmap);
        }

        self.stats.redraws += 1;
        Ok(Some(FrameRGBA {
            width: u32::from(width),
            height: u32::from(height),
            data: backing.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }))
    }

    fn ensure_backing(&mut self, width: u16, height: u16) {
        let stale = match &self.backing {
            Some(b) => b.width != width || b.height != height,
            None => true,
        };
        if stale {
            tracing::debug!(width, height, "reallocating canvas backing store");
            self.backing = Some(Backing {
                width,
                height,
                pixmap: vello_cpu::Pixmap::new(width, height),
            });
            self.stats.reallocations += 1;
        }
    }

    fn paint_for(&mut self, index: usize) -> CinescrollResult<vello_cpu::Image> {
        if let Some(paint) = self.paints.get(&index) {
            return Ok(paint.clone());
        }

        let frame = self
            .frames
            .frame(index)
            .ok_or_else(|| CinescrollError::playback("frame slot is unavailable"))?;
        let pixmap = frame_to_pixmap(frame)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };

        self.paints.insert(index, paint.clone());
        Ok(paint)
    }
}

/// Wire a shared engine to a scroll timeline: every published progress value
/// triggers a synchronous redraw, and completed frames are handed to
/// `on_frame`. Dropping the returned [`Subscription`] detaches the engine, so
/// no update can reach a torn-down canvas.
pub fn attach_engine(
    timeline: &mut ScrollTimeline,
    engine: Rc<RefCell<PlaybackEngine>>,
    mut on_frame: impl FnMut(FrameRGBA) + 'static,
) -> Subscription {
    // Initial render at the current scroll position, covering the ready
    // transition when attachment happens after loading completes.
    redraw_into(&engine, timeline.latest(), &mut on_frame);
    timeline.subscribe(move |progress| redraw_into(&engine, progress, &mut on_frame))
}

fn redraw_into(
    engine: &Rc<RefCell<PlaybackEngine>>,
    progress: Progress,
    on_frame: &mut impl FnMut(FrameRGBA),
) {
    match engine.borrow_mut().redraw(progress) {
        Ok(Some(frame)) => on_frame(frame),
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "redraw failed"),
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn premul_rgba8(r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
    fn premul(c: u8, a: u8) -> u8 {
        ((u16::from(c) * u16::from(a) + 127) / 255) as u8
    }
    [premul(r, a), premul(g, a), premul(b, a), a]
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    for px in pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn frame_to_pixmap(frame: &PreparedFrame) -> CinescrollResult<vello_cpu::Pixmap> {
    let w: u16 = frame
        .width
        .try_into()
        .map_err(|_| CinescrollError::playback("frame width exceeds u16"))?;
    let h: u16 = frame
        .height
        .try_into()
        .map_err(|_| CinescrollError::playback("frame height exceeds u16"))?;
    if frame.rgba8_premul.len() != frame.width as usize * frame.height as usize * 4 {
        return Err(CinescrollError::playback("frame byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(frame.width as usize * frame.height as usize);
    for px in frame.rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::SequenceSpec;

    fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> PreparedFrame {
        let px = [rgba[0], rgba[1], rgba[2], rgba[3]];
        let data: Vec<u8> = std::iter::repeat_n(px, (width * height) as usize)
            .flatten()
            .collect();
        PreparedFrame {
            width,
            height,
            rgba8_premul: Arc::new(data),
        }
    }

    fn pixel(frame: &FrameRGBA, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * frame.width + x) * 4) as usize;
        [
            frame.data[i],
            frame.data[i + 1],
            frame.data[i + 2],
            frame.data[i + 3],
        ]
    }

    #[test]
    fn frame_index_mapping_matches_contract() {
        assert_eq!(frame_index_for(Progress::new(0.0), 240), 0);
        assert_eq!(frame_index_for(Progress::new(0.5), 240), 120);
        assert_eq!(frame_index_for(Progress::new(1.0), 240), 239);
        assert_eq!(frame_index_for(Progress::new(0.999), 240), 239);
    }

    #[test]
    fn contain_fit_letterboxes_a_wide_image() {
        // Spec scenario: 800x600 canvas, 1600x900 image.
        let rect = contain_rect(800.0, 600.0, 1600.0, 900.0);
        assert_eq!(rect.width(), 800.0);
        assert_eq!(rect.height(), 450.0);
        assert_eq!(rect.x0, 0.0);
        assert_eq!(rect.y0, 75.0);
    }

    #[test]
    fn contain_fit_pillarboxes_a_tall_image() {
        let rect = contain_rect(800.0, 600.0, 300.0, 600.0);
        assert_eq!(rect.height(), 600.0);
        assert_eq!(rect.width(), 300.0);
        assert_eq!(rect.x0, 250.0);
        assert_eq!(rect.y0, 0.0);
    }

    #[test]
    fn contain_fit_is_deterministic() {
        let a = contain_rect(1280.0, 720.0, 1920.0, 1080.0);
        let b = contain_rect(1280.0, 720.0, 1920.0, 1080.0);
        assert_eq!(a, b);
    }

    #[test]
    fn contain_fit_of_degenerate_inputs_is_empty() {
        assert_eq!(contain_rect(0.0, 600.0, 100.0, 100.0), Rect::ZERO);
        assert_eq!(contain_rect(800.0, 600.0, 0.0, 100.0), Rect::ZERO);
    }

    #[test]
    fn redraw_is_a_noop_while_loading() {
        let dir = std::env::temp_dir().join(format!("cinescroll-engine-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let spec = SequenceSpec {
            root: dir.to_string_lossy().into_owned(),
            prefix: "never".to_string(),
            padding: 3,
            ext: "png".to_string(),
            count: 1,
        };

        let store = FrameStore::begin_load(&spec).unwrap();
        let mut engine =
            PlaybackEngine::new(store, [5, 5, 5, 255], ViewportState::new(4.0, 4.0, 1.0));
        assert!(engine.redraw(Progress::START).unwrap().is_none());
        assert_eq!(engine.stats().redraws, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn redraw_is_a_noop_for_an_empty_viewport() {
        let store = FrameStore::preloaded(vec![solid_frame(2, 2, [255, 0, 0, 255])]);
        let mut engine =
            PlaybackEngine::new(store, [5, 5, 5, 255], ViewportState::new(0.0, 4.0, 1.0));
        assert!(engine.redraw(Progress::START).unwrap().is_none());
    }

    #[test]
    fn redraw_letterboxes_against_the_background() {
        // 2x2 red frame on a 4x2 canvas: pillarboxed with one background
        // column on each side.
        let store = FrameStore::preloaded(vec![solid_frame(2, 2, [255, 0, 0, 255])]);
        let mut engine =
            PlaybackEngine::new(store, [5, 5, 5, 255], ViewportState::new(4.0, 2.0, 1.0));

        let frame = engine.redraw(Progress::START).unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(pixel(&frame, 0, 0), [5, 5, 5, 255]);
        assert_eq!(pixel(&frame, 1, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 2, 1), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 3, 1), [5, 5, 5, 255]);
    }

    #[test]
    fn redraw_picks_the_frame_for_the_progress() {
        let store = FrameStore::preloaded(vec![
            solid_frame(2, 2, [255, 0, 0, 255]),
            solid_frame(2, 2, [0, 255, 0, 255]),
        ]);
        let mut engine =
            PlaybackEngine::new(store, [5, 5, 5, 255], ViewportState::new(2.0, 2.0, 1.0));

        let first = engine.redraw(Progress::new(0.0)).unwrap().unwrap();
        assert_eq!(pixel(&first, 1, 1), [255, 0, 0, 255]);

        let last = engine.redraw(Progress::new(1.0)).unwrap().unwrap();
        assert_eq!(pixel(&last, 1, 1), [0, 255, 0, 255]);
    }

    #[test]
    fn backing_store_reallocates_only_on_size_changes() {
        let store = FrameStore::preloaded(vec![solid_frame(2, 2, [255, 0, 0, 255])]);
        let mut engine =
            PlaybackEngine::new(store, [5, 5, 5, 255], ViewportState::new(4.0, 2.0, 1.0));

        engine.redraw(Progress::START).unwrap();
        engine.redraw(Progress::new(0.5)).unwrap();
        assert_eq!(engine.stats().reallocations, 1);

        engine.set_viewport(ViewportState::new(8.0, 4.0, 1.0));
        engine.redraw(Progress::new(0.5)).unwrap();
        assert_eq!(engine.stats().reallocations, 2);

        // Unchanged viewport: no further reallocation.
        engine.set_viewport(ViewportState::new(8.0, 4.0, 1.0));
        engine.redraw(Progress::new(0.75)).unwrap();
        assert_eq!(engine.stats().reallocations, 2);
        assert_eq!(engine.stats().redraws, 4);
    }

    #[test]
    fn device_pixel_ratio_scales_the_backing_store() {
        let store = FrameStore::preloaded(vec![solid_frame(2, 2, [255, 0, 0, 255])]);
        let mut engine =
            PlaybackEngine::new(store, [5, 5, 5, 255], ViewportState::new(2.0, 2.0, 2.0));

        let frame = engine.redraw(Progress::START).unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (4, 4));
        assert_eq!(pixel(&frame, 2, 2), [255, 0, 0, 255]);
    }
}
