use std::{
    path::Path,
    sync::{
        Arc, Condvar, Mutex, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Context as _;

use crate::{error::CinescrollResult, model::SequenceSpec};

/// Decoded frame in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

pub fn decode_frame(bytes: &[u8]) -> CinescrollResult<PreparedFrame> {
    let dyn_img = image::load_from_memory(bytes).context("decode frame from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedFrame {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

struct StoreShared {
    slots: Vec<OnceLock<PreparedFrame>>,
    loaded: AtomicUsize,
    ready: Mutex<bool>,
    ready_cv: Condvar,
}

/// Random-access cache of a frame sequence, filled concurrently.
///
/// `begin_load` fires one decode task per frame and returns immediately; each
/// completed decode publishes into its slot and bumps a shared counter. The
/// counter is monotonically non-decreasing and never reset, so `progress`
/// only ever moves forward. A frame that fails to decode leaves its slot empty
/// forever and the store never becomes ready; playback stays in its loading
/// state. Handles are cheap clones sharing one cache.
#[derive(Clone)]
pub struct FrameStore {
    shared: Arc<StoreShared>,
    count: usize,
}

impl FrameStore {
    /// Start loading every frame of `spec` concurrently.
    ///
    /// Decoding proceeds on the rayon global pool with no in-flight limit, no
    /// retries and no cancellation.
    pub fn begin_load(spec: &SequenceSpec) -> CinescrollResult<Self> {
        spec.validate()?;
        let count = spec.count as usize;
        let shared = Arc::new(StoreShared {
            slots: (0..count).map(|_| OnceLock::new()).collect(),
            loaded: AtomicUsize::new(0),
            ready: Mutex::new(false),
            ready_cv: Condvar::new(),
        });

        for index in 1..=spec.count {
            let path = spec.frame_path(index);
            let shared = Arc::clone(&shared);
            rayon::spawn(move || {
                load_one(&shared, index as usize - 1, &path, count);
            });
        }

        Ok(Self { shared, count })
    }

    /// Build an already-ready store from decoded frames. Used by callers that
    /// source frames from somewhere other than the filesystem.
    pub fn preloaded(frames: Vec<PreparedFrame>) -> Self {
        let count = frames.len();
        let slots = frames
            .into_iter()
            .map(|f| {
                let slot = OnceLock::new();
                let _ = slot.set(f);
                slot
            })
            .collect();
        Self {
            shared: Arc::new(StoreShared {
                slots,
                loaded: AtomicUsize::new(count),
                ready: Mutex::new(true),
                ready_cv: Condvar::new(),
            }),
            count,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of frames decoded so far.
    pub fn loaded(&self) -> usize {
        self.shared.loaded.load(Ordering::Acquire)
    }

    /// Load progress ratio in `[0, 1]`, monotonically non-decreasing.
    pub fn progress(&self) -> f64 {
        if self.count == 0 {
            return 1.0;
        }
        self.loaded() as f64 / self.count as f64
    }

    /// True iff every frame of the sequence has decoded.
    pub fn is_ready(&self) -> bool {
        self.loaded() == self.count
    }

    /// Random access by zero-based index. `None` while the frame has not
    /// decoded yet or the index is out of range.
    pub fn frame(&self, index: usize) -> Option<&PreparedFrame> {
        self.shared.slots.get(index)?.get()
    }

    /// Block until the store is ready or `timeout` elapses. Returns the ready
    /// state on exit.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let Ok(guard) = self.shared.ready.lock() else {
            return self.is_ready();
        };
        match self
            .shared
            .ready_cv
            .wait_timeout_while(guard, timeout, |ready| !*ready)
        {
            Ok((guard, _)) => *guard,
            Err(_) => self.is_ready(),
        }
    }
}

impl std::fmt::Debug for FrameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStore")
            .field("count", &self.count)
            .field("loaded", &self.loaded())
            .finish()
    }
}

fn load_one(shared: &StoreShared, slot: usize, path: &Path, count: usize) {
    let frame = match read_and_decode(path) {
        Ok(frame) => frame,
        Err(err) => {
            // Tolerated degradation: the slot stays empty and the sequence
            // never reports ready.
            tracing::warn!(path = %path.display(), error = %err, "frame decode failed");
            return;
        }
    };

    if shared.slots[slot].set(frame).is_err() {
        return;
    }

    let done = shared.loaded.fetch_add(1, Ordering::AcqRel) + 1;
    if done == count
        && let Ok(mut ready) = shared.ready.lock()
    {
        *ready = true;
        shared.ready_cv.notify_all();
    }
}

fn read_and_decode(path: &Path) -> CinescrollResult<PreparedFrame> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read frame '{}'", path.display()))?;
    decode_frame(&bytes)
}
