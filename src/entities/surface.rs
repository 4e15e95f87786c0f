//! Scratch surfaces for decode -> extract -> buffer
//!
//! A decoded image is blitted unscaled at the origin of a fixed-size scratch
//! surface (clipped to the surface), the surface contents are extracted as
//! `FrameData`, then the surface is cleared.
//!
//! Each in-flight decode checks out its own surface from a `SurfacePool`, so
//! concurrent extractions never share pixels. Surfaces are allocated lazily
//! and reused; the pool never holds more than `capacity` idle surfaces.

use std::sync::Mutex;

use image::RgbaImage;
use log::trace;

use super::frame::FrameData;

/// Fixed-size RGBA8 drawing surface
#[derive(Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    /// Transparent black surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Copy `img` onto the surface with its top-left at (0, 0). No scaling:
    /// parts of the image beyond the surface are dropped.
    pub fn draw_image(&mut self, img: &RgbaImage) {
        let copy_w = img.width().min(self.width) as usize;
        let copy_h = img.height().min(self.height) as usize;
        if copy_w == 0 || copy_h == 0 {
            return;
        }

        let src = img.as_raw();
        let src_stride = img.width() as usize * 4;
        let dst_stride = self.width as usize * 4;
        let row_bytes = copy_w * 4;

        for y in 0..copy_h {
            let s = y * src_stride;
            let d = y * dst_stride;
            self.pixels[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
        }
    }

    /// Extract the whole surface as a frame buffer
    pub fn extract(&self) -> FrameData {
        FrameData::from_rgba8(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| unreachable!("surface buffer always matches its dimensions"))
    }

    /// Reset to transparent black
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn is_clear(&self) -> bool {
        self.pixels.iter().all(|&b| b == 0)
    }

    /// Full pipeline: draw, extract, clear.
    pub fn capture(&mut self, img: &RgbaImage) -> FrameData {
        self.draw_image(img);
        let data = self.extract();
        self.clear();
        data
    }
}

/// Pool of reusable scratch surfaces, one per concurrent decode
#[derive(Debug)]
pub struct SurfacePool {
    width: u32,
    height: u32,
    capacity: usize,
    idle: Mutex<Vec<Surface>>,
}

impl SurfacePool {
    /// # Arguments
    /// * `width`, `height` - surface size (the flipbook's frame size)
    /// * `capacity` - max idle surfaces kept (max decode concurrency)
    pub fn new(width: u32, height: u32, capacity: usize) -> Self {
        Self {
            width,
            height,
            capacity: capacity.max(1),
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Take a surface out of the pool (or allocate one). Returned on guard drop.
    pub fn checkout(&self) -> SurfaceGuard<'_> {
        let surface = self
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_else(|| {
                trace!("SurfacePool: allocating {}x{} surface", self.width, self.height);
                Surface::new(self.width, self.height)
            });

        SurfaceGuard {
            pool: self,
            surface: Some(surface),
        }
    }

    /// Number of idle surfaces
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn give_back(&self, mut surface: Surface) {
        if !surface.is_clear() {
            surface.clear();
        }
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < self.capacity {
            idle.push(surface);
        }
    }
}

/// Exclusive use of one pooled surface
pub struct SurfaceGuard<'a> {
    pool: &'a SurfacePool,
    surface: Option<Surface>,
}

impl std::ops::Deref for SurfaceGuard<'_> {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        self.surface.as_ref().unwrap_or_else(|| unreachable!("surface taken before drop"))
    }
}

impl std::ops::DerefMut for SurfaceGuard<'_> {
    fn deref_mut(&mut self) -> &mut Surface {
        self.surface.as_mut().unwrap_or_else(|| unreachable!("surface taken before drop"))
    }
}

impl Drop for SurfaceGuard<'_> {
    fn drop(&mut self) {
        if let Some(surface) = self.surface.take() {
            self.pool.give_back(surface);
        }
    }
}
