//! Display surfaces that receive finished frames.

use crate::renderer::{RenderResult, RendererError};
use inkslate_core::RefreshMode;
use kurbo::Rect;

/// Screen coordinates beyond this magnitude are pinned to it before conversion to pixels.
const COORD_LIMIT: f64 = (1 << 28) as f64;

fn to_pixel(v: f64) -> i32 {
    v.clamp(-COORD_LIMIT, COORD_LIMIT) as i32
}

fn dimension(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Integer screen rectangle in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Cover a screen-space rectangle, expanded outward to whole pixels plus `pad`.
    pub fn covering(rect: Rect, pad: i32) -> Self {
        let x0 = to_pixel(rect.x0.min(rect.x1).floor()).saturating_sub(pad);
        let y0 = to_pixel(rect.y0.min(rect.y1).floor()).saturating_sub(pad);
        let x1 = to_pixel(rect.x0.max(rect.x1).ceil()).saturating_add(pad);
        let y1 = to_pixel(rect.y0.max(rect.y1).ceil()).saturating_add(pad);
        Self::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, dimension(width), dimension(height))
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn union(self, other: PixelRect) -> PixelRect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        PixelRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    /// Intersect with a `width` by `height` frame. `None` when nothing is on screen.
    pub fn clamp(self, width: u32, height: u32) -> Option<PixelRect> {
        let max_w = dimension(width);
        let max_h = dimension(height);
        let x0 = self.x.clamp(0, max_w);
        let y0 = self.y.clamp(0, max_h);
        let x1 = self.right().clamp(0, max_w);
        let y1 = self.bottom().clamp(0, max_h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.right()),
            f64::from(self.bottom()),
        )
    }
}

/// A lockable RGBA8 frame buffer on the display side.
///
/// `lock` hands out the whole buffer, `width * height * 4` bytes in row-major order.
/// Pixels outside the posted region must be left as they were.
pub trait DisplaySurface: Send {
    fn size(&self) -> (u32, u32);

    /// Fails when the display is not currently available, for example while it is detached.
    fn lock(&mut self) -> RenderResult<&mut [u8]>;

    /// Release the buffer and post it with the given refresh mode. `region` of `None` means
    /// the whole buffer changed.
    fn unlock_and_post(&mut self, refresh: RefreshMode, region: Option<PixelRect>) -> RenderResult<()>;
}

/// A frame handed to the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Post {
    pub refresh: RefreshMode,
    pub region: Option<PixelRect>,
}

/// In-memory surface for headless rendering and tests.
#[derive(Debug)]
pub struct MemorySurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    available: bool,
    locked: bool,
    posts: Vec<Post>,
}

impl MemorySurface {
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RendererError::InvalidSize { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            available: true,
            locked: false,
            posts: Vec::new(),
        })
    }

    /// Simulate the display being detached or reattached.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Posted pixels.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn take_posts(&mut self) -> Vec<Post> {
        std::mem::take(&mut self.posts)
    }
}

impl DisplaySurface for MemorySurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn lock(&mut self) -> RenderResult<&mut [u8]> {
        if !self.available {
            return Err(RendererError::Surface("display not attached".into()));
        }
        if self.locked {
            return Err(RendererError::Surface("surface already locked".into()));
        }
        self.locked = true;
        Ok(&mut self.pixels)
    }

    fn unlock_and_post(&mut self, refresh: RefreshMode, region: Option<PixelRect>) -> RenderResult<()> {
        if !self.locked {
            return Err(RendererError::Surface("post without lock".into()));
        }
        self.locked = false;
        self.posts.push(Post { refresh, region });
        Ok(())
    }
}
