/// Render passes, framebuffers, viewports

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;

/// 2D size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-sized extent (minimized window)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Whole-extent viewport with depth range [0, 1]
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, width: extent.width, height: extent.height }
    }
}

/// Compiled render pass
pub trait RenderPass: Send + Sync {
    /// Number of subpasses declared by the pass
    fn subpass_count(&self) -> u32;

    /// Color attachments written by `subpass`
    fn color_attachment_count(&self, subpass: u32) -> u32;

    fn as_any(&self) -> &dyn Any;
}

/// Render target set bound to a render pass
pub trait Framebuffer: Send + Sync {
    fn extent(&self) -> Extent2D;

    fn render_pass(&self) -> &Arc<dyn RenderPass>;

    /// Record a new size; takes effect on the next `invalidate`
    fn set_extent(&mut self, extent: Extent2D);

    /// Recreate the attachments at the current extent
    fn invalidate(&mut self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
