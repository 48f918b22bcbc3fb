/// Swapchain - acquire / record / submit / present loop
///
/// The backend supplies presentation through `PresentSurface`; this type owns
/// the per-frame executable command buffers and the rebuild policy.

use std::sync::Arc;
use crate::command::{CommandBuffer, CommandBufferState};
use crate::device::{CommandBufferKind, CommandEncoder, Device, Extent2D, Framebuffer, RenderPass};
use crate::error::{Error, Result};
use crate::{rhi_bail_warn, rhi_debug, rhi_info};

/// Outcome of acquiring the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// Image acquired; `suboptimal` asks for a rebuild after this frame
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface changed; nothing can be presented until rebuilt
    OutOfDate,
}

/// Outcome of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Backend side of a swapchain
///
/// `slot` is the frame-in-flight index, `image_index` the presentable image.
pub trait PresentSurface: Send {
    fn frames_in_flight(&self) -> u32;

    fn extent(&self) -> Extent2D;

    fn image_count(&self) -> u32;

    /// Render pass shared by every image framebuffer
    fn render_pass(&self) -> &Arc<dyn RenderPass>;

    fn framebuffer(&self, image_index: u32) -> Option<&dyn Framebuffer>;

    /// Block until the GPU finished the previous use of `slot`
    fn wait_for_slot(&mut self, slot: u32) -> Result<()>;

    fn acquire(&mut self, slot: u32) -> Result<AcquireResult>;

    /// Submit the recorded frame, waiting on the acquire and signaling the present semaphore
    fn submit(&mut self, slot: u32, image_index: u32, encoder: &mut dyn CommandEncoder) -> Result<()>;

    fn present(&mut self, slot: u32, image_index: u32) -> Result<PresentResult>;

    /// Recreate images and framebuffers at the current surface size (waits for the device)
    fn rebuild(&mut self) -> Result<()>;

    fn as_any(&self) -> &dyn std::any::Any;
}

/// A frame being recorded, returned by `Swapchain::begin_frame`
pub struct Frame<'a> {
    /// Frame-in-flight slot, the `frame_index` passed to pipelines
    pub frame_index: u32,
    pub image_index: u32,
    pub extent: Extent2D,
    pub framebuffer: &'a dyn Framebuffer,
    /// Executable buffer of this slot, already in `Writing` state
    pub command_buffer: &'a mut CommandBuffer,
}

pub struct Swapchain {
    device: Arc<dyn Device>,
    surface: Box<dyn PresentSurface>,
    command_buffers: Vec<CommandBuffer>,
    frame_index: u32,
    image_index: Option<u32>,
    needs_rebuild: bool,
    generation: u64,
}

impl Swapchain {
    /// Wrap `surface` and create one executable command buffer per frame in flight
    pub fn new(device: Arc<dyn Device>, surface: Box<dyn PresentSurface>) -> Result<Self> {
        let frames = surface.frames_in_flight();
        if frames == 0 {
            return Err(Error::InitializationFailed("Swapchain needs at least one frame in flight".to_string()));
        }

        let command_buffers = (0..frames)
            .map(|_| device.create_command_encoder(CommandBufferKind::Executable).map(CommandBuffer::new))
            .collect::<Result<Vec<_>>>()?;

        rhi_info!("lumen::Swapchain",
            "Swapchain ready: {} images, {} frames in flight, {}x{}",
            surface.image_count(), frames, surface.extent().width, surface.extent().height);

        Ok(Self {
            device,
            surface,
            command_buffers,
            frame_index: 0,
            image_index: None,
            needs_rebuild: false,
            generation: 0,
        })
    }

    pub fn extent(&self) -> Extent2D {
        self.surface.extent()
    }

    pub fn frames_in_flight(&self) -> u32 {
        self.command_buffers.len() as u32
    }

    /// Slot the next (or current) frame records into
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Incremented by every rebuild
    ///
    /// Pipelines and framebuffers built against an older generation's
    /// render pass must be rebuilt (`MeshPipeline::invalidate`).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn render_pass(&self) -> &Arc<dyn RenderPass> {
        self.surface.render_pass()
    }

    /// Framebuffer of the image acquired by the current frame
    pub fn default_framebuffer(&self) -> Option<&dyn Framebuffer> {
        self.image_index.and_then(|i| self.surface.framebuffer(i))
    }

    pub fn surface(&self) -> &dyn PresentSurface {
        self.surface.as_ref()
    }

    /// New thread-local command buffer for parallel recording
    pub fn create_command_buffer(&self) -> Result<CommandBuffer> {
        self.device
            .create_command_encoder(CommandBufferKind::ThreadLocal)
            .map(CommandBuffer::new)
    }

    /// Force a rebuild before the next frame (e.g. after a window resize)
    pub fn invalidate(&mut self) {
        self.needs_rebuild = true;
    }

    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    fn rebuild(&mut self) -> Result<()> {
        self.surface.rebuild()?;
        for cmd in &mut self.command_buffers {
            cmd.reset()?;
        }
        self.needs_rebuild = false;
        self.generation += 1;
        let extent = self.surface.extent();
        rhi_info!("lumen::Swapchain",
            "Swapchain rebuilt at {}x{} (generation {})", extent.width, extent.height, self.generation);
        Ok(())
    }

    /// Acquire the next image and start recording
    ///
    /// Returns `Ok(None)` when no frame can be recorded right now: the
    /// surface was out of date (it has been rebuilt, try again next loop)
    /// or has a zero extent.
    pub fn begin_frame(&mut self) -> Result<Option<Frame<'_>>> {
        if self.image_index.is_some() {
            rhi_bail_warn!("lumen::Swapchain", "begin_frame called while a frame is being recorded");
        }
        if self.needs_rebuild {
            self.rebuild()?;
        }
        if self.surface.extent().is_empty() {
            // Retry the rebuild every loop until the surface has a size again
            self.needs_rebuild = true;
            return Ok(None);
        }

        let slot = self.frame_index;
        self.surface.wait_for_slot(slot)?;

        {
            let cmd = &mut self.command_buffers[slot as usize];
            cmd.recycle()?;
            if cmd.state() != CommandBufferState::Idle {
                cmd.reset()?;
            }
        }

        let image_index = match self.surface.acquire(slot)? {
            AcquireResult::OutOfDate => {
                rhi_debug!("lumen::Swapchain", "Surface out of date at acquire");
                self.rebuild()?;
                return Ok(None);
            }
            AcquireResult::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    self.needs_rebuild = true;
                }
                image_index
            }
        };

        let extent = self.surface.extent();
        let framebuffer = self.surface.framebuffer(image_index).ok_or_else(|| {
            Error::BackendError(format!("Acquired image {} has no framebuffer", image_index))
        })?;
        let command_buffer = &mut self.command_buffers[slot as usize];
        command_buffer.begin_subpass(framebuffer, 0)?;
        self.image_index = Some(image_index);

        Ok(Some(Frame {
            frame_index: slot,
            image_index,
            extent,
            framebuffer,
            command_buffer,
        }))
    }

    /// Finish recording, submit and present the current frame
    pub fn end_frame(&mut self) -> Result<()> {
        let Some(image_index) = self.image_index.take() else {
            rhi_bail_warn!("lumen::Swapchain", "end_frame called without begin_frame");
        };
        let slot = self.frame_index;
        self.frame_index = (self.frame_index + 1) % self.frames_in_flight();

        let cmd = &mut self.command_buffers[slot as usize];
        match cmd.state() {
            CommandBufferState::Writing => cmd.end_writing()?,
            CommandBufferState::Written => {}
            CommandBufferState::Idle => {
                // Aborted with reset(): the acquired image is still submitted
                // (as an empty pass) and presented so the slot stays usable
                rhi_debug!("lumen::Swapchain", "Frame {} aborted, presenting an empty pass", slot);
                let framebuffer = self.surface.framebuffer(image_index).ok_or_else(|| {
                    Error::BackendError(format!("Acquired image {} has no framebuffer", image_index))
                })?;
                cmd.begin_subpass(framebuffer, 0)?;
                cmd.end_writing()?;
            }
            CommandBufferState::Submitted => {
                rhi_bail_warn!("lumen::Swapchain", "Frame {} command buffer was already submitted", slot);
            }
        }
        if let Err(e) = self.surface.submit(slot, image_index, cmd.encoder_mut()) {
            cmd.reset()?;
            return Err(e);
        }
        cmd.mark_submitted()?;

        match self.surface.present(slot, image_index)? {
            PresentResult::Presented => {}
            PresentResult::Suboptimal | PresentResult::OutOfDate => {
                rhi_debug!("lumen::Swapchain", "Surface needs rebuild after present");
                self.needs_rebuild = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
