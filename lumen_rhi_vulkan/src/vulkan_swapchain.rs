/// VulkanSurface - Vulkan implementation of the RHI PresentSurface trait
///
/// Owns the VkSwapchainKHR, its image views and framebuffers, and the
/// per-frame synchronization objects. The VkSurfaceKHR itself belongs to
/// the `VulkanContext`.

use ash::vk;
use lumen_rhi::lumen::Result;
use lumen_rhi::lumen::device::{CommandEncoder, Extent2D, Framebuffer, RenderPass};
use lumen_rhi::lumen::swapchain::{AcquireResult, PresentResult, PresentSurface};
use lumen_rhi::{rhi_bail, rhi_debug, rhi_info, rhi_warn};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_command_list::VulkanCommandEncoder;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::vk_error;
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_render_pass::VulkanRenderPass;

/// Size used when the surface lets the swapchain pick its extent
const FALLBACK_EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

pub struct VulkanSurface {
    ctx: Arc<GpuContext>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    surface_format: vk::SurfaceFormatKHR,
    vsync: bool,

    swapchain: vk::SwapchainKHR,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<VulkanFramebuffer>,
    render_pass: Arc<dyn RenderPass>,
    extent: Extent2D,

    /// One per frame in flight (acquire -> submit)
    image_available: Vec<vk::Semaphore>,
    /// One per frame in flight, signaled when the slot's submission completes
    in_flight: Vec<vk::Fence>,
    /// One per swapchain image (submit -> present)
    render_finished: Vec<vk::Semaphore>,
}

impl VulkanSurface {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        surface_format: vk::SurfaceFormatKHR,
        frames_in_flight: u32,
        vsync: bool,
    ) -> Result<Self> {
        if frames_in_flight == 0 {
            rhi_bail!("lumen::vulkan", "A swapchain needs at least one frame in flight");
        }

        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
        let render_pass: Arc<dyn RenderPass> = Arc::new(VulkanRenderPass::new_color(
            Arc::clone(&ctx),
            surface_format.format,
            1,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )?);

        // From here on, Drop releases whatever was created if a step fails
        let mut this = Self {
            ctx,
            surface,
            surface_loader,
            swapchain_loader,
            surface_format,
            vsync,
            swapchain: vk::SwapchainKHR::null(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
            render_pass,
            extent: Extent2D::default(),
            image_available: Vec::with_capacity(frames_in_flight as usize),
            in_flight: Vec::with_capacity(frames_in_flight as usize),
            render_finished: Vec::new(),
        };

        for _ in 0..frames_in_flight {
            let semaphore = this.ctx.create_semaphore()?;
            this.image_available.push(semaphore);
            let fence = this.ctx.create_fence(true)?;
            this.in_flight.push(fence);
        }

        this.rebuild()?;
        Ok(this)
    }

    fn slot_index(&self, slot: u32) -> Result<usize> {
        let index = slot as usize;
        if index >= self.in_flight.len() {
            rhi_bail!("lumen::vulkan", "Frame slot {} out of range ({} frames in flight)", slot, self.in_flight.len());
        }
        Ok(index)
    }

    /// Framebuffers, views and present semaphores of the current swapchain
    fn destroy_image_resources(&mut self) {
        self.framebuffers.clear();
        unsafe {
            for &view in &self.image_views {
                self.ctx.device.destroy_image_view(view, None);
            }
            for &semaphore in &self.render_finished {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
        }
        self.image_views.clear();
        self.render_finished.clear();
    }

    fn create_swapchain(&mut self, capabilities: &vk::SurfaceCapabilitiesKHR, extent: vk::Extent2D) -> Result<()> {
        let present_modes = unsafe {
            self.surface_loader.get_physical_device_surface_present_modes(self.ctx.physical_device, self.surface)
        }
        .map_err(|e| vk_error("query surface present modes", e))?;
        let present_mode = choose_present_mode(&present_modes, self.vsync);

        let family_indices = [self.ctx.families.graphics, self.ctx.families.present];
        let old_swapchain = self.swapchain;
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(choose_image_count(capabilities))
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);
        create_info = if family_indices[0] != family_indices[1] {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| vk_error("create swapchain", e))?;

        self.destroy_image_resources();
        unsafe {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }
        self.swapchain = swapchain;
        self.extent = Extent2D::new(extent.width, extent.height);

        let images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|e| vk_error("get swapchain images", e))?;

        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.surface_format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { self.ctx.device.create_image_view(&view_info, None) }
                .map_err(|e| vk_error("create swapchain image view", e))?;
            self.image_views.push(view);

            let framebuffer = VulkanFramebuffer::with_view(
                Arc::clone(&self.ctx),
                Arc::clone(&self.render_pass),
                view,
                self.extent,
            )?;
            self.framebuffers.push(framebuffer);

            let semaphore = self.ctx.create_semaphore()?;
            self.render_finished.push(semaphore);
        }

        rhi_info!("lumen::vulkan",
            "Swapchain created: {} images, {}x{}, {:?}", images.len(), extent.width, extent.height, present_mode);
        Ok(())
    }
}

impl PresentSurface for VulkanSurface {
    fn frames_in_flight(&self) -> u32 {
        self.in_flight.len() as u32
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn image_count(&self) -> u32 {
        self.framebuffers.len() as u32
    }

    fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    fn framebuffer(&self, image_index: u32) -> Option<&dyn Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .map(|framebuffer| framebuffer as &dyn Framebuffer)
    }

    fn wait_for_slot(&mut self, slot: u32) -> Result<()> {
        let fence = self.in_flight[self.slot_index(slot)?];
        unsafe { self.ctx.device.wait_for_fences(&[fence], true, u64::MAX) }
            .map_err(|e| vk_error("wait for frame fence", e))
    }

    fn acquire(&mut self, slot: u32) -> Result<AcquireResult> {
        let semaphore = self.image_available[self.slot_index(slot)?];
        if self.swapchain == vk::SwapchainKHR::null() || self.extent.is_empty() {
            return Ok(AcquireResult::OutOfDate);
        }

        let acquired = unsafe {
            self.swapchain_loader.acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        match acquired {
            Ok((image_index, suboptimal)) => Ok(AcquireResult::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
            Err(e) => Err(vk_error("acquire next swapchain image", e)),
        }
    }

    fn submit(&mut self, slot: u32, image_index: u32, encoder: &mut dyn CommandEncoder) -> Result<()> {
        let slot_index = self.slot_index(slot)?;
        let Some(&signal) = self.render_finished.get(image_index as usize) else {
            rhi_bail!("lumen::vulkan", "Image index {} out of range ({} images)", image_index, self.render_finished.len());
        };
        let Some(encoder) = encoder.as_any_mut().downcast_mut::<VulkanCommandEncoder>() else {
            rhi_bail!("lumen::vulkan", "Submitted encoder was not created by the Vulkan device");
        };
        let command_buffer = encoder.record_primary()?;

        let wait_semaphores = [self.image_available[slot_index]];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [signal];
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let fence = self.in_flight[slot_index];
        unsafe {
            self.ctx.device.reset_fences(&[fence])
                .map_err(|e| vk_error("reset frame fence", e))?;

            let submitted = match self.ctx.submit_lock.lock() {
                Ok(_guard) => self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], fence),
                Err(_) => Err(vk::Result::ERROR_UNKNOWN),
            };

            if let Err(e) = submitted {
                // The fence will never be signaled by this submission; replace it
                // with a signaled one so the next wait on this slot returns
                self.ctx.device.destroy_fence(fence, None);
                self.in_flight[slot_index] = self.ctx.create_fence(true)?;
                return Err(vk_error("submit frame", e));
            }
        }
        Ok(())
    }

    fn present(&mut self, slot: u32, image_index: u32) -> Result<PresentResult> {
        self.slot_index(slot)?;
        let Some(&wait) = self.render_finished.get(image_index as usize) else {
            rhi_bail!("lumen::vulkan", "Image index {} out of range ({} images)", image_index, self.render_finished.len());
        };

        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = match self.ctx.submit_lock.lock() {
            Ok(_guard) => unsafe { self.swapchain_loader.queue_present(self.ctx.present_queue, &present_info) },
            Err(_) => Err(vk::Result::ERROR_UNKNOWN),
        };
        match presented {
            Ok(false) => Ok(PresentResult::Presented),
            Ok(true) => Ok(PresentResult::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentResult::OutOfDate),
            Err(e) => Err(vk_error("present swapchain image", e)),
        }
    }

    fn rebuild(&mut self) -> Result<()> {
        self.ctx.wait_idle()?;

        let capabilities = unsafe {
            self.surface_loader.get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
        }
        .map_err(|e| vk_error("query surface capabilities", e))?;

        let extent = choose_extent(&capabilities);
        if extent.width == 0 || extent.height == 0 {
            // Minimized: keep the old swapchain around as `old_swapchain` for later
            rhi_debug!("lumen::vulkan", "Surface has a zero extent; swapchain rebuild deferred");
            self.extent = Extent2D::default();
            return Ok(());
        }

        self.create_swapchain(&capabilities, extent)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSurface {
    fn drop(&mut self) {
        if self.ctx.wait_idle().is_err() {
            rhi_warn!("lumen::vulkan", "Device wait failed while destroying the swapchain");
        }
        self.destroy_image_resources();
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            for &semaphore in &self.image_available {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            for &fence in &self.in_flight {
                self.ctx.device.destroy_fence(fence, None);
            }
        }
    }
}

/// FIFO when vsync is on; otherwise the lowest-latency mode available
pub(crate) fn choose_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Surface's current extent, or the fallback clamped to the allowed range
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: FALLBACK_EXTENT.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width.max(capabilities.min_image_extent.width),
        ),
        height: FALLBACK_EXTENT.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height.max(capabilities.min_image_extent.height),
        ),
    }
}

/// One more image than the minimum, within the maximum (0 = unbounded)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
            max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_vsync_always_uses_fifo() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_no_vsync_prefers_mailbox_then_immediate() {
        let all = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&all, false), vk::PresentModeKHR::MAILBOX);

        let no_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&no_mailbox, false), vk::PresentModeKHR::IMMEDIATE);

        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_current_extent_wins() {
        let caps = capabilities((1280, 720), (1, 1), (4096, 4096));
        assert_eq!(choose_extent(&caps), vk::Extent2D { width: 1280, height: 720 });
    }

    #[test]
    fn test_zero_extent_is_reported_as_is() {
        let caps = capabilities((0, 0), (0, 0), (0, 0));
        assert_eq!(choose_extent(&caps), vk::Extent2D { width: 0, height: 0 });
    }

    #[test]
    fn test_undefined_extent_is_clamped() {
        let caps = capabilities((u32::MAX, u32::MAX), (1, 1), (640, 480));
        assert_eq!(choose_extent(&caps), vk::Extent2D { width: 640, height: 480 });
    }

    #[test]
    fn test_image_count_respects_maximum() {
        let mut caps = capabilities((800, 600), (1, 1), (800, 600));
        assert_eq!(choose_image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps), 2);

        caps.max_image_count = 0;
        assert_eq!(choose_image_count(&caps), 3);
    }
}
