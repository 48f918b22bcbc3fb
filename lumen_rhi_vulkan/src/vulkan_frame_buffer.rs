/// Framebuffer - Vulkan implementation of the RHI Framebuffer trait
///
/// Wraps a VkFramebuffer with one color attachment. The attachment is either
/// a swapchain image view (owned by the surface) or an offscreen image owned
/// by the framebuffer itself.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use lumen_rhi::lumen::{Error, Result};
use lumen_rhi::lumen::device::{Extent2D, Framebuffer, RenderPass};
use lumen_rhi::{rhi_bail, rhi_debug, rhi_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{extent_to_vk, vk_error};
use crate::vulkan_render_pass::downcast_render_pass;

/// Image, memory and view of an offscreen color attachment
struct OffscreenImage {
    image: vk::Image,
    allocation: Option<Allocation>,
    view: vk::ImageView,
}

enum ColorAttachment {
    /// View of a swapchain image; destroyed by the surface
    External(vk::ImageView),
    Owned { format: vk::Format, image: Option<OffscreenImage> },
}

pub struct VulkanFramebuffer {
    ctx: Arc<GpuContext>,
    render_pass: Arc<dyn RenderPass>,
    vk_render_pass: vk::RenderPass,
    pub(crate) framebuffer: vk::Framebuffer,
    extent: Extent2D,
    attachment: ColorAttachment,
}

impl VulkanFramebuffer {
    /// Framebuffer over an image view owned by someone else (swapchain images)
    pub(crate) fn with_view(
        ctx: Arc<GpuContext>,
        render_pass: Arc<dyn RenderPass>,
        view: vk::ImageView,
        extent: Extent2D,
    ) -> Result<Self> {
        let vk_render_pass = downcast_render_pass(render_pass.as_ref())?.render_pass;
        let framebuffer = create_framebuffer(&ctx, vk_render_pass, view, extent)?;
        Ok(Self {
            ctx,
            render_pass,
            vk_render_pass,
            framebuffer,
            extent,
            attachment: ColorAttachment::External(view),
        })
    }

    /// Framebuffer rendering into its own color image of `format`
    pub(crate) fn offscreen(
        ctx: Arc<GpuContext>,
        render_pass: Arc<dyn RenderPass>,
        format: vk::Format,
        extent: Extent2D,
    ) -> Result<Self> {
        let vk_render_pass = downcast_render_pass(render_pass.as_ref())?.render_pass;
        let image = create_offscreen_image(&ctx, format, extent)?;
        let framebuffer = match create_framebuffer(&ctx, vk_render_pass, image.view, extent) {
            Ok(framebuffer) => framebuffer,
            Err(e) => {
                destroy_offscreen_image(&ctx, image);
                return Err(e);
            }
        };

        rhi_debug!("lumen::vulkan", "Created offscreen framebuffer {}x{} ({:?})", extent.width, extent.height, format);

        Ok(Self {
            ctx,
            render_pass,
            vk_render_pass,
            framebuffer,
            extent,
            attachment: ColorAttachment::Owned { format, image: Some(image) },
        })
    }

    pub(crate) fn vk_render_pass(&self) -> vk::RenderPass {
        self.vk_render_pass
    }

    /// Color image of an offscreen framebuffer
    pub fn color_image(&self) -> Option<vk::Image> {
        match &self.attachment {
            ColorAttachment::Owned { image: Some(image), .. } => Some(image.image),
            _ => None,
        }
    }
}

impl Framebuffer for VulkanFramebuffer {
    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    fn set_extent(&mut self, extent: Extent2D) {
        self.extent = extent;
    }

    fn invalidate(&mut self) -> Result<()> {
        if self.extent.is_empty() {
            rhi_bail!("lumen::vulkan",
                "Cannot rebuild a framebuffer at {}x{}", self.extent.width, self.extent.height);
        }

        self.ctx.wait_idle()?;
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
        self.framebuffer = vk::Framebuffer::null();

        let view = match &mut self.attachment {
            ColorAttachment::External(view) => *view,
            ColorAttachment::Owned { format, image } => {
                if let Some(old) = image.take() {
                    destroy_offscreen_image(&self.ctx, old);
                }
                let new_image = create_offscreen_image(&self.ctx, *format, self.extent)?;
                let view = new_image.view;
                *image = Some(new_image);
                view
            }
        };

        self.framebuffer = create_framebuffer(&self.ctx, self.vk_render_pass, view, self.extent)?;
        rhi_debug!("lumen::vulkan", "Framebuffer rebuilt at {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            if self.framebuffer != vk::Framebuffer::null() {
                self.ctx.device.destroy_framebuffer(self.framebuffer, None);
            }
        }
        if let ColorAttachment::Owned { image, .. } = &mut self.attachment {
            if let Some(image) = image.take() {
                destroy_offscreen_image(&self.ctx, image);
            }
        }
    }
}

pub(crate) fn downcast_framebuffer(framebuffer: &dyn Framebuffer) -> Result<&VulkanFramebuffer> {
    match framebuffer.as_any().downcast_ref::<VulkanFramebuffer>() {
        Some(framebuffer) => Ok(framebuffer),
        None => rhi_bail!("lumen::vulkan", "Framebuffer was not created by the Vulkan backend"),
    }
}

fn create_framebuffer(
    ctx: &GpuContext,
    render_pass: vk::RenderPass,
    view: vk::ImageView,
    extent: Extent2D,
) -> Result<vk::Framebuffer> {
    let attachments = [view];
    let framebuffer_info = vk::FramebufferCreateInfo::default()
        .render_pass(render_pass)
        .attachments(&attachments)
        .width(extent.width)
        .height(extent.height)
        .layers(1);

    unsafe { ctx.device.create_framebuffer(&framebuffer_info, None) }
        .map_err(|e| vk_error("create framebuffer", e))
}

fn create_offscreen_image(ctx: &GpuContext, format: vk::Format, extent: Extent2D) -> Result<OffscreenImage> {
    if extent.is_empty() {
        rhi_bail!("lumen::vulkan", "Offscreen image needs a non-zero extent (got {}x{})", extent.width, extent.height);
    }

    unsafe {
        let vk_extent = extent_to_vk(extent);
        let image_create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D { width: vk_extent.width, height: vk_extent.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = ctx.device.create_image(&image_create_info, None)
            .map_err(|e| vk_error("create offscreen image", e))?;

        let requirements = ctx.device.get_image_memory_requirements(image);
        let allocation = match ctx.allocator.lock() {
            Ok(mut allocator) => allocator.allocate(&AllocationCreateDesc {
                name: "lumen offscreen color",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }),
            Err(_) => {
                ctx.device.destroy_image(image, None);
                rhi_bail!("lumen::vulkan", "GPU allocator lock poisoned");
            }
        };
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(_) => {
                ctx.device.destroy_image(image, None);
                rhi_error!("lumen::vulkan",
                    "Out of GPU memory for {}x{} offscreen image", extent.width, extent.height);
                return Err(Error::OutOfMemory);
            }
        };

        let mut offscreen = OffscreenImage { image, allocation: Some(allocation), view: vk::ImageView::null() };

        let bound = match &offscreen.allocation {
            Some(allocation) => ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()),
            None => Ok(()),
        };
        if let Err(e) = bound {
            destroy_offscreen_image(ctx, offscreen);
            return Err(vk_error("bind image memory", e));
        }

        let view_create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        match ctx.device.create_image_view(&view_create_info, None) {
            Ok(view) => {
                offscreen.view = view;
                Ok(offscreen)
            }
            Err(e) => {
                destroy_offscreen_image(ctx, offscreen);
                Err(vk_error("create offscreen image view", e))
            }
        }
    }
}

fn destroy_offscreen_image(ctx: &GpuContext, mut image: OffscreenImage) {
    unsafe {
        if image.view != vk::ImageView::null() {
            ctx.device.destroy_image_view(image.view, None);
        }
        if let Some(allocation) = image.allocation.take() {
            if let Ok(mut allocator) = ctx.allocator.lock() {
                allocator.free(allocation).ok();
            }
        }
        ctx.device.destroy_image(image.image, None);
    }
}
