/// VulkanContext - instance, physical/logical device, allocator and queues
///
/// `GpuContext` is the part shared (via `Arc`) by every Vulkan object the
/// backend creates. `VulkanContext` owns it and tears everything down.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use lumen_rhi::lumen::{Config, Error, Result, SurfaceConfig};
use lumen_rhi::lumen::swapchain::Swapchain;
use lumen_rhi::lumen::device::{Device, Extent2D, Framebuffer, RenderPass};
use lumen_rhi::{rhi_bail, rhi_err, rhi_info, rhi_warn};
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use crate::vulkan_device::VulkanDevice;
use crate::vulkan_format::vk_error;
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_swapchain::VulkanSurface;

/// Queue roles exposed by the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    Graphics,
    Present,
    Compute,
    Transfer,
}

/// Queue family chosen for each role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
    pub compute: u32,
    pub transfer: u32,
}

impl QueueFamilies {
    /// Distinct family indices, in role order
    pub fn unique(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(4);
        for family in [self.graphics, self.present, self.compute, self.transfer] {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

/// Pick a family per role
///
/// Present prefers the graphics family; compute and transfer prefer
/// dedicated families and fall back to graphics.
pub(crate) fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> Option<QueueFamilies> {
    let find = |pred: &dyn Fn(vk::QueueFlags) -> bool| {
        families
            .iter()
            .enumerate()
            .find(|(_, f)| f.queue_count > 0 && pred(f.queue_flags))
            .map(|(i, _)| i as u32)
    };

    let graphics = find(&|f| f.contains(vk::QueueFlags::GRAPHICS))?;
    let present = if supports_present(graphics) {
        graphics
    } else {
        (0..families.len() as u32).find(|&i| supports_present(i))?
    };
    let compute = find(&|f| f.contains(vk::QueueFlags::COMPUTE) && !f.contains(vk::QueueFlags::GRAPHICS))
        .or_else(|| find(&|f| f.contains(vk::QueueFlags::COMPUTE)))
        .unwrap_or(graphics);
    let transfer = find(&|f| {
        f.contains(vk::QueueFlags::TRANSFER)
            && !f.contains(vk::QueueFlags::GRAPHICS)
            && !f.contains(vk::QueueFlags::COMPUTE)
    })
    .unwrap_or(graphics);

    Some(QueueFamilies { graphics, present, compute, transfer })
}

/// Preference of a device type during autodetection (higher wins)
pub(crate) fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    }
}

/// Preferred presentation format: sRGB BGRA, then sRGB RGBA, then whatever comes first
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB];
    preferred
        .iter()
        .find_map(|&format| {
            formats.iter().copied().find(|f| {
                f.format == format && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .or_else(|| formats.first().copied())
}

/// Shared GPU context for all Vulkan resources.
///
/// Shared (via `Arc`) by buffers, pipelines, encoders and surfaces so each
/// one does not carry its own device/allocator/queue references.
///
/// Note: device and instance destruction is handled by `VulkanContext::drop()`.
pub struct GpuContext {
    /// Keeps the Vulkan loader alive
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub(crate) device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub(crate) allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    pub(crate) families: QueueFamilies,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
    pub(crate) compute_queue: vk::Queue,
    pub(crate) transfer_queue: vk::Queue,

    /// Queue submission must be externally synchronized
    pub(crate) submit_lock: Mutex<()>,

    /// Flush ranges of host memory are aligned to this
    pub(crate) non_coherent_atom_size: u64,
}

impl GpuContext {
    pub(crate) fn queue(&self, queue_type: QueueType) -> vk::Queue {
        match queue_type {
            QueueType::Graphics => self.graphics_queue,
            QueueType::Present => self.present_queue,
            QueueType::Compute => self.compute_queue,
            QueueType::Transfer => self.transfer_queue,
        }
    }

    pub(crate) fn queue_family(&self, queue_type: QueueType) -> u32 {
        match queue_type {
            QueueType::Graphics => self.families.graphics,
            QueueType::Present => self.families.present,
            QueueType::Compute => self.families.compute,
            QueueType::Transfer => self.families.transfer,
        }
    }

    pub(crate) fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::default();
        unsafe { self.device.create_semaphore(&info, None) }
            .map_err(|e| vk_error("create semaphore", e))
    }

    pub(crate) fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let info = vk::FenceCreateInfo::default().flags(flags);
        unsafe { self.device.create_fence(&info, None) }
            .map_err(|e| vk_error("create fence", e))
    }

    pub(crate) fn create_command_pool(&self, queue_type: QueueType, flags: vk::CommandPoolCreateFlags) -> Result<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.queue_family(queue_type))
            .flags(flags);
        unsafe { self.device.create_command_pool(&info, None) }
            .map_err(|e| vk_error("create command pool", e))
    }

    pub(crate) fn allocate_command_buffer(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel) -> Result<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(level)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&info) }
            .map_err(|e| vk_error("allocate command buffer", e))?;
        buffers
            .into_iter()
            .next()
            .ok_or_else(|| rhi_err!("lumen::vulkan", "Command buffer allocation returned no buffer"))
    }

    pub(crate) fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| vk_error("wait for device idle", e))
    }
}

/// Physical device picked for the context
struct SelectedGpu {
    physical_device: vk::PhysicalDevice,
    families: QueueFamilies,
    name: String,
}

/// Vulkan context: instance, surface, chosen GPU, logical device and allocator
///
/// Every object created from the context (swapchains, pipelines, meshes,
/// command buffers) must be dropped before it.
pub struct VulkanContext {
    ctx: Arc<GpuContext>,
    device: ManuallyDrop<Arc<VulkanDevice>>,
    allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    surface_format: vk::SurfaceFormatKHR,
    default_render_pass: ManuallyDrop<Arc<dyn RenderPass>>,
    gpu_name: String,
    config: Config,

    #[cfg(feature = "vulkan-validation")]
    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanContext {
    /// Create the instance, presentation surface, logical device and allocator
    ///
    /// # Arguments
    ///
    /// * `surface_config` - Raw window/display handles and GPU selection options
    /// * `config` - Context configuration
    pub fn new(surface_config: &SurfaceConfig, config: Config) -> Result<Self> {
        config.validate()?;
        if surface_config.required_gpus == 0 {
            rhi_bail!("lumen::vulkan", "SurfaceConfig.required_gpus must be at least 1");
        }

        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                lumen_rhi::rhi_error!("lumen::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(config.app_name.clone()).map_err(|_| {
                Error::InitializationFailed("Application name contains a NUL byte".to_string())
            })?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Lumen")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let mut extension_names = ash_window::enumerate_required_extensions(surface_config.display)
                .map_err(|e| init_error("enumerate required surface extensions", e))?
                .to_vec();

            let validation = Self::validation_enabled(&config);
            let layer_names = if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error("create Vulkan instance", e))?;

            #[cfg(feature = "vulkan-validation")]
            let (debug_utils_loader, debug_messenger) = if validation {
                match crate::debug::create_messenger(&entry, &instance, &config) {
                    Ok((loader, messenger)) => (Some(loader), Some(messenger)),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                (None, None)
            };

            let surface = match ash_window::create_surface(
                &entry,
                &instance,
                surface_config.display,
                surface_config.window,
                None,
            ) {
                Ok(surface) => surface,
                Err(e) => {
                    #[cfg(feature = "vulkan-validation")]
                    destroy_messenger(&debug_utils_loader, &debug_messenger);
                    instance.destroy_instance(None);
                    return Err(init_error("create window surface", e));
                }
            };
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let cleanup_instance = |surface_loader: &ash::khr::surface::Instance| {
                surface_loader.destroy_surface(surface, None);
                #[cfg(feature = "vulkan-validation")]
                destroy_messenger(&debug_utils_loader, &debug_messenger);
                instance.destroy_instance(None);
            };

            let selected = match Self::select_gpu(&instance, &surface_loader, surface, surface_config) {
                Ok(selected) => selected,
                Err(e) => {
                    cleanup_instance(&surface_loader);
                    return Err(e);
                }
            };

            let surface_format = match surface_loader
                .get_physical_device_surface_formats(selected.physical_device, surface)
                .map_err(|e| init_error("query surface formats", e))
                .and_then(|formats| {
                    choose_surface_format(&formats).ok_or_else(|| {
                        Error::InitializationFailed("Surface reports no formats".to_string())
                    })
                }) {
                Ok(format) => format,
                Err(e) => {
                    cleanup_instance(&surface_loader);
                    return Err(e);
                }
            };

            let device = match Self::create_logical_device(&instance, &selected) {
                Ok(device) => device,
                Err(e) => {
                    cleanup_instance(&surface_loader);
                    return Err(e);
                }
            };

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: selected.physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => {
                    device.destroy_device(None);
                    cleanup_instance(&surface_loader);
                    lumen_rhi::rhi_error!("lumen::vulkan", "Failed to create GPU allocator: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
                }
            };

            let properties = instance.get_physical_device_properties(selected.physical_device);
            let families = selected.families;
            let allocator_arc = Arc::new(Mutex::new(allocator));

            let ctx = Arc::new(GpuContext {
                graphics_queue: device.get_device_queue(families.graphics, 0),
                present_queue: device.get_device_queue(families.present, 0),
                compute_queue: device.get_device_queue(families.compute, 0),
                transfer_queue: device.get_device_queue(families.transfer, 0),
                entry,
                instance,
                physical_device: selected.physical_device,
                device,
                allocator: ManuallyDrop::new(Arc::clone(&allocator_arc)),
                families,
                submit_lock: Mutex::new(()),
                non_coherent_atom_size: properties.limits.non_coherent_atom_size.max(1),
            });

            let default_render_pass: Arc<dyn RenderPass> = match VulkanRenderPass::new_color(
                Arc::clone(&ctx),
                surface_format.format,
                1,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ) {
                Ok(pass) => Arc::new(pass),
                Err(e) => {
                    let mut ctx = ctx;
                    drop(allocator_arc);
                    if let Some(ctx) = Arc::get_mut(&mut ctx) {
                        ManuallyDrop::drop(&mut ctx.allocator);
                    }
                    ctx.device.destroy_device(None);
                    surface_loader.destroy_surface(surface, None);
                    #[cfg(feature = "vulkan-validation")]
                    destroy_messenger(&debug_utils_loader, &debug_messenger);
                    ctx.instance.destroy_instance(None);
                    return Err(e);
                }
            };

            let device = Arc::new(VulkanDevice::new(Arc::clone(&ctx), config.frames_in_flight));

            rhi_info!("lumen::vulkan",
                "Vulkan context ready on '{}' (graphics family {}, present family {}, {} frames in flight)",
                selected.name, families.graphics, families.present, config.frames_in_flight);

            Ok(Self {
                ctx,
                device: ManuallyDrop::new(device),
                allocator: ManuallyDrop::new(allocator_arc),
                surface,
                surface_loader,
                surface_format,
                default_render_pass: ManuallyDrop::new(default_render_pass),
                gpu_name: selected.name,
                config,
                #[cfg(feature = "vulkan-validation")]
                debug_utils_loader,
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
            })
        }
    }

    fn validation_enabled(config: &Config) -> bool {
        if config.enable_validation && !cfg!(feature = "vulkan-validation") {
            rhi_warn!("lumen::vulkan",
                "Validation requested but lumen_rhi_vulkan was built without the 'vulkan-validation' feature");
        }
        config.enable_validation && cfg!(feature = "vulkan-validation")
    }

    unsafe fn select_gpu(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        surface_config: &SurfaceConfig,
    ) -> Result<SelectedGpu> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| init_error("enumerate physical devices", e))?;

        if (physical_devices.len() as u32) < surface_config.required_gpus {
            rhi_bail!("lumen::vulkan",
                "{} GPU(s) required but only {} Vulkan device(s) found",
                surface_config.required_gpus, physical_devices.len());
        }

        let mut best: Option<(u32, SelectedGpu)> = None;
        for physical_device in physical_devices {
            let properties = instance.get_physical_device_properties(physical_device);
            let name = properties
                .device_name_as_c_str()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if !Self::supports_swapchain(instance, physical_device) {
                rhi_info!("lumen::vulkan", "Skipping '{}': no VK_KHR_swapchain", name);
                continue;
            }

            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
            let Some(families) = select_queue_families(&queue_families, |i| {
                surface_loader
                    .get_physical_device_surface_support(physical_device, i, surface)
                    .unwrap_or(false)
            }) else {
                rhi_info!("lumen::vulkan", "Skipping '{}': no graphics/present queue", name);
                continue;
            };

            // Without autodetection the first suitable device wins
            let score = if surface_config.gpu_autodetect {
                device_type_score(properties.device_type)
            } else {
                0
            };
            let candidate = SelectedGpu { physical_device, families, name };
            match &best {
                Some((best_score, _)) if *best_score >= score => {}
                _ => best = Some((score, candidate)),
            }
        }

        best.map(|(_, gpu)| gpu).ok_or_else(|| {
            lumen_rhi::rhi_error!("lumen::vulkan", "No Vulkan-capable GPU can present to this surface");
            Error::InitializationFailed("No suitable GPU found".to_string())
        })
    }

    unsafe fn supports_swapchain(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
        instance
            .enumerate_device_extension_properties(physical_device)
            .map(|extensions| {
                extensions.iter().any(|ext| {
                    ext.extension_name_as_c_str()
                        .map(|name| name == ash::khr::swapchain::NAME)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }

    unsafe fn create_logical_device(instance: &ash::Instance, selected: &SelectedGpu) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = selected
            .families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

        // Wide lines and line/point polygon modes are used by GraphicsState when available
        let supported = instance.get_physical_device_features(selected.physical_device);
        let device_features = vk::PhysicalDeviceFeatures::default()
            .wide_lines(supported.wide_lines == vk::TRUE)
            .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        instance
            .create_device(selected.physical_device, &device_create_info, None)
            .map_err(|e| init_error("create logical device", e))
    }

    /// RHI device used by pipelines, meshes and command buffers
    pub fn device(&self) -> Arc<dyn Device> {
        Arc::clone(&*self.device) as Arc<dyn Device>
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Name of the selected physical device
    pub fn gpu_name(&self) -> &str {
        &self.gpu_name
    }

    pub fn surface_format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn queue(&self, queue_type: QueueType) -> vk::Queue {
        self.ctx.queue(queue_type)
    }

    pub fn queue_family(&self, queue_type: QueueType) -> u32 {
        self.ctx.queue_family(queue_type)
    }

    pub fn create_semaphore(&self) -> Result<vk::Semaphore> {
        self.ctx.create_semaphore()
    }

    pub fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        self.ctx.create_fence(signaled)
    }

    /// Command pool on `queue_type`'s family
    pub fn create_command_pool(&self, queue_type: QueueType, flags: vk::CommandPoolCreateFlags) -> Result<vk::CommandPool> {
        self.ctx.create_command_pool(queue_type, flags)
    }

    pub fn create_command_buffer(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel) -> Result<vk::CommandBuffer> {
        self.ctx.allocate_command_buffer(pool, level)
    }

    /// Destroy a semaphore created by `create_semaphore`
    pub fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.ctx.device.destroy_semaphore(semaphore, None) }
    }

    /// Destroy a fence created by `create_fence`
    pub fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.ctx.device.destroy_fence(fence, None) }
    }

    /// Destroy a pool created by `create_command_pool`, freeing its buffers
    pub fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.ctx.device.destroy_command_pool(pool, None) }
    }

    /// Block until the device finished all submitted work
    pub fn wait_for_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }

    /// Single-subpass color pass in the surface format, usable with `create_framebuffer`
    pub fn default_render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.default_render_pass
    }

    /// Offscreen framebuffer with one color attachment for the default render pass
    pub fn create_framebuffer(&self, extent: Extent2D) -> Result<Box<dyn Framebuffer>> {
        let framebuffer = VulkanFramebuffer::offscreen(
            Arc::clone(&self.ctx),
            Arc::clone(&*self.default_render_pass),
            self.surface_format.format,
            extent,
        )?;
        Ok(Box::new(framebuffer))
    }

    /// Swapchain presenting to the window this context was created for
    pub fn create_swapchain(&self) -> Result<Swapchain> {
        let surface = VulkanSurface::new(
            Arc::clone(&self.ctx),
            self.surface,
            self.surface_loader.clone(),
            self.surface_format,
            self.config.frames_in_flight,
            self.config.vsync,
        )?;
        Swapchain::new(self.device(), Box::new(surface))
    }

    /// Counters collected by the validation messenger
    #[cfg(feature = "vulkan-validation")]
    pub fn validation_stats(&self) -> lumen_rhi::lumen::ValidationStats {
        crate::debug::get_validation_stats()
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            // 1. Objects holding the GpuContext
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.default_render_pass);

            // 2. Allocator: free memory blocks BEFORE destroying the device
            ManuallyDrop::drop(&mut self.allocator);
            if let Some(ctx) = Arc::get_mut(&mut self.ctx) {
                ManuallyDrop::drop(&mut ctx.allocator);
            } else {
                rhi_warn!("lumen::vulkan",
                    "VulkanContext dropped while GPU objects are still alive; leaking the allocator");
            }

            // 3. Stop validation callbacks before the instance goes away
            #[cfg(feature = "vulkan-validation")]
            {
                crate::debug::cleanup_debug_config();
                destroy_messenger(&self.debug_utils_loader, &self.debug_messenger);
            }

            // 4. Surface, device and instance
            self.surface_loader.destroy_surface(self.surface, None);
            self.ctx.device.destroy_device(None);
            self.ctx.instance.destroy_instance(None);
        }
    }
}

#[cfg(feature = "vulkan-validation")]
unsafe fn destroy_messenger(
    loader: &Option<ash::ext::debug_utils::Instance>,
    messenger: &Option<vk::DebugUtilsMessengerEXT>,
) {
    if let (Some(loader), Some(messenger)) = (loader, messenger) {
        loader.destroy_debug_utils_messenger(*messenger, None);
    }
}

fn init_error(operation: &str, result: vk::Result) -> Error {
    lumen_rhi::rhi_error!("lumen::vulkan", "Failed to {}: {:?}", operation, result);
    Error::InitializationFailed(format!("Failed to {}: {:?}", operation, result))
}

#[cfg(test)]
#[path = "vulkan_context_tests.rs"]
mod tests;
