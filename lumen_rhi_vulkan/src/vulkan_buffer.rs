/// Buffer - Vulkan implementation of the RHI Buffer trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use lumen_rhi::lumen::{Error, Result};
use lumen_rhi::lumen::device::{check_write_range, Buffer, BufferDesc};
use lumen_rhi::{rhi_bail, rhi_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{buffer_usage_to_vk, vk_error};

/// Host-visible Vulkan buffer
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl VulkanBuffer {
    /// Create the buffer, allocate CPU-to-GPU memory and bind it
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            rhi_bail!("lumen::vulkan", "Cannot create a {:?} buffer of size 0", desc.usage);
        }

        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&buffer_create_info, None)
                .map_err(|e| vk_error("create buffer", e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = {
                let mut allocator = match ctx.allocator.lock() {
                    Ok(allocator) => allocator,
                    Err(_) => {
                        ctx.device.destroy_buffer(buffer, None);
                        rhi_bail!("lumen::vulkan", "GPU allocator lock poisoned");
                    }
                };
                allocator.allocate(&AllocationCreateDesc {
                    name: "lumen buffer",
                    requirements,
                    location: MemoryLocation::CpuToGpu,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
            };
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(_) => {
                    ctx.device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    rhi_error!("lumen::vulkan", "Out of GPU memory for buffer (required: {:.2} MB)", size_mb);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                if let Ok(mut allocator) = ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
                ctx.device.destroy_buffer(buffer, None);
                return Err(vk_error("bind buffer memory", e));
            }

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                size: desc.size,
            })
        }
    }

    /// Range covering the whole allocation, widened to the non-coherent atom size
    fn flush_range(&self, allocation: &Allocation) -> vk::MappedMemoryRange<'static> {
        let atom = self.ctx.non_coherent_atom_size;
        let offset = allocation.offset() / atom * atom;
        let end = allocation.offset() + allocation.size();
        let size = (end - offset).div_ceil(atom) * atom;
        vk::MappedMemoryRange::default()
            .memory(unsafe { allocation.memory() })
            .offset(offset)
            .size(size)
    }
}

impl Buffer for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_write_range(self.size, offset, data.len())?;

        let Some(allocation) = &self.allocation else {
            rhi_bail!("lumen::vulkan", "Buffer update failed: no GPU allocation");
        };
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                mapped_ptr.add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let Some(allocation) = &self.allocation else {
            rhi_bail!("lumen::vulkan", "Buffer flush failed: no GPU allocation");
        };
        let coherent = allocation
            .memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT);
        if coherent {
            return Ok(());
        }

        let range = self.flush_range(allocation);
        unsafe { self.ctx.device.flush_mapped_memory_ranges(&[range]) }
            .map_err(|e| vk_error("flush mapped memory", e))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
