/// DescriptorSet - Vulkan implementation of the RHI DescriptorSet trait
///
/// Each allocation call gets its own pool, sized for exactly the sets it
/// returns; the pool lives as long as any of those sets.

use ash::vk;
use lumen_rhi::lumen::Result;
use lumen_rhi::lumen::device::{Buffer, DescriptorPoolSize, DescriptorSet, DescriptorSetLayout};
use lumen_rhi::{rhi_bail, rhi_debug};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{descriptor_type_to_vk, vk_error};
use crate::vulkan_pipeline::downcast_set_layout;

struct DescriptorPool {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            // Frees every set allocated from it
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

pub struct VulkanDescriptorSet {
    pool: Arc<DescriptorPool>,
    pub(crate) set: vk::DescriptorSet,
}

impl DescriptorSet for VulkanDescriptorSet {
    fn write_uniform_buffer(&self, binding: u32, buffer: &Arc<dyn Buffer>, offset: u64, range: u64) -> Result<()> {
        let Some(vk_buffer) = buffer.as_any().downcast_ref::<VulkanBuffer>() else {
            rhi_bail!("lumen::vulkan", "Uniform buffer was not created by the Vulkan device");
        };

        let buffer_info = [vk::DescriptorBufferInfo::default()
            .buffer(vk_buffer.buffer)
            .offset(offset)
            .range(range)];

        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info);

        unsafe {
            self.pool.ctx.device.update_descriptor_sets(&[write], &[]);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Pool sizes for `count` sets: every per-set size multiplied by `count`
pub(crate) fn scaled_pool_sizes(pool_sizes: &[DescriptorPoolSize], count: u32) -> Vec<vk::DescriptorPoolSize> {
    pool_sizes
        .iter()
        .map(|size| vk::DescriptorPoolSize {
            ty: descriptor_type_to_vk(size.descriptor_type),
            descriptor_count: size.count.max(1) * count,
        })
        .collect()
}

pub(crate) fn allocate_descriptor_sets(
    ctx: &Arc<GpuContext>,
    layout: &Arc<dyn DescriptorSetLayout>,
    pool_sizes: &[DescriptorPoolSize],
    count: u32,
) -> Result<Vec<Arc<dyn DescriptorSet>>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let set_layout = downcast_set_layout(layout.as_ref())?.layout;

    let sizes = scaled_pool_sizes(pool_sizes, count);
    let pool_info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&sizes)
        .max_sets(count);

    let pool = unsafe { ctx.device.create_descriptor_pool(&pool_info, None) }
        .map_err(|e| vk_error("create descriptor pool", e))?;
    let pool = Arc::new(DescriptorPool { ctx: Arc::clone(ctx), pool });

    let layouts = vec![set_layout; count as usize];
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool.pool)
        .set_layouts(&layouts);

    // On failure the pool is dropped with the error
    let sets = unsafe { ctx.device.allocate_descriptor_sets(&alloc_info) }
        .map_err(|e| vk_error("allocate descriptor sets", e))?;

    rhi_debug!("lumen::vulkan", "Allocated {} descriptor set(s) from a dedicated pool", sets.len());

    Ok(sets
        .into_iter()
        .map(|set| Arc::new(VulkanDescriptorSet { pool: Arc::clone(&pool), set }) as Arc<dyn DescriptorSet>)
        .collect())
}
