/// VulkanShaderModule - Vulkan implementation of the RHI ShaderModule trait

use ash::vk;
use lumen_rhi::lumen::Result;
use lumen_rhi::lumen::device::{DescriptorType, ReflectedBinding, ShaderModule, ShaderStage};
use lumen_rhi::{rhi_trace, rhi_warn};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::vk_error;

/// Vulkan shader module plus the descriptor bindings found in its SPIR-V
pub struct VulkanShaderModule {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    stage: ShaderStage,
    reflected_bindings: Vec<ReflectedBinding>,
}

impl VulkanShaderModule {
    pub(crate) fn new(ctx: Arc<GpuContext>, stage: ShaderStage, code: &[u32]) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { ctx.device.create_shader_module(&create_info, None) }
            .map_err(|e| vk_error("create shader module", e))?;

        // Reflection only feeds diagnostics; a module the driver accepted stays usable
        let reflected_bindings = match reflect_bindings(code) {
            Ok(bindings) => bindings,
            Err(reason) => {
                rhi_warn!("lumen::vulkan", "SPIR-V reflection failed for {:?} shader: {}", stage, reason);
                Vec::new()
            }
        };
        rhi_trace!("lumen::vulkan",
            "Created {:?} shader module ({} words, {} bindings)", stage, code.len(), reflected_bindings.len());

        Ok(Self { ctx, module, stage, reflected_bindings })
    }
}

impl ShaderModule for VulkanShaderModule {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn reflected_bindings(&self) -> &[ReflectedBinding] {
        &self.reflected_bindings
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Descriptor bindings used by every entry point of a SPIR-V binary
pub(crate) fn reflect_bindings(code: &[u32]) -> std::result::Result<Vec<ReflectedBinding>, String> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| format!("{:?}", e))?;

    let mut bindings: Vec<ReflectedBinding> = Vec::new();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            if let spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, .. } = var {
                let binding = ReflectedBinding {
                    name: name.clone().unwrap_or_default(),
                    set: desc_bind.set(),
                    binding: desc_bind.bind(),
                    descriptor_type: spirq_descriptor_type(desc_ty),
                };
                if !bindings.iter().any(|b| b.set == binding.set && b.binding == binding.binding) {
                    bindings.push(binding);
                }
            }
        }
    }
    Ok(bindings)
}

/// Map spirq descriptor kinds onto the ones the RHI models
fn spirq_descriptor_type(desc_ty: &spirq::ty::DescriptorType) -> Option<DescriptorType> {
    use spirq::ty::DescriptorType as Spirq;
    match desc_ty {
        Spirq::UniformBuffer() => Some(DescriptorType::UniformBuffer),
        Spirq::StorageBuffer(..) => Some(DescriptorType::StorageBuffer),
        Spirq::CombinedImageSampler() => Some(DescriptorType::CombinedImageSampler),
        _ => None,
    }
}
