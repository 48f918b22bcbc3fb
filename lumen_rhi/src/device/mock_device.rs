/// Mock device for unit tests (no GPU required)
///
/// Every object records what it is asked to do as a plain string in a
/// shared event log, so tests can assert exact call sequences. Failures
/// can be injected per creation step with a native result code.

use std::any::Any;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use crate::device::{
    Buffer, BufferDesc, BufferUsage, CommandBufferKind, CommandEncoder, DescriptorBinding,
    DescriptorPoolSize, DescriptorSet, DescriptorSetLayout, Device, Extent2D, Framebuffer,
    GraphicsPipeline, GraphicsPipelineDesc, GraphicsState, IndexType, PipelineLayout, Rect2D,
    ReflectedBinding, RenderPass, ShaderModule, ShaderStage, VertexLayout, Viewport,
    SPIRV_MAGIC, check_write_range,
};
use crate::error::{Error, Result};
use crate::swapchain::{AcquireResult, PresentResult, PresentSurface};

pub type EventLog = Arc<Mutex<Vec<String>>>;

fn record(events: &EventLog, event: String) {
    if let Ok(mut events) = events.lock() {
        events.push(event);
    }
}

// ============================================================================
// Mock Device
// ============================================================================

/// Device call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStep {
    CreateBuffer,
    CreateShaderModule,
    CreateDescriptorSetLayout,
    CreatePipelineLayout,
    CreateGraphicsPipeline,
    AllocateDescriptorSets,
    CreateCommandEncoder,
}

pub struct MockDevice {
    frames_in_flight: u32,
    events: EventLog,
    next_id: AtomicU64,
    failure: Mutex<Option<(MockStep, i32)>>,
    live_shader_modules: Arc<AtomicUsize>,
    reflections: Mutex<Vec<(ShaderStage, Vec<ReflectedBinding>)>>,
    buffers: Mutex<Vec<Arc<MockBuffer>>>,
}

impl MockDevice {
    pub fn new(frames_in_flight: u32) -> Self {
        Self {
            frames_in_flight,
            events: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            failure: Mutex::new(None),
            live_shader_modules: Arc::new(AtomicUsize::new(0)),
            reflections: Mutex::new(Vec::new()),
            buffers: Mutex::new(Vec::new()),
        }
    }

    /// Device plus its trait-object view
    pub fn shared(frames_in_flight: u32) -> (Arc<MockDevice>, Arc<dyn Device>) {
        let mock = Arc::new(Self::new(frames_in_flight));
        let device: Arc<dyn Device> = mock.clone();
        (mock, device)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events starting with `prefix`
    pub fn events_matching(&self, prefix: &str) -> Vec<String> {
        self.events().into_iter().filter(|e| e.starts_with(prefix)).collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events_matching(prefix).len()
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// Make the next call of `step` fail with native `code`
    pub fn fail_at(&self, step: MockStep, code: i32) {
        *self.failure.lock().unwrap() = Some((step, code));
    }

    /// Shader modules created and not yet dropped
    pub fn live_shader_modules(&self) -> usize {
        self.live_shader_modules.load(Ordering::SeqCst)
    }

    /// Bindings reported by modules of `stage` created from now on
    pub fn set_reflection(&self, stage: ShaderStage, bindings: Vec<ReflectedBinding>) {
        self.reflections.lock().unwrap().push((stage, bindings));
    }

    /// Every buffer created so far, in creation order
    pub fn buffers(&self) -> Vec<Arc<MockBuffer>> {
        self.buffers.lock().unwrap().clone()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_failure(&self, step: MockStep, operation: &str) -> Result<()> {
        let mut failure = self.failure.lock().unwrap();
        if let Some((failing, code)) = *failure {
            if failing == step {
                *failure = None;
                record(&self.events, format!("failed {}", operation));
                return Err(Error::Native { operation: operation.to_string(), code });
            }
        }
        Ok(())
    }
}

impl Device for MockDevice {
    fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        self.check_failure(MockStep::CreateBuffer, "create buffer")?;
        let buffer = Arc::new(MockBuffer {
            id: self.next_id(),
            size: desc.size,
            usage: desc.usage,
            data: Mutex::new(vec![0; desc.size as usize]),
            events: Arc::clone(&self.events),
        });
        record(&self.events, format!("create_buffer #{} {:?} {}", buffer.id, desc.usage, desc.size));
        self.buffers.lock().unwrap().push(Arc::clone(&buffer));
        Ok(buffer)
    }

    fn create_shader_module(&self, stage: ShaderStage, code: &[u32]) -> Result<Box<dyn ShaderModule>> {
        self.check_failure(MockStep::CreateShaderModule, "create shader module")?;
        let reflected = self
            .reflections
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(s, _)| *s == stage)
            .map(|(_, b)| b.clone())
            .unwrap_or_default();
        self.live_shader_modules.fetch_add(1, Ordering::SeqCst);
        record(&self.events, format!("create_shader_module {:?} words={}", stage, code.len()));
        Ok(Box::new(MockShaderModule {
            stage,
            reflected,
            live: Arc::clone(&self.live_shader_modules),
            events: Arc::clone(&self.events),
        }))
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<Arc<dyn DescriptorSetLayout>> {
        self.check_failure(MockStep::CreateDescriptorSetLayout, "create descriptor set layout")?;
        let id = self.next_id();
        record(&self.events, format!("create_descriptor_set_layout #{} bindings={}", id, bindings.len()));
        Ok(Arc::new(MockDescriptorSetLayout { id, bindings: bindings.to_vec() }))
    }

    fn create_pipeline_layout(&self, set_layouts: &[Arc<dyn DescriptorSetLayout>]) -> Result<Arc<dyn PipelineLayout>> {
        self.check_failure(MockStep::CreatePipelineLayout, "create pipeline layout")?;
        let id = self.next_id();
        record(&self.events, format!("create_pipeline_layout #{} sets={}", id, set_layouts.len()));
        Ok(Arc::new(MockPipelineLayout { id }))
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc<'_>) -> Result<Arc<dyn GraphicsPipeline>> {
        self.check_failure(MockStep::CreateGraphicsPipeline, "create graphics pipeline")?;
        let id = self.next_id();
        let stages: Vec<ShaderStage> = desc.stages.iter().map(|m| m.stage()).collect();
        record(&self.events, format!(
            "create_graphics_pipeline #{} subpass={} stages={:?}", id, desc.subpass, stages
        ));
        Ok(Arc::new(MockPipeline {
            id,
            subpass: desc.subpass,
            stages,
            state: desc.state.clone(),
            vertex_layout: desc.vertex_layout.clone(),
        }))
    }

    fn allocate_descriptor_sets(
        &self,
        _layout: &Arc<dyn DescriptorSetLayout>,
        pool_sizes: &[DescriptorPoolSize],
        count: u32,
    ) -> Result<Vec<Arc<dyn DescriptorSet>>> {
        self.check_failure(MockStep::AllocateDescriptorSets, "allocate descriptor sets")?;
        record(&self.events, format!("allocate_descriptor_sets count={} pool_sizes={}", count, pool_sizes.len()));
        Ok((0..count)
            .map(|_| {
                Arc::new(MockDescriptorSet {
                    id: self.next_id(),
                    events: Arc::clone(&self.events),
                }) as Arc<dyn DescriptorSet>
            })
            .collect())
    }

    fn create_command_encoder(&self, kind: CommandBufferKind) -> Result<Box<dyn CommandEncoder>> {
        self.check_failure(MockStep::CreateCommandEncoder, "create command encoder")?;
        record(&self.events, format!("create_command_encoder {:?}", kind));
        Ok(Box::new(MockEncoder::new(kind)))
    }
}

// ============================================================================
// Mock resources
// ============================================================================

pub struct MockBuffer {
    id: u64,
    size: u64,
    usage: BufferUsage,
    data: Mutex<Vec<u8>>,
    events: EventLog,
}

impl MockBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Current content of the buffer
    pub fn data(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_write_range(self.size, offset, data.len())?;
        let start = offset as usize;
        self.data.lock().unwrap()[start..start + data.len()].copy_from_slice(data);
        record(&self.events, format!("update #{} {} {}", self.id, offset, data.len()));
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        record(&self.events, format!("flush #{}", self.id));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Id of a buffer created by a `MockDevice` (0 for foreign buffers)
pub fn buffer_id(buffer: &dyn Buffer) -> u64 {
    buffer.as_any().downcast_ref::<MockBuffer>().map_or(0, |b| b.id)
}

pub struct MockShaderModule {
    stage: ShaderStage,
    reflected: Vec<ReflectedBinding>,
    live: Arc<AtomicUsize>,
    events: EventLog,
}

impl ShaderModule for MockShaderModule {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn reflected_bindings(&self) -> &[ReflectedBinding] {
        &self.reflected
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockShaderModule {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        record(&self.events, format!("destroy_shader_module {:?}", self.stage));
    }
}

pub struct MockDescriptorSetLayout {
    pub id: u64,
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayout for MockDescriptorSetLayout {
    fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipelineLayout {
    pub id: u64,
}

impl PipelineLayout for MockPipelineLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipeline {
    pub id: u64,
    pub subpass: u32,
    pub stages: Vec<ShaderStage>,
    pub state: GraphicsState,
    pub vertex_layout: VertexLayout,
}

impl GraphicsPipeline for MockPipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockDescriptorSet {
    pub id: u64,
    events: EventLog,
}

impl DescriptorSet for MockDescriptorSet {
    fn write_uniform_buffer(&self, binding: u32, buffer: &Arc<dyn Buffer>, offset: u64, range: u64) -> Result<()> {
        record(&self.events, format!(
            "write_uniform_buffer set=#{} binding={} buffer=#{} {}..{}",
            self.id, binding, buffer_id(buffer.as_ref()), offset, offset + range
        ));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock render pass / framebuffer
// ============================================================================

pub struct MockRenderPass {
    /// Color attachment count per subpass
    color_attachments: Vec<u32>,
}

impl MockRenderPass {
    pub fn new(color_attachments: &[u32]) -> Arc<dyn RenderPass> {
        Arc::new(Self { color_attachments: color_attachments.to_vec() })
    }
}

impl RenderPass for MockRenderPass {
    fn subpass_count(&self) -> u32 {
        self.color_attachments.len() as u32
    }

    fn color_attachment_count(&self, subpass: u32) -> u32 {
        self.color_attachments.get(subpass as usize).copied().unwrap_or(0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockFramebuffer {
    extent: Extent2D,
    render_pass: Arc<dyn RenderPass>,
    pub invalidations: u32,
}

impl MockFramebuffer {
    pub fn new(width: u32, height: u32, render_pass: Arc<dyn RenderPass>) -> Self {
        Self { extent: Extent2D::new(width, height), render_pass, invalidations: 0 }
    }
}

impl Framebuffer for MockFramebuffer {
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
        self.invalidations += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock command encoder
// ============================================================================

pub struct MockEncoder {
    kind: CommandBufferKind,
    pub commands: Vec<String>,
}

impl MockEncoder {
    pub fn new(kind: CommandBufferKind) -> Self {
        Self { kind, commands: Vec::new() }
    }
}

/// Commands recorded so far by a mock-backed encoder
pub fn recorded(encoder: &dyn CommandEncoder) -> Vec<String> {
    encoder
        .as_any()
        .downcast_ref::<MockEncoder>()
        .map(|e| e.commands.clone())
        .unwrap_or_default()
}

impl CommandEncoder for MockEncoder {
    fn kind(&self) -> CommandBufferKind {
        self.kind
    }

    fn begin(&mut self, framebuffer: &dyn Framebuffer, subpass: u32) -> Result<()> {
        let extent = framebuffer.extent();
        self.commands.push(format!("begin {}x{} subpass={}", extent.width, extent.height, subpass));
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.commands.push("end".to_string());
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.commands.push(format!("set_viewport {}x{}", viewport.width, viewport.height));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.commands.push(format!(
            "set_scissor {},{} {}x{}", scissor.x, scissor.y, scissor.width, scissor.height
        ));
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn GraphicsPipeline) -> Result<()> {
        let id = pipeline.as_any().downcast_ref::<MockPipeline>().map_or(0, |p| p.id);
        self.commands.push(format!("bind_pipeline #{}", id));
        Ok(())
    }

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[(&Arc<dyn Buffer>, u64)]) -> Result<()> {
        let list: Vec<String> = buffers
            .iter()
            .map(|(b, offset)| format!("#{}@{}", buffer_id(b.as_ref()), offset))
            .collect();
        self.commands.push(format!("bind_vertex_buffers first={} [{}]", first_binding, list.join(", ")));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.commands.push(format!(
            "bind_index_buffer #{}@{} {:?}", buffer_id(buffer.as_ref()), offset, index_type
        ));
        Ok(())
    }

    fn bind_descriptor_set(&mut self, _layout: &dyn PipelineLayout, set_index: u32, set: &dyn DescriptorSet) -> Result<()> {
        let id = set.as_any().downcast_ref::<MockDescriptorSet>().map_or(0, |s| s.id);
        self.commands.push(format!("bind_descriptor_set set={} #{}", set_index, id));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.commands.push(format!("draw {} {} {} {}", vertex_count, instance_count, first_vertex, first_instance));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.commands.push(format!(
            "draw_indexed {} {} {} {} {}", index_count, instance_count, first_index, vertex_offset, first_instance
        ));
        Ok(())
    }

    fn append(&mut self, other: &mut dyn CommandEncoder) -> Result<()> {
        let other = other
            .as_any_mut()
            .downcast_mut::<MockEncoder>()
            .ok_or_else(|| Error::BackendError("Foreign encoder appended to mock encoder".to_string()))?;
        self.commands.append(&mut other.commands);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.commands.clear();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Mock present surface
// ============================================================================

/// Scripted behavior and observations of a `MockSurface`
#[derive(Default)]
pub struct SurfaceScript {
    /// Results returned by `acquire` before falling back to round-robin images
    pub acquire: VecDeque<AcquireResult>,
    /// Results returned by `present` before falling back to `Presented`
    pub present: VecDeque<PresentResult>,
    /// Extent applied by the next `rebuild`
    pub resize_to: Option<Extent2D>,
    /// Make the next `submit` fail with this native code
    pub fail_submit: Option<i32>,
    pub events: Vec<String>,
    /// Command stream of every submission
    pub submitted: Vec<Vec<String>>,
    pub rebuilds: u32,
}

pub struct MockSurface {
    frames_in_flight: u32,
    extent: Extent2D,
    render_pass: Arc<dyn RenderPass>,
    framebuffers: Vec<MockFramebuffer>,
    next_image: u32,
    script: Arc<Mutex<SurfaceScript>>,
}

impl MockSurface {
    pub fn new(frames_in_flight: u32, image_count: u32, extent: Extent2D) -> Self {
        let render_pass = MockRenderPass::new(&[1]);
        let framebuffers = (0..image_count)
            .map(|_| MockFramebuffer::new(extent.width, extent.height, Arc::clone(&render_pass)))
            .collect();
        Self {
            frames_in_flight,
            extent,
            render_pass,
            framebuffers,
            next_image: 0,
            script: Arc::new(Mutex::new(SurfaceScript::default())),
        }
    }

    pub fn script(&self) -> Arc<Mutex<SurfaceScript>> {
        Arc::clone(&self.script)
    }

    fn log(&self, event: String) {
        self.script.lock().unwrap().events.push(event);
    }
}

impl PresentSurface for MockSurface {
    fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
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
        self.framebuffers.get(image_index as usize).map(|f| f as &dyn Framebuffer)
    }

    fn wait_for_slot(&mut self, slot: u32) -> Result<()> {
        self.log(format!("wait slot={}", slot));
        Ok(())
    }

    fn acquire(&mut self, slot: u32) -> Result<AcquireResult> {
        let scripted = self.script.lock().unwrap().acquire.pop_front();
        let result = scripted.unwrap_or_else(|| {
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count().max(1);
            AcquireResult::Acquired { image_index, suboptimal: false }
        });
        self.log(format!("acquire slot={} -> {:?}", slot, result));
        Ok(result)
    }

    fn submit(&mut self, slot: u32, image_index: u32, encoder: &mut dyn CommandEncoder) -> Result<()> {
        let mut script = self.script.lock().unwrap();
        if let Some(code) = script.fail_submit.take() {
            return Err(Error::Native { operation: "submit queue".to_string(), code });
        }
        script.submitted.push(recorded(encoder));
        script.events.push(format!("submit slot={} image={}", slot, image_index));
        Ok(())
    }

    fn present(&mut self, slot: u32, image_index: u32) -> Result<PresentResult> {
        let mut script = self.script.lock().unwrap();
        let result = script.present.pop_front().unwrap_or(PresentResult::Presented);
        script.events.push(format!("present slot={} image={} -> {:?}", slot, image_index, result));
        Ok(result)
    }

    fn rebuild(&mut self) -> Result<()> {
        let resize = {
            let mut script = self.script.lock().unwrap();
            script.rebuilds += 1;
            script.events.push("rebuild".to_string());
            script.resize_to.take()
        };
        if let Some(extent) = resize {
            self.extent = extent;
        }
        self.render_pass = MockRenderPass::new(&[1]);
        let count = self.framebuffers.len();
        self.framebuffers = (0..count)
            .map(|_| MockFramebuffer::new(self.extent.width, self.extent.height, Arc::clone(&self.render_pass)))
            .collect();
        self.next_image = 0;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Shader files
// ============================================================================

static NEXT_SHADER_FILE: AtomicUsize = AtomicUsize::new(0);

/// Write a minimal SPIR-V binary (valid header) to a unique temp file
pub fn temp_spirv(tag: &str) -> PathBuf {
    let n = NEXT_SHADER_FILE.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!("lumen_rhi_{}_{}_{}.spv", std::process::id(), tag, n));
    let words = [SPIRV_MAGIC, 0x0001_0000, 0, 8, 0];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Vertex + fragment stage files for pipeline tests
pub fn temp_shader_pair() -> Vec<(ShaderStage, PathBuf)> {
    vec![
        (ShaderStage::Vertex, temp_spirv("vert")),
        (ShaderStage::Fragment, temp_spirv("frag")),
    ]
}
