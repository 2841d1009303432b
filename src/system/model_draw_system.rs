use std::sync::Arc;

use anyhow::Context;
use log::{debug, info};
use vulkano::{
    buffer::{BufferUsage, CpuAccessibleBuffer, TypedBufferAccess},
    command_buffer::{
        AutoCommandBufferBuilder, CommandBufferInheritanceInfo, CommandBufferUsage,
        SecondaryAutoCommandBuffer,
    },
    descriptor_set::{PersistentDescriptorSet, WriteDescriptorSet},
    device::{Device, Queue},
    pipeline::{
        graphics::{
            depth_stencil::DepthStencilState,
            input_assembly::InputAssemblyState,
            vertex_input::BuffersDefinition,
            viewport::{Viewport, ViewportState},
        },
        GraphicsPipeline, Pipeline, PipelineBindPoint,
    },
    render_pass::Subpass,
};

use super::gpu_texture::GpuTextureBackend;
use super::shader_program::ShaderProgram;
use crate::scene_pkg::mesh::{Mesh, Model, Normal, Uv, Vertex};
use crate::scene_pkg::texture::TextureSlot;

/// GLSL sources of the model pipeline, for uniform interface introspection.
pub const VERTEX_SOURCE: &str = include_str!("../../shaders/model.vert");
pub const FRAGMENT_SOURCE: &str = include_str!("../../shaders/model.frag");

struct MeshBuffers {
    vertex_buffer: Arc<CpuAccessibleBuffer<[Vertex]>>,
    normals_buffer: Arc<CpuAccessibleBuffer<[Normal]>>,
    uv_buffer: Arc<CpuAccessibleBuffer<[Uv]>>,
    index_buffer: Arc<CpuAccessibleBuffer<[u32]>>,
}

impl MeshBuffers {
    fn new(device: &Arc<Device>, mesh: &Mesh) -> anyhow::Result<MeshBuffers> {
        let vertex_usage = BufferUsage {
            vertex_buffer: true,
            ..BufferUsage::empty()
        };
        let vertex_buffer =
            CpuAccessibleBuffer::from_iter(device.clone(), vertex_usage, false, mesh.vertices.iter().copied())
                .context("failed to create vertex buffer")?;
        let normals_buffer =
            CpuAccessibleBuffer::from_iter(device.clone(), vertex_usage, false, mesh.normals.iter().copied())
                .context("failed to create normal buffer")?;
        let uv_buffer =
            CpuAccessibleBuffer::from_iter(device.clone(), vertex_usage, false, mesh.uvs.iter().copied())
                .context("failed to create uv buffer")?;
        let index_buffer = CpuAccessibleBuffer::from_iter(
            device.clone(),
            BufferUsage {
                index_buffer: true,
                ..BufferUsage::empty()
            },
            false,
            mesh.indices.iter().copied(),
        )
        .context("failed to create index buffer")?;

        Ok(MeshBuffers {
            vertex_buffer,
            normals_buffer,
            uv_buffer,
            index_buffer,
        })
    }
}

/// Draws every mesh of the current model with the forward PBR pipeline.
pub struct ModelDrawSystem {
    gfx_queue: Arc<Queue>,
    subpass: Subpass,
    pipeline: Arc<GraphicsPipeline>,
    meshes: Vec<MeshBuffers>,
    // model revision the buffers were built from
    revision: Option<u64>,
}

impl ModelDrawSystem {
    pub fn new(gfx_queue: Arc<Queue>, subpass: Subpass) -> anyhow::Result<ModelDrawSystem> {
        let pipeline = {
            let vs = vs::load(gfx_queue.device().clone()).context("failed to create vertex shader module")?;
            let fs = fs::load(gfx_queue.device().clone()).context("failed to create fragment shader module")?;

            GraphicsPipeline::start()
                .vertex_input_state(
                    BuffersDefinition::new()
                        .vertex::<Vertex>()
                        .vertex::<Normal>()
                        .vertex::<Uv>(),
                )
                .vertex_shader(vs.entry_point("main").context("vertex shader has no main")?, ())
                .input_assembly_state(InputAssemblyState::new())
                .viewport_state(ViewportState::viewport_dynamic_scissor_irrelevant())
                .fragment_shader(fs.entry_point("main").context("fragment shader has no main")?, ())
                .depth_stencil_state(DepthStencilState::simple_depth_test())
                .render_pass(subpass.clone())
                .build(gfx_queue.device().clone())
                .context("failed to build model pipeline")?
        };

        Ok(ModelDrawSystem {
            gfx_queue,
            subpass,
            pipeline,
            meshes: vec![],
            revision: None,
        })
    }

    /// Re-uploads the geometry when the model has been replaced since the
    /// last call; the previous buffers are dropped.
    pub fn sync_model(&mut self, model: &Model) -> anyhow::Result<()> {
        if self.revision == Some(model.revision()) {
            return Ok(());
        }
        let device = self.gfx_queue.device().clone();
        self.meshes = model
            .meshes
            .iter()
            .filter(|mesh| !mesh.indices.is_empty())
            .map(|mesh| MeshBuffers::new(&device, mesh))
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.revision = Some(model.revision());
        info!("uploaded {} meshes for model revision {}", self.meshes.len(), model.revision());
        Ok(())
    }

    /// Builds a secondary command buffer that draws the model on the current subpass.
    pub fn draw(
        &self,
        viewport_dimensions: [u32; 2],
        program: &ShaderProgram,
        textures: &GpuTextureBackend,
    ) -> anyhow::Result<SecondaryAutoCommandBuffer> {
        let uniform_buffer = CpuAccessibleBuffer::from_iter(
            self.gfx_queue.device().clone(),
            BufferUsage {
                uniform_buffer: true,
                ..BufferUsage::empty()
            },
            false,
            program.block_bytes().iter().copied(),
        )
        .context("failed to create uniform buffer")?;

        let mut writes = vec![WriteDescriptorSet::buffer(
            program.interface().block_binding.unwrap_or(0),
            uniform_buffer,
        )];
        for slot in TextureSlot::ALL {
            let binding = match program.interface().samplers.get(slot.sampler_name()) {
                Some(binding) => *binding,
                None => continue,
            };
            // units without a sampler assignment this frame read the placeholder
            let unit = program.sampler_units().get(&binding).copied().unwrap_or(slot.unit());
            writes.push(WriteDescriptorSet::image_view_sampler(
                binding,
                textures.view(unit),
                textures.sampler(),
            ));
        }

        let layout = self
            .pipeline
            .layout()
            .set_layouts()
            .get(0)
            .context("model pipeline has no descriptor set 0")?;
        let set = PersistentDescriptorSet::new(layout.clone(), writes)
            .context("failed to create descriptor set")?;

        let mut builder = AutoCommandBufferBuilder::secondary(
            self.gfx_queue.device().clone(),
            self.gfx_queue.queue_family_index(),
            CommandBufferUsage::MultipleSubmit,
            CommandBufferInheritanceInfo {
                render_pass: Some(self.subpass.clone().into()),
                ..Default::default()
            },
        )?;
        builder
            .set_viewport(
                0,
                [Viewport {
                    origin: [0.0, 0.0],
                    dimensions: [viewport_dimensions[0] as f32, viewport_dimensions[1] as f32],
                    depth_range: 0.0..1.0,
                }],
            )
            .bind_pipeline_graphics(self.pipeline.clone())
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                self.pipeline.layout().clone(),
                0,
                set,
            );

        for mesh in &self.meshes {
            builder
                .bind_vertex_buffers(
                    0,
                    (
                        mesh.vertex_buffer.clone(),
                        mesh.normals_buffer.clone(),
                        mesh.uv_buffer.clone(),
                    ),
                )
                .bind_index_buffer(mesh.index_buffer.clone())
                .draw_indexed(mesh.index_buffer.len() as u32, 1, 0, 0, 0)?;
        }
        debug!("recorded {} mesh draws", self.meshes.len());
        Ok(builder.build()?)
    }
}

mod vs {
    vulkano_shaders::shader! {
        ty: "vertex",
        path: "shaders/model.vert"
    }
}

mod fs {
    vulkano_shaders::shader! {
        ty: "fragment",
        path: "shaders/model.frag"
    }
}
