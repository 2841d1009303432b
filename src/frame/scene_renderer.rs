use std::sync::Arc;

use anyhow::Context;
use vulkano::{
    command_buffer::{
        AutoCommandBufferBuilder, CommandBufferExecFuture, CommandBufferUsage,
        PrimaryAutoCommandBuffer, RenderPassBeginInfo, SubpassContents,
    },
    device::Queue,
    format::Format,
    image::{view::ImageView, AttachmentImage, ImageAccess, ImageViewAbstract},
    render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass, Subpass},
    sync::GpuFuture,
};

use crate::scene_pkg::scene::Scene;
use crate::system::gpu_texture::GpuTextureBackend;
use crate::system::model_draw_system::ModelDrawSystem;
use crate::system::shader_program::ShaderProgram;

/// Single forward pass: the model is shaded straight into the swapchain
/// image, with a depth buffer that follows the image size.
pub struct SceneRenderer {
    gfx_queue: Arc<Queue>,
    render_pass: Arc<RenderPass>,
    model_draw_system: ModelDrawSystem,

    depth_image: Option<Arc<ImageView<AttachmentImage>>>,
    framebuffer: Option<Arc<Framebuffer>>,
    command_buffer_builder: Option<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>>,
}

impl SceneRenderer {
    pub fn new(gfx_queue: Arc<Queue>, final_output_format: Format) -> anyhow::Result<SceneRenderer> {
        let render_pass = vulkano::ordered_passes_renderpass!(gfx_queue.device().clone(),
            attachments: {
                final_color: {
                    load: Clear,
                    store: Store,
                    format: final_output_format,
                    samples: 1,
                },
                depth: {
                    load: Clear,
                    store: DontCare,
                    format: Format::D16_UNORM,
                    samples: 1,
                }
            },
            passes: [
                {
                    color: [final_color],
                    depth_stencil: {depth},
                    input: []
                }
            ]
        )
        .context("failed to create render pass")?;

        let subpass = Subpass::from(render_pass.clone(), 0).context("render pass has no subpass 0")?;
        let model_draw_system = ModelDrawSystem::new(gfx_queue.clone(), subpass)?;

        Ok(SceneRenderer {
            gfx_queue,
            render_pass,
            model_draw_system,
            depth_image: None,
            framebuffer: None,
            command_buffer_builder: None,
        })
    }

    pub fn begin_render_pass(&mut self, final_image: Arc<dyn ImageViewAbstract + 'static>) -> anyhow::Result<()> {
        let dimensions = final_image.image().dimensions().width_height();
        let depth_image = match &self.depth_image {
            Some(depth) if depth.image().dimensions().width_height() == dimensions => depth.clone(),
            _ => {
                let depth = ImageView::new_default(AttachmentImage::transient(
                    self.gfx_queue.device().clone(),
                    dimensions,
                    Format::D16_UNORM,
                )?)?;
                self.depth_image = Some(depth.clone());
                depth
            }
        };

        let framebuffer = Framebuffer::new(
            self.render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![final_image, depth_image as Arc<dyn ImageViewAbstract>],
                ..Default::default()
            },
        )?;

        let mut command_buffer_builder = AutoCommandBufferBuilder::primary(
            self.gfx_queue.device().clone(),
            self.gfx_queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )?;
        command_buffer_builder.begin_render_pass(
            RenderPassBeginInfo {
                clear_values: vec![Some([0.1, 0.1, 0.12, 1.0].into()), Some(1.0f32.into())],
                ..RenderPassBeginInfo::framebuffer(framebuffer.clone())
            },
            SubpassContents::SecondaryCommandBuffers,
        )?;
        self.framebuffer = Some(framebuffer);
        self.command_buffer_builder = Some(command_buffer_builder);
        Ok(())
    }

    /// Records the model draw using the uniform block already written into `program`.
    pub fn draw(&mut self, scene: &Scene<GpuTextureBackend>, program: &ShaderProgram) -> anyhow::Result<()> {
        let extent = self
            .framebuffer
            .as_ref()
            .context("draw called outside of a render pass")?
            .extent();
        self.model_draw_system.sync_model(&scene.model)?;
        let command_buffer = self
            .model_draw_system
            .draw(extent, program, scene.textures.backend())?;
        self.command_buffer_builder
            .as_mut()
            .context("draw called outside of a render pass")?
            .execute_commands(command_buffer)?;
        Ok(())
    }

    pub fn end_render_pass<F: GpuFuture + 'static>(
        &mut self,
        future: F,
    ) -> anyhow::Result<CommandBufferExecFuture<F, PrimaryAutoCommandBuffer>> {
        let mut builder = self
            .command_buffer_builder
            .take()
            .context("end_render_pass without begin_render_pass")?;
        builder.end_render_pass()?;
        let command_buffer = builder.build()?;
        Ok(future.then_execute(self.gfx_queue.clone(), command_buffer)?)
    }
}
