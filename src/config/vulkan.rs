use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use log::{error, info, warn};
use vulkano::device::physical::PhysicalDeviceType;
use vulkano::device::{Device, DeviceCreateInfo, DeviceExtensions, Queue, QueueCreateInfo};
use vulkano::format::Format;
use vulkano::image::view::ImageView;
use vulkano::image::{ImageUsage, SwapchainImage};
use vulkano::instance::{Instance, InstanceCreateInfo};
use vulkano::swapchain::{
    acquire_next_image, AcquireError, ColorSpace, Surface, Swapchain, SwapchainCreateInfo,
    SwapchainCreationError,
};
use vulkano::sync::{self, FlushError, GpuFuture};
use vulkano::VulkanLibrary;
use vulkano_win::VkSurfaceBuild;

use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

use super::input::Input;
use super::settings::ViewerConfig;
use crate::frame::scene_renderer::SceneRenderer;
use crate::scene_pkg::camera::Camera;
use crate::scene_pkg::controls::Controls;
use crate::scene_pkg::scene::{Projection, Scene, SceneCommand};
use crate::scene_pkg::texture::TextureBackend;
use crate::system::frame_sync::{required_uniforms, sync_frame};
use crate::system::gpu_texture::GpuTextureBackend;
use crate::system::model_draw_system::{FRAGMENT_SOURCE, VERTEX_SOURCE};
use crate::system::shader_program::ShaderProgram;

type SwapchainViews = Vec<Arc<ImageView<SwapchainImage<Window>>>>;

fn create_instance() -> anyhow::Result<Arc<Instance>> {
    let library = VulkanLibrary::new().context("no Vulkan library found")?;
    let required_extensions = vulkano_win::required_extensions(&library);
    let instance = Instance::new(
        library,
        InstanceCreateInfo {
            enabled_extensions: required_extensions,
            // Enable enumerating devices that use non-conformant vulkan implementations. (ex. MoltenVK)
            enumerate_portability: true,
            ..Default::default()
        },
    )?;
    Ok(instance)
}

fn create_surface(
    instance: Arc<Instance>,
    config: &ViewerConfig,
) -> anyhow::Result<(Arc<Surface<Window>>, EventLoop<()>)> {
    let event_loop = EventLoop::new();
    let surface = WindowBuilder::new()
        .with_title(&config.window.title)
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
        .build_vk_surface(&event_loop, instance)?;
    Ok((surface, event_loop))
}

fn create_device(
    surface: &Arc<Surface<Window>>,
    instance: &Arc<Instance>,
) -> anyhow::Result<(Arc<Device>, Arc<Queue>)> {
    // select best physical device
    let device_extensions = DeviceExtensions {
        khr_swapchain: true,
        ..DeviceExtensions::empty()
    };
    let (physical_device, queue_family_index) = instance
        .enumerate_physical_devices()?
        .filter(|p| p.supported_extensions().contains(&device_extensions))
        .filter_map(|p| {
            p.queue_family_properties()
                .iter()
                .enumerate()
                .position(|(i, q)| {
                    q.queue_flags.graphics && p.surface_support(i as u32, surface).unwrap_or(false)
                })
                .map(|i| (p, i as u32))
        })
        .min_by_key(|(p, _)| match p.properties().device_type {
            PhysicalDeviceType::DiscreteGpu => 0,
            PhysicalDeviceType::IntegratedGpu => 1,
            PhysicalDeviceType::VirtualGpu => 2,
            PhysicalDeviceType::Cpu => 3,
            PhysicalDeviceType::Other => 4,
        })
        .context("no Vulkan device can draw to this window")?;

    info!(
        "using device: {} (type: {:?})",
        physical_device.properties().device_name,
        physical_device.properties().device_type
    );

    let (device, mut queues) = Device::new(
        physical_device,
        DeviceCreateInfo {
            enabled_extensions: device_extensions,
            queue_create_infos: vec![QueueCreateInfo {
                queue_family_index,
                ..Default::default()
            }],
            ..Default::default()
        },
    )?;
    let queue = queues.next().context("device was created without a queue")?;
    Ok((device, queue))
}

fn create_swapchain(
    device: Arc<Device>,
    surface: Arc<Surface<Window>>,
) -> anyhow::Result<(Arc<Swapchain<Window>>, SwapchainViews)> {
    let surface_capabilities = device
        .physical_device()
        .surface_capabilities(&surface, Default::default())?;
    let formats = device
        .physical_device()
        .surface_formats(&surface, Default::default())?;
    let image_format = Some(swapchain_format(&formats).context("surface offers no 8-bit sRGB format")?);

    let (swapchain, images) = Swapchain::new(
        device.clone(),
        surface.clone(),
        SwapchainCreateInfo {
            min_image_count: surface_capabilities.min_image_count + 1,
            image_format,
            image_extent: surface.window().inner_size().into(),
            image_usage: ImageUsage {
                color_attachment: true,
                ..ImageUsage::empty()
            },
            composite_alpha: surface_capabilities
                .supported_composite_alpha
                .iter()
                .next()
                .context("surface supports no composite alpha mode")?,
            ..Default::default()
        },
    )?;
    Ok((swapchain, image_views(images)?))
}

/// The fragment shader writes linear color, so the swapchain image must be
/// one that applies the sRGB transfer function on store.
fn swapchain_format(formats: &[(Format, ColorSpace)]) -> Option<Format> {
    const SRGB_FORMATS: [Format; 3] = [
        Format::B8G8R8A8_SRGB,
        Format::R8G8B8A8_SRGB,
        Format::A8B8G8R8_SRGB_PACK32,
    ];
    formats
        .iter()
        .find(|(format, color_space)| {
            *color_space == ColorSpace::SrgbNonLinear && SRGB_FORMATS.contains(format)
        })
        .map(|(format, _)| *format)
}

fn image_views(images: Vec<Arc<SwapchainImage<Window>>>) -> anyhow::Result<SwapchainViews> {
    images
        .into_iter()
        .map(|image| ImageView::new_default(image).map_err(anyhow::Error::from))
        .collect()
}

/// Startup assets; a failure is reported like any other load and the viewer
/// starts without that asset.
fn load_initial_assets(scene: &mut Scene<GpuTextureBackend>, config: &ViewerConfig) {
    if let Some(model) = &config.scene.model {
        scene.apply(SceneCommand::ReplaceModel(model.clone())).ok();
    }
    for (slot, path) in config.scene.textures() {
        scene
            .apply(SceneCommand::ReplaceTexture(slot, path.to_path_buf()))
            .ok();
    }
}

/// The window title doubles as the status line: the last load failure if
/// there is one, otherwise the model, the control mode, the selected light and
/// the texture slot a dropped image would replace.
fn window_title<B: TextureBackend>(base: &str, scene: &Scene<B>, controls: &Controls) -> String {
    if let Some(message) = scene.diagnostic() {
        return format!("{} - {}", base, message);
    }
    let mut title = base.to_string();
    if let Some(path) = &scene.model.source {
        title.push_str(&format!(" - {}", path.display()));
    }
    title.push_str(&format!(" [{:?}", controls.mode));
    if let Some(handle) = scene.selected_light() {
        if let Some(index) = scene.lights.index_of(handle) {
            title.push_str(&format!(", {:?} light {}", handle.kind(), index));
        }
    }
    let target = controls.texture_target();
    match scene.textures.path(target) {
        Some(path) => title.push_str(&format!(", drop -> {:?} ({})]", target, path.display())),
        None => title.push_str(&format!(", drop -> {:?}]", target)),
    }
    title
}

pub fn vulkan_init(config: ViewerConfig) -> anyhow::Result<()> {
    // create instance
    let instance = create_instance()?;

    // create windows and surface to draw on
    let (surface, event_loop) = create_surface(instance.clone(), &config)?;

    // create device and queue
    let (device, queue) = create_device(&surface, &instance)?;

    // create swapchain and the images
    let (mut swapchain, mut images) = create_swapchain(device.clone(), surface.clone())?;

    let mut program = ShaderProgram::link(&[VERTEX_SOURCE, FRAGMENT_SOURCE], &required_uniforms())?;

    let camera = {
        let mut camera = Camera::new(
            config.camera.position(),
            config.camera.front(),
            config.camera.world_up(),
        )?;
        camera.mouse_sensitivity = config.camera.mouse_sensitivity;
        camera.movement_speed = config.camera.movement_speed;
        camera
    };
    let projection = Projection::new(
        config.projection.fov(),
        config.projection.near,
        config.projection.far,
        surface.window().inner_size().into(),
    );
    let mut scene = Scene::new(camera, projection, GpuTextureBackend::new(queue.clone())?);
    load_initial_assets(&mut scene, &config);

    let mut renderer = SceneRenderer::new(queue.clone(), swapchain.image_format())?;
    let mut controls = Controls::new(config.controls.clone());
    let mut input = Input::new();

    let mut recreate_swapchain = false;
    let mut previous_frame_end = Some(sync::now(device.clone()).boxed());
    let mut last_frame = Instant::now();
    let mut shown_title = String::new();

    event_loop.run(move |event, _, control_flow| {
        input.update(&event);
        match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                *control_flow = ControlFlow::Exit;
            }
            Event::WindowEvent {
                event: WindowEvent::Resized(_),
                ..
            } => {
                recreate_swapchain = true;
            }
            Event::RedrawEventsCleared => {
                let now = Instant::now();
                let delta_time = (now - last_frame).as_secs_f32();
                last_frame = now;

                let outcome = controls.process(&input.drain(), &mut scene, delta_time);
                if outcome.exit {
                    *control_flow = ControlFlow::Exit;
                    return;
                }

                let title = window_title(&config.window.title, &scene, &controls);
                if title != shown_title {
                    surface.window().set_title(&title);
                    shown_title = title;
                }

                let dimensions = surface.window().inner_size();
                if dimensions.width == 0 || dimensions.height == 0 {
                    return;
                }
                if let Some(previous) = previous_frame_end.as_mut() {
                    previous.cleanup_finished();
                }

                if recreate_swapchain {
                    let (new_swapchain, new_images) = match swapchain.recreate(SwapchainCreateInfo {
                        image_extent: dimensions.into(),
                        ..swapchain.create_info()
                    }) {
                        Ok(r) => r,
                        Err(SwapchainCreationError::ImageExtentNotSupported { .. }) => return,
                        Err(e) => {
                            error!("failed to recreate swapchain: {}", e);
                            *control_flow = ControlFlow::Exit;
                            return;
                        }
                    };
                    swapchain = new_swapchain;
                    images = match image_views(new_images) {
                        Ok(views) => views,
                        Err(e) => {
                            error!("{:#}", e);
                            *control_flow = ControlFlow::Exit;
                            return;
                        }
                    };
                    recreate_swapchain = false;
                }
                scene.projection.resize(dimensions.into());

                if let Err(e) = sync_frame(&mut scene, &mut program) {
                    error!("frame uniforms rejected: {}", e);
                    *control_flow = ControlFlow::Exit;
                    return;
                }

                let (image_num, suboptimal, acquire_future) =
                    match acquire_next_image(swapchain.clone(), None) {
                        Ok(r) => r,
                        Err(AcquireError::OutOfDate) => {
                            recreate_swapchain = true;
                            return;
                        }
                        Err(e) => {
                            error!("failed to acquire next image: {}", e);
                            *control_flow = ControlFlow::Exit;
                            return;
                        }
                    };

                if suboptimal {
                    recreate_swapchain = true;
                }

                let future = match previous_frame_end.take() {
                    Some(previous) => previous.join(acquire_future).boxed(),
                    None => acquire_future.boxed(),
                };

                let rendered = renderer
                    .begin_render_pass(images[image_num as usize].clone())
                    .and_then(|_| renderer.draw(&scene, &program))
                    .and_then(|_| renderer.end_render_pass(future));
                let rendered = match rendered {
                    Ok(rendered) => rendered,
                    Err(e) => {
                        error!("failed to record frame: {:#}", e);
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                };

                let future = rendered
                    .then_swapchain_present(queue.clone(), swapchain.clone(), image_num)
                    .then_signal_fence_and_flush();

                match future {
                    Ok(future) => {
                        previous_frame_end = Some(future.boxed());
                    }
                    Err(FlushError::OutOfDate) => {
                        recreate_swapchain = true;
                        previous_frame_end = Some(sync::now(device.clone()).boxed());
                    }
                    Err(e) => {
                        warn!("failed to flush future: {}", e);
                        previous_frame_end = Some(sync::now(device.clone()).boxed());
                    }
                }
            }
            _ => (),
        }
    });
}
