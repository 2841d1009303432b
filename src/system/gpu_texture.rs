use std::sync::Arc;

use log::debug;
use vulkano::{
    device::Queue,
    format::Format,
    image::{view::ImageView, ImageDimensions, ImmutableImage, MipmapsCount},
    sampler::{Filter, Sampler, SamplerAddressMode, SamplerCreateInfo, SamplerMipmapMode, LOD_CLAMP_NONE},
    sync::GpuFuture,
};

use crate::scene_pkg::error::TextureError;
use crate::scene_pkg::texture::{DecodedImage, TextureBackend, TextureSlot};

pub type TextureView = Arc<ImageView<ImmutableImage>>;

/// Uploads material textures as mipmapped immutable images and keeps track
/// of which view sits on each of the five texture units.
pub struct GpuTextureBackend {
    gfx_queue: Arc<Queue>,
    sampler: Arc<Sampler>,
    placeholders: [TextureView; 5],
    bound: [Option<TextureView>; 5],
}

impl GpuTextureBackend {
    pub fn new(gfx_queue: Arc<Queue>) -> Result<GpuTextureBackend, TextureError> {
        let sampler = Sampler::new(
            gfx_queue.device().clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                mipmap_mode: SamplerMipmapMode::Linear,
                address_mode: [SamplerAddressMode::Repeat; 3],
                lod: 0.0..=LOD_CLAMP_NONE,
                ..Default::default()
            },
        )
        .map_err(|e| TextureError::Upload {
            slot: TextureSlot::Albedo,
            message: e.to_string(),
        })?;

        let neutral = |slot| upload(&gfx_queue, slot, &placeholder(slot), MipmapsCount::One);
        let placeholders = [
            neutral(TextureSlot::Albedo)?,
            neutral(TextureSlot::Normal)?,
            neutral(TextureSlot::Metallic)?,
            neutral(TextureSlot::Roughness)?,
            neutral(TextureSlot::AmbientOcclusion)?,
        ];

        Ok(GpuTextureBackend {
            gfx_queue,
            sampler,
            placeholders,
            bound: [None, None, None, None, None],
        })
    }

    pub fn sampler(&self) -> Arc<Sampler> {
        self.sampler.clone()
    }

    /// View on `unit`, or the slot's neutral 1x1 placeholder when nothing is bound.
    pub fn view(&self, unit: u32) -> TextureView {
        let unit = unit as usize;
        self.bound[unit]
            .clone()
            .unwrap_or_else(|| self.placeholders[unit].clone())
    }
}

impl TextureBackend for GpuTextureBackend {
    type Handle = TextureView;

    fn create(&mut self, slot: TextureSlot, image: &DecodedImage) -> Result<TextureView, TextureError> {
        upload(&self.gfx_queue, slot, image, MipmapsCount::Log2)
    }

    fn release(&mut self, handle: TextureView) {
        // the image itself goes away with its last reference, which may still
        // be held by an in-flight descriptor set
        for bound in self.bound.iter_mut() {
            if bound.as_ref().map_or(false, |view| Arc::ptr_eq(view, &handle)) {
                *bound = None;
            }
        }
        debug!("released texture view, {} references left", Arc::strong_count(&handle) - 1);
    }

    fn bind(&mut self, unit: u32, handle: Option<&TextureView>) {
        self.bound[unit as usize] = handle.cloned();
    }
}

fn upload(
    gfx_queue: &Arc<Queue>,
    slot: TextureSlot,
    image: &DecodedImage,
    mip_levels: MipmapsCount,
) -> Result<TextureView, TextureError> {
    let upload_error = |message: String| TextureError::Upload { slot, message };

    let dimensions = ImageDimensions::Dim2d {
        width: image.width,
        height: image.height,
        array_layers: 1,
    };
    let format = texture_format(slot, image.channels);
    let pixels = match format {
        Format::R8_UNORM => image.pixels.clone(),
        _ => image.to_rgba(),
    };

    let (texture, future) = ImmutableImage::from_iter(
        pixels,
        dimensions,
        mip_levels,
        format,
        gfx_queue.clone(),
    )
    .map_err(|e| upload_error(e.to_string()))?;

    future
        .then_signal_fence_and_flush()
        .map_err(|e| upload_error(e.to_string()))?
        .wait(None)
        .map_err(|e| upload_error(e.to_string()))?;

    ImageView::new_default(texture).map_err(|e| upload_error(e.to_string()))
}

/// The sampler decodes sRGB albedo to linear; the shader reads every map as
/// linear data. Grey albedo is expanded so it is not sampled as red.
fn texture_format(slot: TextureSlot, channels: u8) -> Format {
    match (channels, slot.is_srgb()) {
        (_, true) => Format::R8G8B8A8_SRGB,
        (1, false) => Format::R8_UNORM,
        (_, false) => Format::R8G8B8A8_UNORM,
    }
}

fn placeholder(slot: TextureSlot) -> DecodedImage {
    let pixels = match slot {
        TextureSlot::Normal => vec![128, 128, 255, 255],
        TextureSlot::Metallic => vec![0, 0, 0, 255],
        _ => vec![255, 255, 255, 255],
    };
    DecodedImage {
        width: 1,
        height: 1,
        channels: 4,
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::model_draw_system::FRAGMENT_SOURCE;

    #[test]
    fn only_albedo_is_uploaded_as_srgb() {
        assert_eq!(texture_format(TextureSlot::Albedo, 4), Format::R8G8B8A8_SRGB);
        assert_eq!(texture_format(TextureSlot::Albedo, 3), Format::R8G8B8A8_SRGB);
        assert_eq!(texture_format(TextureSlot::Albedo, 1), Format::R8G8B8A8_SRGB);
        assert_eq!(texture_format(TextureSlot::Normal, 3), Format::R8G8B8A8_UNORM);
        assert_eq!(texture_format(TextureSlot::Roughness, 1), Format::R8_UNORM);
    }

    #[test]
    fn fragment_shader_does_not_gamma_correct_again() {
        let code: String = FRAGMENT_SOURCE
            .lines()
            .map(|line| line.split("//").next().unwrap_or(""))
            .collect();
        assert!(code.contains("texture(albedoMap, v_uv).rgb;"));
        assert!(!code.contains("2.2"));
    }
}
