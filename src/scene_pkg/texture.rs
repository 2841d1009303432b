use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{error, info};

use super::error::TextureError;

/// The five material slots. Slot order is also the texture unit index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo,
    Normal,
    Metallic,
    Roughness,
    AmbientOcclusion,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 5] = [
        TextureSlot::Albedo,
        TextureSlot::Normal,
        TextureSlot::Metallic,
        TextureSlot::Roughness,
        TextureSlot::AmbientOcclusion,
    ];

    pub fn unit(self) -> u32 {
        self as u32
    }

    pub fn sampler_name(self) -> &'static str {
        match self {
            TextureSlot::Albedo => "albedoMap",
            TextureSlot::Normal => "normalMap",
            TextureSlot::Metallic => "metallicMap",
            TextureSlot::Roughness => "roughnessMap",
            TextureSlot::AmbientOcclusion => "aoMap",
        }
    }

    /// Albedo is authored in sRGB, the other maps hold linear data.
    pub fn is_srgb(self) -> bool {
        self == TextureSlot::Albedo
    }
}

/// Tightly packed 8-bit pixels, as produced by the image decoder.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn open(path: &Path) -> Result<DecodedImage, TextureError> {
        let image = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        DecodedImage::from_dynamic(path, image)
    }

    fn from_dynamic(path: &Path, image: DynamicImage) -> Result<DecodedImage, TextureError> {
        let (width, height) = (image.width(), image.height());
        let channels = image.color().channel_count();
        let pixels = match channels {
            1 => image.into_luma8().into_raw(),
            3 => image.into_rgb8().into_raw(),
            4 => image.into_rgba8().into_raw(),
            _ => {
                return Err(TextureError::UnsupportedChannels {
                    path: path.to_path_buf(),
                    channels,
                })
            }
        };
        Ok(DecodedImage {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// Expands to four channels; grey goes to RGB with opaque alpha.
    pub fn to_rgba(&self) -> Vec<u8> {
        match self.channels {
            4 => self.pixels.clone(),
            3 => self
                .pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            _ => self.pixels.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        }
    }
}

/// GPU side of a texture: creation, release and binding to a texture unit.
pub trait TextureBackend {
    type Handle;

    fn create(&mut self, slot: TextureSlot, image: &DecodedImage) -> Result<Self::Handle, TextureError>;

    fn release(&mut self, handle: Self::Handle);

    /// `None` unbinds the unit.
    fn bind(&mut self, unit: u32, handle: Option<&Self::Handle>);
}

struct LoadedTexture<H> {
    handle: H,
    path: PathBuf,
}

/// Five positional texture slots. A slot owns its GPU image; replacing it
/// releases the previous image exactly once.
pub struct TextureSlots<B: TextureBackend> {
    backend: B,
    slots: [Option<LoadedTexture<B::Handle>>; 5],
}

impl<B: TextureBackend> TextureSlots<B> {
    pub fn new(backend: B) -> TextureSlots<B> {
        TextureSlots {
            backend,
            slots: [None, None, None, None, None],
        }
    }

    /// Decodes and uploads `path` into `slot`. On any failure the slot keeps
    /// whatever it held before.
    pub fn load(&mut self, slot: TextureSlot, path: &Path) -> Result<(), TextureError> {
        let image = DecodedImage::open(path).map_err(|e| {
            error!("texture {:?} not replaced: {}", slot, e);
            e
        })?;
        self.replace(slot, path, &image)
    }

    pub fn replace(&mut self, slot: TextureSlot, path: &Path, image: &DecodedImage) -> Result<(), TextureError> {
        let handle = self.backend.create(slot, image)?;
        let loaded = LoadedTexture {
            handle,
            path: path.to_path_buf(),
        };
        if let Some(previous) = self.slots[slot.unit() as usize].replace(loaded) {
            self.backend.release(previous.handle);
        }
        info!(
            "loaded {:?} texture {} ({}x{}, {} channels)",
            slot,
            path.display(),
            image.width,
            image.height,
            image.channels
        );
        Ok(())
    }

    pub fn clear(&mut self, slot: TextureSlot) {
        if let Some(previous) = self.slots[slot.unit() as usize].take() {
            self.backend.release(previous.handle);
        }
    }

    pub fn is_filled(&self, slot: TextureSlot) -> bool {
        self.slots[slot.unit() as usize].is_some()
    }

    pub fn path(&self, slot: TextureSlot) -> Option<&Path> {
        self.slots[slot.unit() as usize]
            .as_ref()
            .map(|loaded| loaded.path.as_path())
    }

    /// Binds every slot to its fixed unit; empty slots are unbound.
    pub fn bind_all(&mut self) {
        for slot in TextureSlot::ALL {
            let handle = self.slots[slot.unit() as usize]
                .as_ref()
                .map(|loaded| &loaded.handle);
            self.backend.bind(slot.unit(), handle);
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: TextureBackend> Drop for TextureSlots<B> {
    fn drop(&mut self) {
        for slot in TextureSlot::ALL {
            self.clear(slot);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;

    /// Resource-tracking backend: counts releases per handle.
    #[derive(Clone, Default)]
    pub(crate) struct TrackingBackend {
        pub(crate) log: Rc<RefCell<TrackingLog>>,
        pub(crate) fail_next: bool,
    }

    #[derive(Default)]
    pub(crate) struct TrackingLog {
        pub(crate) created: u32,
        pub(crate) releases: HashMap<u32, u32>,
        pub(crate) bound: HashMap<u32, Option<u32>>,
    }

    impl TextureBackend for TrackingBackend {
        type Handle = u32;

        fn create(&mut self, slot: TextureSlot, _image: &DecodedImage) -> Result<u32, TextureError> {
            if self.fail_next {
                self.fail_next = false;
                return Err(TextureError::Upload {
                    slot,
                    message: "out of device memory".into(),
                });
            }
            let mut log = self.log.borrow_mut();
            log.created += 1;
            Ok(log.created)
        }

        fn release(&mut self, handle: u32) {
            *self.log.borrow_mut().releases.entry(handle).or_insert(0) += 1;
        }

        fn bind(&mut self, unit: u32, handle: Option<&u32>) {
            self.log.borrow_mut().bound.insert(unit, handle.copied());
        }
    }

    pub(crate) fn pixel() -> DecodedImage {
        DecodedImage {
            width: 1,
            height: 1,
            channels: 4,
            pixels: vec![255, 255, 255, 255],
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lumen-viewer-{}-{}", std::process::id(), name))
    }

    #[test]
    fn replacing_a_slot_releases_previous_image_once() {
        let backend = TrackingBackend::default();
        let log = backend.log.clone();
        let mut slots = TextureSlots::new(backend);

        slots.replace(TextureSlot::Albedo, Path::new("a.png"), &pixel()).unwrap();
        slots.replace(TextureSlot::Albedo, Path::new("b.png"), &pixel()).unwrap();
        slots.replace(TextureSlot::Albedo, Path::new("c.png"), &pixel()).unwrap();

        {
            let log = log.borrow();
            assert_eq!(log.created, 3);
            assert_eq!(log.releases.get(&1), Some(&1));
            assert_eq!(log.releases.get(&2), Some(&1));
            assert_eq!(log.releases.get(&3), None);
        }
        assert_eq!(slots.path(TextureSlot::Albedo), Some(Path::new("c.png")));

        drop(slots);
        assert_eq!(log.borrow().releases.get(&3), Some(&1));
        assert!(log.borrow().releases.values().all(|&count| count == 1));
    }

    #[test]
    fn failed_upload_keeps_previous_texture() {
        let backend = TrackingBackend::default();
        let log = backend.log.clone();
        let mut slots = TextureSlots::new(backend);
        slots.replace(TextureSlot::Normal, Path::new("old.png"), &pixel()).unwrap();

        slots.backend_mut().fail_next = true;
        let result = slots.replace(TextureSlot::Normal, Path::new("new.png"), &pixel());
        assert!(matches!(result, Err(TextureError::Upload { .. })));
        assert_eq!(slots.path(TextureSlot::Normal), Some(Path::new("old.png")));
        assert!(log.borrow().releases.is_empty());
    }

    #[test]
    fn two_channel_image_is_rejected_and_slot_kept() {
        let path = temp_path("gray-alpha.png");
        image::GrayAlphaImage::from_pixel(2, 2, image::LumaA([128, 255]))
            .save(&path)
            .unwrap();

        let backend = TrackingBackend::default();
        let mut slots = TextureSlots::new(backend);
        slots.replace(TextureSlot::Roughness, Path::new("kept.png"), &pixel()).unwrap();

        let result = slots.load(TextureSlot::Roughness, &path);
        assert!(matches!(
            result,
            Err(TextureError::UnsupportedChannels { channels: 2, .. })
        ));
        assert_eq!(slots.path(TextureSlot::Roughness), Some(Path::new("kept.png")));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn grey_image_decodes_to_one_channel() {
        let path = temp_path("gray.png");
        image::GrayImage::from_pixel(3, 2, image::Luma([7])).save(&path).unwrap();

        let decoded = DecodedImage::open(&path).unwrap();
        assert_eq!((decoded.width, decoded.height, decoded.channels), (3, 2, 1));
        assert_eq!(decoded.pixels.len(), 6);
        assert_eq!(&decoded.to_rgba()[..4], &[7, 7, 7, 255]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let mut slots = TextureSlots::new(TrackingBackend::default());
        let result = slots.load(TextureSlot::Metallic, Path::new("/definitely/not/here.png"));
        assert!(matches!(result, Err(TextureError::Decode { .. })));
        assert!(!slots.is_filled(TextureSlot::Metallic));
    }

    #[test]
    fn bind_all_uses_fixed_units() {
        let backend = TrackingBackend::default();
        let log = backend.log.clone();
        let mut slots = TextureSlots::new(backend);
        slots.replace(TextureSlot::Metallic, Path::new("m.png"), &pixel()).unwrap();
        slots.bind_all();

        let log = log.borrow();
        assert_eq!(log.bound.get(&2), Some(&Some(1)));
        assert_eq!(log.bound.get(&0), Some(&None));
        assert_eq!(log.bound.len(), 5);
    }
}
