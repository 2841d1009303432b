pub mod camera;
pub mod controls;
pub mod error;
pub mod light;
pub mod light_registry;
pub mod mesh;
pub mod scene;
pub mod texture;
pub mod transform;
