pub mod input;
pub mod settings;
pub mod vulkan;
