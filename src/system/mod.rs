pub mod error;
pub mod frame_sync;
pub mod gpu_texture;
pub mod model_draw_system;
pub mod shader_program;
pub mod uniform_layout;
