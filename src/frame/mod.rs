pub mod scene_renderer;
