pub mod mesh_converters;
