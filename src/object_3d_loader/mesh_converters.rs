use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use cgmath::{InnerSpace, Vector3};
use log::{debug, info, warn};

use crate::scene_pkg::mesh::{Mesh, Model, Normal, Uv, Vertex};

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid OBJ file {}: {source}", path.display())]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("invalid glTF file {}: {source}", path.display())]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("{}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },

    #[error("{} contains no faces", path.display())]
    Empty { path: PathBuf },

    #[error("{} is not an .obj, .gltf or .glb file", path.display())]
    UnsupportedFormat { path: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Obj,
    Gltf,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<ModelFormat> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "obj" => Some(ModelFormat::Obj),
            "gltf" | "glb" => Some(ModelFormat::Gltf),
            _ => None,
        }
    }
}

pub fn is_model_file(path: &Path) -> bool {
    ModelFormat::from_path(path).is_some()
}

/// Picks the importer from the file extension.
pub fn load_model(path: &Path) -> Result<Model, ModelLoadError> {
    let meshes = match ModelFormat::from_path(path) {
        Some(ModelFormat::Obj) => ObjFileToMeshConverter::new(path).create_meshes()?,
        Some(ModelFormat::Gltf) => GltfFileToMeshConverter::new(path).create_meshes()?,
        None => {
            return Err(ModelLoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };
    let model = Model::new(meshes, path);
    info!(
        "model {} loaded: {} meshes, {} vertices, {} triangles",
        path.display(),
        model.meshes.len(),
        model.vertex_count(),
        model.triangle_count()
    );
    Ok(model)
}

/// Reads Wavefront OBJ files. Each `o`/`g` group becomes one mesh; materials
/// are dropped.
pub struct ObjFileToMeshConverter {
    path: PathBuf,
}

impl ObjFileToMeshConverter {
    pub fn new(path: impl Into<PathBuf>) -> ObjFileToMeshConverter {
        ObjFileToMeshConverter { path: path.into() }
    }

    pub fn create_meshes(&self) -> Result<Vec<Mesh>, ModelLoadError> {
        let source = fs::read_to_string(&self.path).map_err(|source| ModelLoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.parse(&source)
    }

    pub fn parse(&self, source: &str) -> Result<Vec<Mesh>, ModelLoadError> {
        let source = pad_texcoords(source);
        let (models, _materials) = tobj::load_obj_buf(
            &mut Cursor::new(source.as_bytes()),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Ok(Default::default()),
        )
        .map_err(|source| ModelLoadError::Obj {
            path: self.path.clone(),
            source,
        })?;

        let mut meshes = vec![];
        for model in models {
            let mesh = model.mesh;
            if mesh.indices.is_empty() {
                debug!("{}: skipping empty group '{}'", self.path.display(), model.name);
                continue;
            }
            let positions: Vec<[f32; 3]> = mesh
                .positions
                .chunks_exact(3)
                .map(|p| [p[0], p[1], p[2]])
                .collect();
            let normals = (mesh.normals.len() == mesh.positions.len()).then(|| {
                mesh.normals
                    .chunks_exact(3)
                    .map(|n| [n[0], n[1], n[2]])
                    .collect()
            });
            // image rows run top to bottom
            let uvs = (mesh.texcoords.len() / 2 == positions.len()).then(|| {
                mesh.texcoords
                    .chunks_exact(2)
                    .map(|t| [t[0], 1.0 - t[1]])
                    .collect()
            });
            let mesh = build_mesh(model.name, positions, normals, uvs, mesh.indices)
                .map_err(|message| self.invalid(message))?;
            meshes.push(mesh);
        }

        if meshes.is_empty() {
            return Err(ModelLoadError::Empty {
                path: self.path.clone(),
            });
        }
        Ok(meshes)
    }

    fn invalid(&self, message: String) -> ModelLoadError {
        ModelLoadError::Invalid {
            path: self.path.clone(),
            message,
        }
    }
}

/// Reads glTF 2.0 (`.gltf` with external or embedded buffers, and `.glb`).
/// Every triangle primitive becomes one mesh; node transforms and materials
/// are dropped.
pub struct GltfFileToMeshConverter {
    path: PathBuf,
}

impl GltfFileToMeshConverter {
    pub fn new(path: impl Into<PathBuf>) -> GltfFileToMeshConverter {
        GltfFileToMeshConverter { path: path.into() }
    }

    pub fn create_meshes(&self) -> Result<Vec<Mesh>, ModelLoadError> {
        let (document, buffers, _images) =
            gltf::import(&self.path).map_err(|source| ModelLoadError::Gltf {
                path: self.path.clone(),
                source,
            })?;

        let mut meshes = vec![];
        for mesh in document.meshes() {
            let name = mesh
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("mesh{}", mesh.index()));
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    warn!("{}: skipping {:?} primitive of '{}'", self.path.display(), primitive.mode(), name);
                    continue;
                }
                let reader =
                    primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
                let positions: Vec<[f32; 3]> = match reader.read_positions() {
                    Some(positions) => positions.collect(),
                    None => {
                        warn!("{}: primitive of '{}' has no positions", self.path.display(), name);
                        continue;
                    }
                };
                let normals = reader.read_normals().map(|normals| normals.collect());
                let uvs = reader.read_tex_coords(0).map(|uvs| uvs.into_f32().collect());
                let indices = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..positions.len() as u32).collect(),
                };
                let mesh = build_mesh(name.clone(), positions, normals, uvs, indices).map_err(|message| {
                    ModelLoadError::Invalid {
                        path: self.path.clone(),
                        message,
                    }
                })?;
                meshes.push(mesh);
            }
        }

        if meshes.is_empty() {
            return Err(ModelLoadError::Empty {
                path: self.path.clone(),
            });
        }
        Ok(meshes)
    }
}

/// `vt u` is legal OBJ; the parser wants two components.
fn pad_texcoords(source: &str) -> String {
    let mut padded = String::with_capacity(source.len());
    for line in source.lines() {
        let mut words = line.split_whitespace();
        padded.push_str(line);
        if words.next() == Some("vt") && words.count() == 1 {
            padded.push_str(" 0");
        }
        padded.push('\n');
    }
    padded
}

fn build_mesh(
    name: String,
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    uvs: Option<Vec<[f32; 2]>>,
    indices: Vec<u32>,
) -> Result<Mesh, String> {
    if indices.len() % 3 != 0 {
        return Err(format!("'{}' has {} indices, not a triangle list", name, indices.len()));
    }
    if let Some(index) = indices.iter().find(|&&index| index as usize >= positions.len()) {
        return Err(format!(
            "'{}' index {} out of range for {} vertices",
            name,
            index,
            positions.len()
        ));
    }
    let uvs = uvs.unwrap_or_else(|| vec![[0.0; 2]; positions.len()]);

    match normals {
        Some(normals) => Ok(Mesh {
            name,
            vertices: positions.into_iter().map(|position| Vertex { position }).collect(),
            normals: normals.into_iter().map(|normal| Normal { normal }).collect(),
            uvs: uvs.into_iter().map(|uv| Uv { uv }).collect(),
            indices,
        }),
        None => Ok(flat_shaded(name, &positions, &uvs, &indices)),
    }
}

/// Without normals every triangle gets its own corners carrying the face normal.
fn flat_shaded(name: String, positions: &[[f32; 3]], uvs: &[[f32; 2]], indices: &[u32]) -> Mesh {
    let mut mesh = Mesh {
        name,
        ..Default::default()
    };
    for triangle in indices.chunks_exact(3) {
        let corner = |i: usize| Vector3::from(positions[triangle[i] as usize]);
        let cross = (corner(1) - corner(0)).cross(corner(2) - corner(0));
        let normal = if cross.magnitude2() > 0.0 {
            cross.normalize()
        } else {
            Vector3::unit_y()
        };
        for &index in triangle {
            mesh.indices.push(mesh.vertices.len() as u32);
            mesh.vertices.push(Vertex {
                position: positions[index as usize],
            });
            mesh.normals.push(Normal { normal: normal.into() });
            mesh.uvs.push(Uv {
                uv: uvs[index as usize],
            });
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> ObjFileToMeshConverter {
        ObjFileToMeshConverter::new("test.obj")
    }

    const QUAD: &str = "
# a unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quad_is_fan_triangulated_with_shared_corners() {
        let meshes = converter().parse(QUAD).unwrap();
        assert_eq!(meshes.len(), 1);
        let mesh = &meshes[0];
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.uvs[2].uv, [1.0, 0.0]);
        assert_eq!(mesh.normals[3].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn groups_become_separate_meshes() {
        let source = "
v 0 0 0
v 1 0 0
v 0 1 0
o first
f 1 2 3
o second
f -3 -2 -1
g empty
";
        let meshes = converter().parse(source).unwrap();
        let names: Vec<&str> = meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(meshes[1].indices.len(), 3);
    }

    #[test]
    fn missing_normals_get_face_normal() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let meshes = converter().parse(source).unwrap();
        for normal in &meshes[0].normals {
            assert_eq!(normal.normal, [0.0, 0.0, 1.0]);
        }
        assert_eq!(meshes[0].uvs[0].uv, [0.0, 0.0]);
    }

    #[test]
    fn single_component_texcoords_are_accepted() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.25\nf 1/1 2/1 3/1\n";
        let meshes = converter().parse(source).unwrap();
        assert_eq!(meshes[0].uvs[1].uv, [0.25, 1.0]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let source = "v 0 0 0\nv 1 0 0\nf 1 2 3\n";
        assert!(matches!(
            converter().parse(source),
            Err(ModelLoadError::Obj { .. }) | Err(ModelLoadError::Invalid { .. })
        ));
    }

    #[test]
    fn malformed_number_is_rejected() {
        let result = converter().parse("v 0 zero 0\n");
        assert!(matches!(result, Err(ModelLoadError::Obj { .. })));
    }

    #[test]
    fn file_without_faces_is_empty() {
        let result = converter().parse("v 0 0 0\n");
        assert!(matches!(result, Err(ModelLoadError::Empty { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_model(Path::new("/no/such/model.obj"));
        assert!(matches!(result, Err(ModelLoadError::Io { .. })));
    }

    #[test]
    fn formats_follow_the_extension() {
        assert_eq!(ModelFormat::from_path(Path::new("bust.OBJ")), Some(ModelFormat::Obj));
        assert_eq!(ModelFormat::from_path(Path::new("bust.glb")), Some(ModelFormat::Gltf));
        assert_eq!(ModelFormat::from_path(Path::new("scene.gltf")), Some(ModelFormat::Gltf));
        assert!(!is_model_file(Path::new("albedo.png")));
        assert!(matches!(
            load_model(Path::new("bust.fbx")),
            Err(ModelLoadError::UnsupportedFormat { .. })
        ));
    }

    // one triangle at (0,0,0) (1,0,0) (0,1,0), no normals and no indices
    const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "buffers": [{
    "byteLength": 36,
    "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
  }],
  "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
  "accessors": [{
    "bufferView": 0,
    "componentType": 5126,
    "count": 3,
    "type": "VEC3",
    "min": [0.0, 0.0, 0.0],
    "max": [1.0, 1.0, 0.0]
  }],
  "meshes": [{ "name": "tri", "primitives": [{ "attributes": { "POSITION": 0 } }] }],
  "nodes": [{ "mesh": 0 }],
  "scenes": [{ "nodes": [0] }],
  "scene": 0
}"#;

    #[test]
    fn gltf_triangle_is_imported_with_face_normals() {
        let path = std::env::temp_dir().join(format!("lumen-triangle-{}.gltf", std::process::id()));
        fs::write(&path, TRIANGLE_GLTF).unwrap();

        let model = load_model(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.name, "tri");
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.normals[2].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_gltf_is_reported() {
        let result = load_model(Path::new("/no/such/model.gltf"));
        assert!(matches!(result, Err(ModelLoadError::Gltf { .. })));
    }
}
