use {
    glam::{Vec2, Vec3, Vec4},
    serde::{Deserialize, Serialize},
    std::{
        hash::{Hash, Hasher},
        path::PathBuf,
    },
};

/// Componentwise tolerance under which two vertices compare equal.
pub const VERTEX_EPSILON: f32 = 1e-6;

/// Quantization scale for vertex hashing and ordering. Components within
/// `1e-5` of each other on every axis collapse to the same key.
const QUANT_SCALE: f64 = 1e5;

/// A single mesh vertex.
///
/// The tangent's xyz is the tangent direction; w stores the ±1 handedness
/// which restores the bitangent as `cross(normal, tangent) * w`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec4,
}

impl Vertex {
    fn components(&self) -> [f32; 12] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.normal.x,
            self.normal.y,
            self.normal.z,
            self.uv.x,
            self.uv.y,
            self.tangent.x,
            self.tangent.y,
            self.tangent.z,
            self.tangent.w,
        ]
    }

    /// Approximate equality over all twelve float components.
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.components()
            .iter()
            .zip(other.components())
            .all(|(a, b)| (a - b).abs() < VERTEX_EPSILON)
    }

    /// The quantized form of this vertex, usable as a hash-map or sort key.
    ///
    /// Bitwise float comparison silently fragments meshes; every map or sort
    /// over vertices must go through this key instead.
    pub fn key(&self) -> VertexKey {
        VertexKey(self.components().map(quantize))
    }
}

fn quantize(value: f32) -> i64 {
    (value as f64 * QUANT_SCALE).round() as i64
}

/// Quantized image of a [`Vertex`]: all twelve components multiplied by
/// `1e5` and rounded to the nearest integer.
///
/// Ordering is lexicographic over the quantized components.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct VertexKey([i64; 12]);

impl Hash for VertexKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut h = 0u64;
        for &q in &self.0 {
            h ^= (q as u64)
                .wrapping_add(0x9e37_79b9)
                .wrapping_add(h << 6)
                .wrapping_add(h >> 2);
        }

        state.write_u64(h);
    }
}

/// An indexed triangle list with a name, a material reference, and a detail
/// level.
///
/// Every index is 0-based and strictly less than `vertices.len()`; triangles
/// are exactly three consecutive indices.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Mesh {
    /// Artist-provided object name from the `o` directive.
    pub name: String,

    /// Name of the active material from the last `usemtl` directive.
    pub material: String,

    /// Detail level this mesh belongs to; 0 is the base asset.
    pub lod_level: u32,

    /// Dense per-file mesh index, assigned in source order starting at 0.
    pub number: u32,

    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Texture-map filenames gathered from one `newmtl` block.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Material {
    pub name: String,

    /// `map_Kd` entries.
    pub diffuse_maps: Vec<String>,

    /// `map_Ks` and `map_Ns` entries.
    pub specular_maps: Vec<String>,

    /// `map_Bump` and `bump` entries.
    pub normal_maps: Vec<String>,

    /// `disp` entries.
    pub height_maps: Vec<String>,

    /// Set when any observed UV range for this material exceeds 1.0 in
    /// either axis.
    pub is_tiled: bool,
}

/// The meshes and materials of a single detail level.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ModelLod {
    pub level: u32,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
}

/// A fully loaded asset: one entry per detail level, plus the optional
/// per-LOD combined meshes when the load requested them.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Model {
    pub path: PathBuf,
    pub lods: Vec<ModelLod>,
    pub combined: Option<Vec<Mesh>>,
}

impl Model {
    /// Gets the detail level with the given number, if one was loaded.
    pub fn lod(&self, level: u32) -> Option<&ModelLod> {
        self.lods.iter().find(|lod| lod.level == level)
    }

    pub fn mesh_count(&self) -> usize {
        self.lods.iter().map(|lod| lod.meshes.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{Vertex, VertexKey},
        glam::{Vec2, Vec3, Vec4},
        std::collections::HashMap,
    };

    fn vertex(position: [f32; 3]) -> Vertex {
        Vertex {
            position: Vec3::from_array(position),
            normal: Vec3::ZERO,
            uv: Vec2::ZERO,
            tangent: Vec4::ZERO,
        }
    }

    #[test]
    fn keys_collapse_near_duplicates() {
        let a = vertex([1.0, 2.0, 3.0]);
        let b = vertex([1.000_001, 2.0, 3.0]);

        assert_eq!(a.key(), b.key());
        assert!(a.approx_eq(&b));
    }

    #[test]
    fn keys_separate_distinct_vertices() {
        let a = vertex([1.0, 2.0, 3.0]);
        let b = vertex([1.001, 2.0, 3.0]);

        assert_ne!(a.key(), b.key());
        assert!(!a.approx_eq(&b));
    }

    #[test]
    fn key_ordering_is_lexicographic() {
        let mut keys: Vec<VertexKey> = [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.5]]
            .into_iter()
            .map(|p| vertex(p).key())
            .collect();
        keys.sort();

        assert_eq!(keys[0], vertex([0.0, 0.0, 0.5]).key());
        assert_eq!(keys[2], vertex([0.0, 1.0, 0.0]).key());
    }

    #[test]
    fn keys_work_as_map_keys() {
        let mut map = HashMap::new();
        map.insert(vertex([1.0, 2.0, 3.0]).key(), 0u32);

        assert!(map.contains_key(&vertex([1.000_001, 2.0, 3.0]).key()));
        assert!(!map.contains_key(&vertex([4.0, 5.0, 6.0]).key()));
    }
}
