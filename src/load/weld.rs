use {crate::model::Mesh, std::collections::HashMap};

/// Collapses vertices whose quantized attributes are identical, rewriting
/// the index list in place.
///
/// The walk follows the existing indices in order, so the first occurrence
/// of each equivalence class keeps its original (unquantized) attributes and
/// triangle orientation is preserved. The rebuilt index list has the same
/// length as the original.
pub(crate) fn join_identical(mesh: &mut Mesh) {
    let mut remap = HashMap::with_capacity(mesh.vertices.len());
    let mut vertices = Vec::with_capacity(mesh.vertices.len());
    let mut indices = Vec::with_capacity(mesh.indices.len());

    for &index in &mesh.indices {
        let vertex = mesh.vertices[index as usize];
        let slot = *remap.entry(vertex.key()).or_insert_with(|| {
            vertices.push(vertex);

            (vertices.len() - 1) as u32
        });
        indices.push(slot);
    }

    mesh.vertices = vertices;
    mesh.indices = indices;
}

/// Concatenates a detail level's meshes into one draw-call-friendly mesh,
/// offsetting each source's indices by the running base-vertex count.
///
/// Name, material, and numbering come from the first source mesh. Returns
/// `None` for a level with no meshes.
pub(crate) fn combine(meshes: &[Mesh]) -> Option<Mesh> {
    let first = meshes.first()?;
    let mut combined = Mesh {
        name: first.name.clone(),
        material: first.material.clone(),
        lod_level: first.lod_level,
        number: first.number,
        vertices: Vec::with_capacity(meshes.iter().map(|mesh| mesh.vertices.len()).sum()),
        indices: Vec::with_capacity(meshes.iter().map(|mesh| mesh.indices.len()).sum()),
    };

    for mesh in meshes {
        let base = combined.vertices.len() as u32;
        combined.vertices.extend_from_slice(&mesh.vertices);
        combined
            .indices
            .extend(mesh.indices.iter().map(|index| index + base));
    }

    Some(combined)
}

#[cfg(test)]
mod tests {
    use {
        super::{combine, join_identical},
        crate::model::{Mesh, Vertex},
        glam::{Vec2, Vec3, Vec4},
    };

    fn soup(positions: &[[f32; 3]]) -> Mesh {
        Mesh {
            vertices: positions
                .iter()
                .map(|&position| Vertex {
                    position: Vec3::from_array(position),
                    normal: Vec3::ZERO,
                    uv: Vec2::ZERO,
                    tangent: Vec4::ZERO,
                })
                .collect(),
            indices: (0..positions.len() as u32).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn duplicates_collapse_and_topology_survives() {
        // Two triangles sharing the (1,0,0)-(0,1,0) edge
        let mut mesh = soup(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]);
        join_identical(&mut mesh);

        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, [0, 1, 2, 1, 3, 2]);
    }

    #[test]
    fn near_duplicates_merge_within_tolerance() {
        let mut mesh = soup(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            // Within 1e-6 of the first vertex
            [0.000_000_4, 0.0, 0.0],
        ]);
        join_identical(&mut mesh);

        assert_eq!(mesh.vertices.len(), 2);
        assert_eq!(mesh.indices, [0, 1, 0]);
        // The survivor keeps its original, unquantized attributes
        assert_eq!(mesh.vertices[0].position, Vec3::ZERO);
    }

    #[test]
    fn distinct_vertices_stay_apart() {
        let mut mesh = soup(&[[0.0, 0.0, 0.0], [0.001, 0.0, 0.0], [0.002, 0.0, 0.0]]);
        join_identical(&mut mesh);

        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, [0, 1, 2]);
    }

    #[test]
    fn combine_offsets_by_base_vertex() {
        let mut first = soup(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        first.name = "first".to_owned();
        first.material = "stone".to_owned();
        let second = soup(&[[2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0]]);

        let combined = combine(&[first, second]).unwrap();

        assert_eq!(combined.name, "first");
        assert_eq!(combined.material, "stone");
        assert_eq!(combined.vertices.len(), 6);
        assert_eq!(combined.indices, [0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn combine_of_nothing_is_none() {
        assert!(combine(&[]).is_none());
    }

    #[test]
    fn combined_indices_stay_in_range() {
        let meshes: Vec<Mesh> = (0..3)
            .map(|n| soup(&[[n as f32, 0.0, 0.0], [n as f32, 1.0, 0.0], [n as f32, 0.0, 1.0]]))
            .collect();
        let total: usize = meshes.iter().map(|mesh| mesh.indices.len()).sum();

        let combined = combine(&meshes).unwrap();

        assert_eq!(combined.indices.len(), total);
        assert!(
            combined
                .indices
                .iter()
                .all(|&index| (index as usize) < combined.vertices.len())
        );
    }
}
