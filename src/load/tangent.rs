use {
    crate::model::Mesh,
    glam::Vec3,
};

/// Magnitudes below this contribute nothing and are treated as degenerate.
const MIN_LENGTH: f32 = 1e-10;

/// Derives per-vertex tangents and handedness for one mesh.
///
/// Each triangle's tangent and bitangent are accumulated into its vertices
/// weighted by triangle area; only after the full sweep is the tangent
/// reorthogonalized against the normal (Gram-Schmidt) and normalized.
/// Handedness lands in `tangent.w` as ±1 so consumers can rebuild the
/// bitangent from `cross(normal, tangent) * w`; bitangents themselves are
/// not stored.
///
/// Degenerate triangles (zero UV area or zero surface area) are skipped for
/// accumulation but stay in the index list.
pub(crate) fn calculate(mesh: &mut Mesh) {
    let mut bitangents = vec![Vec3::ZERO; mesh.vertices.len()];

    for triangle in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let v0 = mesh.vertices[i0];
        let v1 = mesh.vertices[i1];
        let v2 = mesh.vertices[i2];

        let e1 = v1.position - v0.position;
        let e2 = v2.position - v0.position;
        let d1 = v1.uv - v0.uv;
        let d2 = v2.uv - v0.uv;

        let f = 1.0 / (d1.x * d2.y - d2.x * d1.y);
        let tangent = f * (e1 * d2.y - e2 * d1.y);
        let bitangent = f * (e2 * d1.x - e1 * d2.x);
        let area = 0.5 * e1.cross(e2).length();

        if !tangent.is_finite()
            || !bitangent.is_finite()
            || tangent.length() < MIN_LENGTH
            || bitangent.length() < MIN_LENGTH
        {
            continue;
        }

        for index in [i0, i1, i2] {
            let accum = &mut mesh.vertices[index].tangent;
            *accum += (tangent * area).extend(0.0);
            bitangents[index] += bitangent * area;
        }
    }

    for (vertex, bitangent) in mesh.vertices.iter_mut().zip(bitangents) {
        let accum = vertex.tangent.truncate();
        let normal = vertex.normal;

        let tangent = if accum.length() > MIN_LENGTH {
            (accum - normal * normal.dot(accum))
                .try_normalize()
                .unwrap_or(Vec3::X)
        } else {
            Vec3::X
        };

        let handedness = if normal.cross(tangent).dot(bitangent) < 0.0 {
            -1.0
        } else {
            1.0
        };

        vertex.tangent = tangent.extend(handedness);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::calculate,
        crate::model::{Mesh, Vertex},
        glam::{Vec2, Vec3, Vec4},
    };

    const EPSILON: f32 = 1e-5;

    fn triangle(uvs: [[f32; 2]; 3]) -> Mesh {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        Mesh {
            vertices: positions
                .iter()
                .zip(uvs)
                .map(|(&position, uv)| Vertex {
                    position: Vec3::from_array(position),
                    normal: Vec3::Z,
                    uv: Vec2::from_array(uv),
                    tangent: Vec4::ZERO,
                })
                .collect(),
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    #[test]
    fn plain_uvs_give_positive_handedness() {
        let mut mesh = triangle([[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        calculate(&mut mesh);

        for vertex in &mesh.vertices {
            assert!((vertex.tangent.truncate() - Vec3::X).length() < EPSILON);
            assert_eq!(vertex.tangent.w, 1.0);
        }
    }

    #[test]
    fn mirrored_uvs_flip_handedness() {
        let mut mesh = triangle([[0.0, 0.0], [1.0, 0.0], [0.0, -1.0]]);
        calculate(&mut mesh);

        for vertex in &mesh.vertices {
            assert!((vertex.tangent.truncate() - Vec3::X).length() < EPSILON);
            assert_eq!(vertex.tangent.w, -1.0);
        }
    }

    #[test]
    fn tangents_are_unit_length_and_orthogonal() {
        let mut mesh = triangle([[0.3, 0.1], [0.9, 0.4], [0.2, 0.8]]);
        calculate(&mut mesh);

        for vertex in &mesh.vertices {
            let tangent = vertex.tangent.truncate();

            assert!((tangent.length() - 1.0).abs() < EPSILON);
            assert!(tangent.dot(vertex.normal).abs() < EPSILON);
            assert!(vertex.tangent.w == 1.0 || vertex.tangent.w == -1.0);
        }
    }

    #[test]
    fn degenerate_uvs_fall_back_to_x() {
        // All corners share one UV; the determinant is zero
        let mut mesh = triangle([[0.5, 0.5], [0.5, 0.5], [0.5, 0.5]]);
        calculate(&mut mesh);

        assert_eq!(mesh.indices.len(), 3);
        for vertex in &mesh.vertices {
            assert_eq!(vertex.tangent, Vec3::X.extend(1.0));
        }
    }
}
