use {
    super::{lines, rest, text, tokens},
    crate::{
        error::Error,
        model::{Material, Mesh, Vertex},
    },
    arrayvec::ArrayVec,
    glam::{Vec2, Vec3, Vec4},
    log::trace,
    std::{path::Path, str},
};

/// One face corner as indices into the owning object's temp arrays, already
/// 0-based and rebased against the per-object offset. Slots the corner did
/// not specify stay 0.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct FaceIndices {
    pub v: u32,
    pub vt: u32,
    pub vn: u32,
}

/// Parser scratch for one `o` block, discarded once vertices are built.
///
/// Texture coordinates are stored v-flipped: `(u, 1 - v)`.
#[derive(Debug, Default)]
pub(crate) struct TempMesh {
    pub name: String,
    pub material: String,
    pub positions: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub faces: Vec<[FaceIndices; 3]>,
}

impl TempMesh {
    fn with_capacity(name: String, material: String, counts: Counts) -> Self {
        Self {
            name,
            material,
            positions: Vec::with_capacity(counts.v),
            texcoords: Vec::with_capacity(counts.vt),
            normals: Vec::with_capacity(counts.vn),
            faces: Vec::with_capacity(counts.f),
        }
    }
}

/// Everything the second pass produced for one OBJ buffer.
#[derive(Debug, Default)]
pub(crate) struct ObjData {
    pub meshes: Vec<TempMesh>,
    pub mtl_lib: Option<String>,
}

/// Per-object reservation hints gathered by the counting pass.
#[derive(Clone, Copy, Debug, Default)]
struct Counts {
    v: usize,
    vt: usize,
    vn: usize,
    f: usize,
}

/// First pass: count `v`/`vt`/`vn`/`f` lines per `o` block so the second
/// pass can preallocate. Data appearing before any `o` line belongs to an
/// implicit unnamed object; both passes agree on that.
fn survey(bytes: &[u8]) -> Vec<Counts> {
    let mut counts: Vec<Counts> = Vec::new();
    let mut current: Option<usize> = None;

    for (_, line) in lines(bytes) {
        let Some(directive) = tokens(line).next() else {
            continue;
        };

        match directive {
            b"o" => {
                counts.push(Counts::default());
                current = Some(counts.len() - 1);
            }
            b"v" | b"vt" | b"vn" | b"f" => {
                if current.is_none() {
                    counts.push(Counts::default());
                    current = Some(counts.len() - 1);
                }

                let entry = &mut counts[current.unwrap_or_default()];
                match directive {
                    b"v" => entry.v += 1,
                    b"vt" => entry.vt += 1,
                    b"vn" => entry.vn += 1,
                    _ => entry.f += 1,
                }
            }
            _ => (),
        }
    }

    counts
}

/// Tracks the spread of texture coordinates observed since the last
/// `usemtl` (or object start) to detect tiling materials.
struct UvTracker {
    min: Vec2,
    max: Vec2,
    seen: bool,
}

impl UvTracker {
    fn new() -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::ZERO,
            seen: false,
        }
    }

    fn track(&mut self, uv: Vec2) {
        if self.seen {
            self.min = self.min.min(uv);
            self.max = self.max.max(uv);
        } else {
            self.min = uv;
            self.max = uv;
            self.seen = true;
        }
    }

    /// Flags the active material as tiled when the tracked UV range exceeds
    /// 1.0 on either axis, then resets.
    fn flush(&mut self, materials: &mut [Material], active: &str) {
        if self.seen && !active.is_empty() {
            let range = self.max - self.min;
            if (range.x > 1.0 || range.y > 1.0)
                && let Some(material) = materials.iter_mut().find(|m| m.name == active)
            {
                material.is_tiled = true;
            }
        }

        self.seen = false;
    }
}

/// Second pass: walk the buffer line by line into [`TempMesh`]es.
///
/// OBJ face indices are 1-based and global across the file, while each
/// object's temp arrays start at zero, so a running offset (the highest raw
/// index observed before the object opened) rebases every face triple.
/// `materials` must already hold this LOD's parsed MTL records so `usemtl`
/// can flag tiling on them.
pub(crate) fn parse(
    bytes: &[u8],
    path: &Path,
    materials: &mut [Material],
) -> Result<ObjData, Error> {
    let counts = survey(bytes);
    let mut data = ObjData {
        meshes: Vec::with_capacity(counts.len()),
        mtl_lib: None,
    };

    let mut offset = [0u32; 3];
    let mut max_seen = [0u32; 3];
    let mut uv = UvTracker::new();
    let mut active_material = String::new();

    for (line_offset, line) in lines(bytes) {
        let mut tokens = tokens(line);
        let Some(directive) = tokens.next() else {
            continue;
        };

        match directive {
            b"o" => {
                uv.flush(materials, &active_material);
                offset = max_seen;
                // The active material carries across object boundaries until
                // the next usemtl
                data.meshes.push(TempMesh::with_capacity(
                    text(rest(line)),
                    active_material.clone(),
                    counts.get(data.meshes.len()).copied().unwrap_or_default(),
                ));
            }
            b"v" => {
                let [x, y, z] = floats(&mut tokens, path, line_offset, "v")?;
                current(&mut data, &counts, &active_material)
                    .positions
                    .push(Vec3::new(x, y, z));
            }
            b"vt" => {
                let [u, v] = floats(&mut tokens, path, line_offset, "vt")?;
                let flipped = Vec2::new(u, 1.0 - v);
                uv.track(flipped);
                current(&mut data, &counts, &active_material)
                    .texcoords
                    .push(flipped);
            }
            b"vn" => {
                let [x, y, z] = floats(&mut tokens, path, line_offset, "vn")?;
                current(&mut data, &counts, &active_material)
                    .normals
                    .push(Vec3::new(x, y, z));
            }
            b"f" => {
                let mut corners = ArrayVec::<FaceIndices, 4>::new();
                for token in tokens {
                    let corner = face_corner(token, &mut max_seen, offset, path, line_offset)?;
                    if corners.try_push(corner).is_err() {
                        return Err(Error::parse(
                            path,
                            line_offset,
                            "faces with more than four corners are not supported",
                        ));
                    }
                }

                let mesh = current(&mut data, &counts, &active_material);
                match corners.len() {
                    3 => mesh.faces.push([corners[0], corners[1], corners[2]]),
                    4 => {
                        // Split along the (v0, v2) diagonal
                        mesh.faces.push([corners[0], corners[1], corners[2]]);
                        mesh.faces.push([corners[0], corners[2], corners[3]]);
                    }
                    n => {
                        return Err(Error::parse(
                            path,
                            line_offset,
                            format!("face has {n} corners, need 3 or 4"),
                        ));
                    }
                }
            }
            b"usemtl" => {
                uv.flush(materials, &active_material);
                active_material = text(rest(line));
                if let Some(mesh) = data.meshes.last_mut() {
                    mesh.material = active_material.clone();
                }
            }
            b"mtllib" => {
                let name = text(rest(line));
                trace!("material library {name}");
                data.mtl_lib = Some(name);
            }
            // s, g, vp, l, comments, blanks
            _ => (),
        }
    }

    uv.flush(materials, &active_material);

    Ok(data)
}

fn current<'a>(
    data: &'a mut ObjData,
    counts: &[Counts],
    active_material: &str,
) -> &'a mut TempMesh {
    if data.meshes.is_empty() {
        data.meshes.push(TempMesh::with_capacity(
            String::new(),
            active_material.to_owned(),
            counts.first().copied().unwrap_or_default(),
        ));
    }

    // Non-empty by the push above
    data.meshes.last_mut().unwrap()
}

fn floats<'a, const N: usize>(
    tokens: &mut impl Iterator<Item = &'a [u8]>,
    path: &Path,
    offset: usize,
    directive: &str,
) -> Result<[f32; N], Error> {
    let mut values = [0f32; N];
    for value in &mut values {
        let Some(token) = tokens.next() else {
            return Err(Error::parse(
                path,
                offset,
                format!("'{directive}' needs {N} values"),
            ));
        };

        *value = parse_float(token, path, offset)?;
    }

    Ok(values)
}

fn parse_float(token: &[u8], path: &Path, offset: usize) -> Result<f32, Error> {
    str::from_utf8(token)
        .ok()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| {
            Error::parse(
                path,
                offset,
                format!("malformed float '{}'", String::from_utf8_lossy(token)),
            )
        })
}

/// Parses one `V[/T[/N]]` corner token. Present components bump the running
/// raw maxima, then drop to 0-based and rebase against the carried offset;
/// absent components stay 0.
fn face_corner(
    token: &[u8],
    max_seen: &mut [u32; 3],
    offset: [u32; 3],
    path: &Path,
    line_offset: usize,
) -> Result<FaceIndices, Error> {
    let mut parts = token.split(|&b| b == b'/');
    let mut corner = FaceIndices::default();

    for (slot, part) in parts.by_ref().take(3).enumerate() {
        if part.is_empty() && slot > 0 {
            continue;
        }

        let raw: u32 = str::from_utf8(part)
            .ok()
            .and_then(|part| part.parse().ok())
            .filter(|&raw| raw > 0)
            .ok_or_else(|| {
                Error::parse(
                    path,
                    line_offset,
                    format!(
                        "malformed face specifier '{}'",
                        String::from_utf8_lossy(token)
                    ),
                )
            })?;

        max_seen[slot] = max_seen[slot].max(raw);
        let rebased = (raw - 1).checked_sub(offset[slot]).ok_or_else(|| {
            Error::parse(
                path,
                line_offset,
                format!("face index {raw} references a previous object"),
            )
        })?;

        match slot {
            0 => corner.v = rebased,
            1 => corner.vt = rebased,
            _ => corner.vn = rebased,
        }
    }

    if parts.next().is_some() {
        return Err(Error::parse(
            path,
            line_offset,
            format!(
                "face specifier '{}' has too many components",
                String::from_utf8_lossy(token)
            ),
        ));
    }

    Ok(corner)
}

/// Flattens parsed objects into triangle-soup meshes: one vertex per face
/// corner with sequential indices and zeroed tangents. Real topology appears
/// only after the welding pass; callers that skip it receive the soup as-is.
pub(crate) fn construct_vertices(
    data: ObjData,
    lod_level: u32,
    path: &Path,
) -> Result<Vec<Mesh>, Error> {
    let mut meshes = Vec::with_capacity(data.meshes.len());

    for (number, temp) in data.meshes.into_iter().enumerate() {
        let corner_count = temp.faces.len() * 3;
        let mut vertices = Vec::with_capacity(corner_count);
        let mut indices = Vec::with_capacity(corner_count);

        for corner in temp.faces.iter().flat_map(|face| face.iter()) {
            let position = temp
                .positions
                .get(corner.v as usize)
                .copied()
                .ok_or_else(|| {
                    Error::parse(
                        path,
                        0,
                        format!(
                            "object '{}' references vertex {} but only has {}",
                            temp.name,
                            corner.v + 1,
                            temp.positions.len()
                        ),
                    )
                })?;
            let normal = attribute(&temp.normals, corner.vn, "normal", &temp.name, path)?;
            let uv = attribute(&temp.texcoords, corner.vt, "texture coord", &temp.name, path)?;

            indices.push(vertices.len() as u32);
            vertices.push(Vertex {
                position,
                normal,
                uv,
                tangent: Vec4::ZERO,
            });
        }

        meshes.push(Mesh {
            name: temp.name,
            material: temp.material,
            lod_level,
            number: number as u32,
            vertices,
            indices,
        });
    }

    Ok(meshes)
}

/// Reads an optional vertex attribute. A corner that never specified the
/// component left its slot at 0 and the object has no such data at all, so
/// an empty array reads as the zero attribute; an explicit reference past a
/// non-empty array is malformed input.
fn attribute<T: Copy + Default>(
    values: &[T],
    index: u32,
    kind: &str,
    object: &str,
    path: &Path,
) -> Result<T, Error> {
    match values.get(index as usize) {
        Some(&value) => Ok(value),
        None if values.is_empty() => Ok(T::default()),
        None => Err(Error::parse(
            path,
            0,
            format!(
                "object '{object}' references {kind} {} but only has {}",
                index + 1,
                values.len()
            ),
        )),
    }
}
