//! The asynchronous load pipeline: path discovery, OBJ/MTL parsing, vertex
//! construction, tangent space, vertex welding, and mesh combining.

mod mtl;
mod obj;
mod tangent;
mod weld;

pub mod plan;

use {
    self::plan::PlanEntry,
    crate::{
        error::Error,
        model::{Model, ModelLod},
        pool::{Completion, ThreadPool},
        sink::{LogSink, Severity, StandardSink},
        timer::Timer,
    },
    bitflags::bitflags,
    serde::{Deserialize, Serialize},
    std::{
        path::{Path, PathBuf},
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::Duration,
    },
};

bitflags! {
    /// Behavior switches for [`Loader::load_file`].
    #[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
    pub struct LoadFlags: u32 {
        /// Derive per-vertex tangents and handedness after assembly.
        const CALC_TANGENT_SPACE = 1 << 0;

        /// Weld vertices whose quantized attributes are identical.
        const JOIN_IDENTICAL = 1 << 1;

        /// Concatenate each detail level into a single mesh.
        const COMBINE_MESHES = 1 << 2;

        /// Search the asset directory for `_lod<k>` sibling files.
        const LODS = 1 << 3;
    }
}

/// Iterates `(byte offset, line)` over a raw buffer, splitting on LF and
/// trimming one trailing CR.
pub(crate) fn lines(bytes: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    let mut offset = 0;
    bytes.split(|&b| b == b'\n').map(move |line| {
        let start = offset;
        offset += line.len() + 1;
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        (start, line)
    })
}

/// Splits a line into non-empty tokens on spaces and tabs.
pub(crate) fn tokens(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(|&b| b == b' ' || b == b'\t')
        .filter(|token| !token.is_empty())
}

/// Everything after the first token, trimmed. Used by directives whose
/// argument may contain spaces (`o`, `mtllib`).
pub(crate) fn rest(line: &[u8]) -> &[u8] {
    let line = trim(line);
    match line.iter().position(|&b| b == b' ' || b == b'\t') {
        Some(split) => trim(&line[split..]),
        None => &[],
    }
}

fn trim(bytes: &[u8]) -> &[u8] {
    let is_space = |b: &u8| matches!(b, b' ' | b'\t' | b'\r');
    let start = bytes.iter().position(|b| !is_space(b)).unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !is_space(b))
        .map(|last| last + 1)
        .unwrap_or(start);

    &bytes[start..end]
}

pub(crate) fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Pipeline state for one [`Loader::load_file`] call. Owned exclusively by
/// that call and moved into its worker task; concurrent loads never share
/// mutable memory.
struct LoaderState {
    flags: LoadFlags,
    path: PathBuf,
    plan: Vec<PlanEntry>,
    lods: Vec<ModelLod>,
}

/// Schedules OBJ asset loads onto a shared worker pool.
///
/// Path discovery and file reads run synchronously on the caller so a
/// missing asset fails fast; parsing and the geometry passes run on a pool
/// worker and deliver their result through the returned [`Completion`].
pub struct Loader {
    next_load: AtomicU64,
    pool: ThreadPool,
    sink: Arc<dyn LogSink>,
}

impl Loader {
    /// Creates a loader whose pool uses up to `max_threads` workers and
    /// reports through the `log` facade.
    pub fn new(max_threads: usize) -> Self {
        Self::with_sink(max_threads, Arc::new(StandardSink))
    }

    /// Creates a loader that reports progress and failures to `sink`.
    pub fn with_sink(max_threads: usize, sink: Arc<dyn LogSink>) -> Self {
        Self {
            next_load: AtomicU64::new(0),
            pool: ThreadPool::new(max_threads, Arc::clone(&sink)),
            sink,
        }
    }

    /// The worker pool behind this loader.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Begins loading `path` and returns a handle that resolves to the
    /// finished [`Model`].
    ///
    /// A missing or unreadable OBJ fails here, synchronously. A missing MTL
    /// is non-fatal: it logs a warning and yields an empty material record
    /// for that detail level. Failures inside the worker surface through the
    /// handle so each load is isolated.
    pub fn load_file(
        &self,
        path: impl AsRef<Path>,
        flags: LoadFlags,
    ) -> Result<Completion<Model>, Error> {
        let path = path.as_ref().to_path_buf();
        let timer = Timer::start();
        let number = self.next_load.fetch_add(1, Ordering::Relaxed) + 1;

        let plan = plan::discover(&path, flags.contains(LoadFlags::LODS))?;

        // All reads happen here on the caller; workers never touch the disk.
        let mut buffers = Vec::with_capacity(plan.len());
        for entry in &plan {
            let obj = match plan::read_bytes(&entry.obj_path) {
                Ok(bytes) => bytes,
                Err(_) if entry.lod_level == 0 => {
                    return Err(Error::Plan {
                        path: entry.obj_path.clone(),
                    });
                }
                Err(err) => return Err(err),
            };
            let mtl = match plan::read_bytes(&entry.mtl_path) {
                Ok(bytes) => bytes,
                Err(_) => {
                    self.sink.log(
                        Severity::Warning,
                        &format!(
                            "no material library for {} (lod {})",
                            entry.obj_path.display(),
                            entry.lod_level
                        ),
                    );

                    Vec::new()
                }
            };

            buffers.push((obj, mtl));
        }

        let state = LoaderState {
            flags,
            path,
            lods: Vec::with_capacity(plan.len()),
            plan,
        };
        let cached = timer.elapsed();
        let sink = Arc::clone(&self.sink);

        Ok(self.pool.enqueue(move || {
            let res = process(state, buffers, &*sink, number, cached);
            if let Err(err) = &res {
                sink.log(Severity::Error, &format!("load {number} failed: {err}"));
            }

            res
        }))
    }

    /// Convenience wrapper that waits for the load to finish.
    pub fn load_file_blocking(
        &self,
        path: impl AsRef<Path>,
        flags: LoadFlags,
    ) -> Result<Model, Error> {
        self.load_file(path, flags)?.wait()
    }
}

/// Worker-side pipeline, per detail level in plan order: materials first so
/// `usemtl` can flag tiling on existing slots, then the OBJ walk, vertex
/// construction, and the optional geometry passes. Combining runs once all
/// levels are in.
fn process(
    mut state: LoaderState,
    buffers: Vec<(Vec<u8>, Vec<u8>)>,
    sink: &dyn LogSink,
    number: u64,
    cached: Duration,
) -> Result<Model, Error> {
    let timer = Timer::start();

    for (entry, (obj, mtl)) in state.plan.iter().zip(buffers) {
        let mut materials = mtl::parse(&mtl);
        let data = obj::parse(&obj, &entry.obj_path, &mut materials)?;
        let mut meshes = obj::construct_vertices(data, entry.lod_level, &entry.obj_path)?;

        if state.flags.contains(LoadFlags::CALC_TANGENT_SPACE) {
            for mesh in &mut meshes {
                tangent::calculate(mesh);
            }
        }

        if state.flags.contains(LoadFlags::JOIN_IDENTICAL) {
            for mesh in &mut meshes {
                weld::join_identical(mesh);
            }
        }

        state.lods.push(ModelLod {
            level: entry.lod_level,
            meshes,
            materials,
        });
    }

    let combined = state.flags.contains(LoadFlags::COMBINE_MESHES).then(|| {
        state
            .lods
            .iter()
            .filter_map(|lod| weld::combine(&lod.meshes))
            .collect()
    });

    let processed = timer.elapsed();
    sink.log(
        Severity::Success,
        &format!(
            "load {number}: {} ready in {:.2?} ({cached:.2?} cached, {processed:.2?} processed)",
            state.path.display(),
            cached + processed
        ),
    );

    Ok(Model {
        path: state.path,
        lods: state.lods,
        combined,
    })
}

#[cfg(test)]
mod tests {
    use super::{lines, rest, tokens};

    #[test]
    fn lines_carry_byte_offsets() {
        let collected: Vec<_> = lines(b"ab\ncd\r\n\nef").collect();

        assert_eq!(
            collected,
            [
                (0, b"ab".as_slice()),
                (3, b"cd".as_slice()),
                (7, b"".as_slice()),
                (8, b"ef".as_slice()),
            ]
        );
    }

    #[test]
    fn tokens_split_on_spaces_and_tabs() {
        let collected: Vec<_> = tokens(b"  f\t1/2/3  4//5 ").collect();

        assert_eq!(
            collected,
            [b"f".as_slice(), b"1/2/3".as_slice(), b"4//5".as_slice()]
        );
    }

    #[test]
    fn rest_keeps_embedded_spaces() {
        assert_eq!(rest(b"o left arm  "), b"left arm");
        assert_eq!(rest(b"o"), b"");
        assert_eq!(rest(b"  mtllib  some lib.mtl"), b"some lib.mtl");
    }
}
