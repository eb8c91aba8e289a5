use {
    crate::error::Error,
    log::{debug, trace},
    std::{
        ffi::OsStr,
        fs,
        path::{Path, PathBuf},
    },
};

/// One `{obj, mtl}` pair scheduled for parsing at a given detail level.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlanEntry {
    pub obj_path: PathBuf,
    pub mtl_path: PathBuf,
    pub lod_level: u32,
}

/// Resolves the base OBJ, its sibling MTL, and optionally `_lod<k>` variants
/// into a dense plan ordered by detail level.
///
/// The base MTL path is reported even when no such file exists; the reader
/// decides later whether that is fatal. Siblings whose `_lod` suffix is not
/// a decimal number are not detail levels of this asset and are skipped, as
/// are extensions other than `.obj`/`.mtl`. Holes left in the plan keep
/// empty paths and surface when their files are read.
pub fn discover(path: &Path, with_lods: bool) -> Result<Vec<PlanEntry>, Error> {
    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or_else(|| Error::Plan {
            path: path.to_path_buf(),
        })?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let dir = dunce::canonicalize(&dir).unwrap_or(dir);

    let mut plan = vec![PlanEntry {
        obj_path: path.to_path_buf(),
        mtl_path: dir.join(format!("{stem}.mtl")),
        lod_level: 0,
    }];

    if with_lods {
        let prefix = format!("{stem}_lod");
        let entries = fs::read_dir(&dir).map_err(|source| Error::Io {
            path: dir.clone(),
            source,
        })?;

        for entry in entries {
            let sibling = entry
                .map_err(|source| Error::Io {
                    path: dir.clone(),
                    source,
                })?
                .path();
            let Some(suffix) = sibling
                .file_stem()
                .and_then(OsStr::to_str)
                .and_then(|stem| stem.strip_prefix(&prefix))
            else {
                continue;
            };

            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                trace!(
                    "skipping {}: not a detail level of this asset",
                    sibling.display()
                );

                continue;
            }

            let Ok(level) = suffix.parse::<u32>() else {
                trace!("skipping {}: detail level out of range", sibling.display());

                continue;
            };

            let extension = sibling.extension().and_then(OsStr::to_str);
            let is_obj = extension.is_some_and(|ext| ext.eq_ignore_ascii_case("obj"));
            let is_mtl = extension.is_some_and(|ext| ext.eq_ignore_ascii_case("mtl"));
            if !is_obj && !is_mtl {
                debug!("skipping {}: unrecognized extension", sibling.display());

                continue;
            }

            let slot = level as usize;
            if plan.len() <= slot {
                plan.resize_with(slot + 1, PlanEntry::default);
            }

            if is_obj {
                plan[slot].obj_path = sibling;
            } else {
                plan[slot].mtl_path = sibling;
            }
        }
    }

    for (level, entry) in plan.iter_mut().enumerate() {
        entry.lod_level = level as u32;
    }

    Ok(plan)
}

/// Slurps a file into a contiguous byte buffer. No decoding happens here;
/// the parsers walk raw bytes.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
