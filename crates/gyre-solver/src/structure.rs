//! Cached Jacobian structure files.
//!
//! # Format
//!
//! Little-endian throughout:
//!
//! ```text
//! magic      b"GJAC"
//! version    u8          (STRUCTURE_VERSION)
//! layout     u32         (gyre_codec::LAYOUT_VERSION at write time)
//! fingerprint u64        (StateLayout::fingerprint)
//! n          u64
//! nnz        u64
//! row_ptr    (n + 1) x u64
//! cols       nnz x u64
//! colors     n x u64
//! ```
//!
//! A file is accepted only when its layout version and fingerprint match
//! the current layout: the column order is meaningless otherwise.

use crate::jacobian::{Coloring, JacobianSetup, JacobianStrategy, SparsityPattern};
use gyre_codec::{StateLayout, LAYOUT_VERSION};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Magic bytes at the start of every structure file.
pub const MAGIC: [u8; 4] = *b"GJAC";

/// Current structure file format version.
pub const STRUCTURE_VERSION: u8 = 1;

// ── StructureError ─────────────────────────────────────────────────

/// Errors reading or writing a structure file.
#[derive(Debug)]
pub enum StructureError {
    /// An I/O error occurred.
    Io(io::Error),
    /// The file does not start with `b"GJAC"`.
    BadMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the file.
        found: u8,
    },
    /// The file was written for a different state layout.
    LayoutMismatch {
        /// Layout version and fingerprint in the file.
        recorded: (u32, u64),
        /// Layout version and fingerprint of the current layout.
        current: (u32, u64),
    },
    /// The arrays are inconsistent or the coloring is invalid.
    Corrupt {
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

impl fmt::Display for StructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::BadMagic => write!(f, "invalid magic bytes (expected b\"GJAC\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported structure format version {found}")
            }
            Self::LayoutMismatch { recorded, current } => write!(
                f,
                "layout mismatch: recorded v{} {:#018x}, current v{} {:#018x}",
                recorded.0, recorded.1, current.0, current.1
            ),
            Self::Corrupt { detail } => write!(f, "corrupt structure file: {detail}"),
        }
    }
}

impl Error for StructureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StructureError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ── Paths ──────────────────────────────────────────────────────────

/// Per-rank file name: `path` itself on one rank, `path.<rank>` otherwise.
pub fn rank_path(path: &Path, rank: usize, size: usize) -> PathBuf {
    if size <= 1 {
        return path.to_path_buf();
    }
    let mut s = path.as_os_str().to_os_string();
    s.push(format!(".{rank}"));
    PathBuf::from(s)
}

// ── Encoding ───────────────────────────────────────────────────────

/// Encode `setup` for `layout` into `w`.
pub fn write_structure<W: Write>(
    w: &mut W,
    setup: &JacobianSetup,
    layout: &StateLayout,
) -> Result<(), StructureError> {
    let p = &setup.pattern;
    w.write_all(&MAGIC)?;
    w.write_all(&[STRUCTURE_VERSION])?;
    w.write_all(&LAYOUT_VERSION.to_le_bytes())?;
    w.write_all(&layout.fingerprint().to_le_bytes())?;
    write_u64(w, p.n() as u64)?;
    write_u64(w, p.nnz() as u64)?;
    for &v in p.row_ptr() {
        write_u64(w, v as u64)?;
    }
    for &v in p.cols() {
        write_u64(w, v as u64)?;
    }
    for &c in setup.coloring.colors() {
        write_u64(w, c as u64)?;
    }
    Ok(())
}

/// Decode a structure from `r`, checking it against `layout`.
pub fn read_structure<R: Read>(
    r: &mut R,
    layout: &StateLayout,
) -> Result<JacobianSetup, StructureError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(StructureError::BadMagic);
    }
    let mut version = [0u8; 1];
    r.read_exact(&mut version)?;
    if version[0] != STRUCTURE_VERSION {
        return Err(StructureError::UnsupportedVersion { found: version[0] });
    }
    let mut b4 = [0u8; 4];
    r.read_exact(&mut b4)?;
    let recorded_layout = u32::from_le_bytes(b4);
    let recorded_fp = read_u64(r)?;
    let current = (LAYOUT_VERSION, layout.fingerprint());
    if (recorded_layout, recorded_fp) != current {
        return Err(StructureError::LayoutMismatch {
            recorded: (recorded_layout, recorded_fp),
            current,
        });
    }

    let n = read_len(r)?;
    let nnz = read_len(r)?;
    if n != layout.local_len() {
        return Err(StructureError::Corrupt {
            detail: format!("order {n}, layout has {}", layout.local_len()),
        });
    }
    if nnz > n.saturating_mul(n) {
        return Err(StructureError::Corrupt {
            detail: format!("{nnz} nonzeros in an order-{n} matrix"),
        });
    }
    let row_ptr = read_vec(r, n + 1)?;
    let cols = read_vec(r, nnz)?;
    let colors = read_vec(r, n)?;

    let pattern =
        SparsityPattern::from_csr(n, row_ptr, cols).ok_or_else(|| StructureError::Corrupt {
            detail: "inconsistent compressed-row arrays".into(),
        })?;
    let coloring = Coloring::from_colors(colors);
    if !coloring.is_valid_for(&pattern) {
        return Err(StructureError::Corrupt {
            detail: "coloring is not structurally orthogonal".into(),
        });
    }
    Ok(JacobianSetup {
        pattern: Arc::new(pattern),
        coloring,
        strategy: JacobianStrategy::Loaded,
    })
}

/// Write `setup` to the file at `path`.
pub fn save(
    path: &Path,
    setup: &JacobianSetup,
    layout: &StateLayout,
) -> Result<(), StructureError> {
    let mut w = BufWriter::new(File::create(path)?);
    write_structure(&mut w, setup, layout)?;
    w.flush()?;
    debug!(
        path = %path.display(),
        nnz = setup.pattern.nnz(),
        colors = setup.coloring.ncolors(),
        "jacobian structure written"
    );
    Ok(())
}

/// Read a structure from the file at `path`.
pub fn load(path: &Path, layout: &StateLayout) -> Result<JacobianSetup, StructureError> {
    let mut r = BufReader::new(File::open(path)?);
    let setup = read_structure(&mut r, layout)?;
    debug!(
        path = %path.display(),
        nnz = setup.pattern.nnz(),
        colors = setup.coloring.ncolors(),
        "jacobian structure loaded"
    );
    Ok(setup)
}

fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}

fn read_len<R: Read>(r: &mut R) -> Result<usize, StructureError> {
    let v = read_u64(r)?;
    usize::try_from(v).map_err(|_| StructureError::Corrupt {
        detail: format!("length {v} does not fit in memory"),
    })
}

fn read_vec<R: Read>(r: &mut R, len: usize) -> Result<Vec<usize>, StructureError> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_len(r)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_codec::RegistryBuilder;
    use gyre_core::CellLoc;
    use gyre_mesh::StructuredMesh;

    fn layout(nz: usize) -> StateLayout {
        let mesh = StructuredMesh::builder()
            .interior(3, 3)
            .planes(nz)
            .guards(1, 1)
            .build()
            .unwrap();
        let reg = RegistryBuilder::new()
            .scalar_3d("n", CellLoc::Centre)
            .build()
            .unwrap();
        StateLayout::build(&reg, &mesh)
    }

    fn setup(layout: &StateLayout) -> JacobianSetup {
        JacobianSetup::colored(SparsityPattern::stencil(layout, 1), JacobianStrategy::Stencil)
    }

    #[test]
    fn round_trip_preserves_structure() {
        let l = layout(2);
        let s = setup(&l);
        let mut buf = Vec::new();
        write_structure(&mut buf, &s, &l).unwrap();
        let back = read_structure(&mut buf.as_slice(), &l).unwrap();
        assert_eq!(*back.pattern, *s.pattern);
        assert_eq!(back.coloring, s.coloring);
        assert_eq!(back.strategy, JacobianStrategy::Loaded);
    }

    #[test]
    fn other_layout_is_rejected() {
        let l = layout(2);
        let mut buf = Vec::new();
        write_structure(&mut buf, &setup(&l), &l).unwrap();
        let err = read_structure(&mut buf.as_slice(), &layout(3)).unwrap_err();
        assert!(matches!(err, StructureError::LayoutMismatch { .. }));
    }

    #[test]
    fn bad_magic_and_version_are_rejected() {
        let l = layout(1);
        let mut buf = Vec::new();
        write_structure(&mut buf, &setup(&l), &l).unwrap();
        let mut wrong_magic = buf.clone();
        wrong_magic[0] = b'X';
        assert!(matches!(
            read_structure(&mut wrong_magic.as_slice(), &l),
            Err(StructureError::BadMagic)
        ));
        let mut wrong_version = buf.clone();
        wrong_version[4] = 9;
        assert!(matches!(
            read_structure(&mut wrong_version.as_slice(), &l),
            Err(StructureError::UnsupportedVersion { found: 9 })
        ));
    }

    #[test]
    fn truncated_file_is_an_io_error() {
        let l = layout(1);
        let mut buf = Vec::new();
        write_structure(&mut buf, &setup(&l), &l).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(
            read_structure(&mut buf.as_slice(), &l),
            Err(StructureError::Io(_))
        ));
    }

    #[test]
    fn invalid_coloring_is_corrupt() {
        let l = layout(1);
        let mut s = setup(&l);
        s.coloring = Coloring::from_colors(vec![0; l.local_len()]);
        let mut buf = Vec::new();
        write_structure(&mut buf, &s, &l).unwrap();
        assert!(matches!(
            read_structure(&mut buf.as_slice(), &l),
            Err(StructureError::Corrupt { .. })
        ));
    }

    #[test]
    fn rank_suffix_only_when_distributed() {
        let p = Path::new("jac.bin");
        assert_eq!(rank_path(p, 0, 1), PathBuf::from("jac.bin"));
        assert_eq!(rank_path(p, 2, 4), PathBuf::from("jac.bin.2"));
    }
}
