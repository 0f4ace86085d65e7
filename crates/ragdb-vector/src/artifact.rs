//! On-disk vector index artifact.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic  "RVX1"            4 bytes
//! metric u8                0 = inner product, 1 = squared L2
//! dim    u32
//! count  u64
//! count x { id u64, dim x f32 }
//! ```
//!
//! Ids are stored explicitly so an artifact built with an id map keeps its
//! mapping; the loader checks them against the paired metadata.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::metric::Metric;

const MAGIC: &[u8; 4] = b"RVX1";
/// Refuse headers that would need more than this many floats.
const MAX_FLOATS: u64 = 1 << 32;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("not an index artifact (bad magic)")]
    BadMagic,
    #[error("unknown metric tag {0}")]
    UnknownMetric(u8),
    #[error("implausible header: dim={dim} count={count}")]
    BadHeader { dim: u32, count: u64 },
    #[error("vector {id} has {len} components, header says {dim}")]
    VectorLength { id: u64, len: usize, dim: usize },
    #[error("unexpected bytes after {0} entries")]
    TrailingBytes(u64),
    #[error("artifact truncated: {0}")]
    Truncated(io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Vectors exactly as stored; normalization happens when a collection loads.
#[derive(Debug, Clone, PartialEq)]
pub struct RawIndex {
    pub metric: Metric,
    pub dim: usize,
    pub entries: Vec<(u64, Vec<f32>)>,
}

pub fn read_index(path: &Path) -> Result<RawIndex, ArtifactError> {
    let file = File::open(path)?;
    decode(&mut BufReader::new(file))
}

pub fn write_index<'a, I>(path: &Path, metric: Metric, dim: usize, entries: I) -> Result<(), ArtifactError>
where
    I: ExactSizeIterator<Item = (u64, &'a [f32])>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    encode(&mut writer, metric, dim, entries)?;
    writer.flush()?;
    Ok(())
}

pub fn encode<'a, W, I>(w: &mut W, metric: Metric, dim: usize, entries: I) -> Result<(), ArtifactError>
where
    W: Write,
    I: ExactSizeIterator<Item = (u64, &'a [f32])>,
{
    let dim_u32 = u32::try_from(dim).map_err(|_| ArtifactError::BadHeader { dim: u32::MAX, count: entries.len() as u64 })?;
    w.write_all(MAGIC)?;
    w.write_all(&[metric.tag()])?;
    w.write_all(&dim_u32.to_le_bytes())?;
    w.write_all(&(entries.len() as u64).to_le_bytes())?;
    for (id, vector) in entries {
        if vector.len() != dim {
            return Err(ArtifactError::VectorLength { id, len: vector.len(), dim });
        }
        w.write_all(&id.to_le_bytes())?;
        for x in vector {
            w.write_all(&x.to_le_bytes())?;
        }
    }
    Ok(())
}

pub fn decode<R: Read>(r: &mut R) -> Result<RawIndex, ArtifactError> {
    let mut magic = [0u8; 4];
    read_exact(r, &mut magic)?;
    if &magic != MAGIC {
        return Err(ArtifactError::BadMagic);
    }
    let mut tag = [0u8; 1];
    read_exact(r, &mut tag)?;
    let metric = Metric::from_tag(tag[0]).ok_or(ArtifactError::UnknownMetric(tag[0]))?;
    let mut b4 = [0u8; 4];
    read_exact(r, &mut b4)?;
    let dim = u32::from_le_bytes(b4);
    let mut b8 = [0u8; 8];
    read_exact(r, &mut b8)?;
    let count = u64::from_le_bytes(b8);
    if dim == 0 || count.saturating_mul(u64::from(dim)) > MAX_FLOATS {
        return Err(ArtifactError::BadHeader { dim, count });
    }

    let dim = dim as usize;
    let mut entries = Vec::with_capacity(count.min(1 << 20) as usize);
    for _ in 0..count {
        read_exact(r, &mut b8)?;
        let id = u64::from_le_bytes(b8);
        let mut vector = Vec::with_capacity(dim);
        for _ in 0..dim {
            read_exact(r, &mut b4)?;
            vector.push(f32::from_le_bytes(b4));
        }
        entries.push((id, vector));
    }
    let mut trailing = [0u8; 1];
    if r.read(&mut trailing)? != 0 {
        return Err(ArtifactError::TrailingBytes(count));
    }
    Ok(RawIndex { metric, dim, entries })
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), ArtifactError> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ArtifactError::Truncated(e),
        _ => ArtifactError::Io(e),
    })
}
