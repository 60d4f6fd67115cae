//! Loading and saving volumes.

use crate::error::{DeconvError, Result};
use crate::signal::RealBuffer;
use ndarray::{Array3, ArrayD, Ix3};
use ndarray_npy::{read_npy, write_npy, ReadNpyError, ReadableElement};
use num_traits::{Bounded, NumCast};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;

/// Sample type written to disk.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SampleType {
    #[default]
    Float32,
    /// Rescaled from the buffer's `[min, max]` to `[-32768, 32767]`.
    Int16,
    /// Rescaled from the buffer's `[min, max]` to `[0, 255]`.
    UInt8,
}

impl Display for SampleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleType::Float32 => write!(f, "float32"),
            SampleType::Int16 => write!(f, "int16"),
            SampleType::UInt8 => write!(f, "uint8"),
        }
    }
}

/// Array I/O provider used by the CLI and by snapshot outputs.
pub trait ArrayIo: Send + Sync + Debug {
    fn load(&self, path: &Path) -> Result<RealBuffer>;
    fn save(&self, buffer: &RealBuffer, path: &Path, sample_type: SampleType) -> Result<()>;
}

/// `.npy` files holding 2D `(y, x)` or 3D `(z, y, x)` arrays.
#[derive(Debug, Default, Clone, Copy)]
pub struct NpyIo;

/// Reads `path` as an array of `T`, or `None` if the file holds another
/// element type.
fn try_read<T, F>(path: &Path, convert: F) -> Result<Option<ArrayD<f32>>>
where
    T: ReadableElement + Copy,
    F: Fn(T) -> f32,
{
    match read_npy::<_, ArrayD<T>>(path) {
        Ok(array) => Ok(Some(array.mapv(convert))),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn read_any(path: &Path) -> Result<ArrayD<f32>> {
    if let Some(a) = try_read::<f32, _>(path, |v| v)? {
        return Ok(a);
    }
    if let Some(a) = try_read::<f64, _>(path, |v| v as f32)? {
        return Ok(a);
    }
    if let Some(a) = try_read::<i16, _>(path, |v| v as f32)? {
        return Ok(a);
    }
    if let Some(a) = try_read::<u16, _>(path, |v| v as f32)? {
        return Ok(a);
    }
    if let Some(a) = try_read::<u8, _>(path, |v| v as f32)? {
        return Ok(a);
    }
    Err(DeconvError::InvalidInput(format!(
        "{}: unsupported element type",
        path.display()
    )))
}

/// Maps the buffer from its `[min, max]` onto the full range of `T`;
/// constant buffers map to zero.
fn quantize<T>(buffer: &RealBuffer) -> Array3<T>
where
    T: Bounded + NumCast + Copy + Default,
{
    let lo = T::min_value().to_f32().unwrap_or(0.0);
    let hi = T::max_value().to_f32().unwrap_or(0.0);
    let stats = buffer.stats();
    let range = stats.max - stats.min;
    if range <= 0.0 {
        return Array3::from_elem(buffer.shape().dim(), T::default());
    }
    let scale = (hi - lo) / range;
    buffer.data().mapv(|v| {
        let q = ((v - stats.min) * scale + lo).round().clamp(lo, hi);
        T::from(q).unwrap_or_default()
    })
}

impl ArrayIo for NpyIo {
    fn load(&self, path: &Path) -> Result<RealBuffer> {
        let array = read_any(path)?;
        let array = match array.ndim() {
            2 => {
                let (ny, nx) = (array.shape()[0], array.shape()[1]);
                array.into_shape_with_order((1, ny, nx)).map_err(|err| {
                    DeconvError::InvalidInput(format!("{}: {err}", path.display()))
                })?
            }
            3 => array.into_dimensionality::<Ix3>().map_err(|err| {
                DeconvError::InvalidInput(format!("{}: {err}", path.display()))
            })?,
            n => {
                return Err(DeconvError::InvalidInput(format!(
                    "{}: expected a 2D or 3D array, found {n} dimensions",
                    path.display()
                )))
            }
        };
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "volume".to_string());
        log::info!("loaded {} ({:?})", path.display(), array.dim());
        Ok(RealBuffer::from_array(&name, array))
    }

    fn save(&self, buffer: &RealBuffer, path: &Path, sample_type: SampleType) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        match sample_type {
            SampleType::Float32 => write_npy(path, buffer.data())?,
            SampleType::Int16 => {
                write_npy(path, &quantize::<i16>(buffer))?
            }
            SampleType::UInt8 => {
                write_npy(path, &quantize::<u8>(buffer))?
            }
        }
        log::debug!("saved {} as {sample_type}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Shape;
    use ndarray::Array2;

    fn ramp() -> RealBuffer {
        RealBuffer::from_fn("ramp", Shape::new(4, 3, 2), |x, y, z| {
            (x + 4 * y + 12 * z) as f32
        })
    }

    #[test]
    fn test_float32_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.npy");
        NpyIo.save(&ramp(), &path, SampleType::Float32).unwrap();
        let loaded = NpyIo.load(&path).unwrap();
        assert_eq!(loaded.data(), ramp().data());
        assert_eq!(loaded.name(), "ramp");
    }

    #[test]
    fn test_uint8_spans_full_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ramp8.npy");
        NpyIo.save(&ramp(), &path, SampleType::UInt8).unwrap();
        let raw: Array3<u8> = read_npy(&path).unwrap();
        assert_eq!(raw[[0, 0, 0]], 0);
        assert_eq!(raw[[1, 2, 3]], 255);
        // integer input is read back as float
        let loaded = NpyIo.load(&path).unwrap();
        assert_eq!(loaded.get(3, 2, 1), 255.0);
    }

    #[test]
    fn test_int16_and_constant_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp16.npy");
        NpyIo.save(&ramp(), &path, SampleType::Int16).unwrap();
        let raw: Array3<i16> = read_npy(&path).unwrap();
        assert_eq!(raw[[0, 0, 0]], i16::MIN);
        assert_eq!(raw[[1, 2, 3]], i16::MAX);

        let flat = RealBuffer::from_fn("flat", Shape::new(2, 2, 2), |_, _, _| 7.0);
        let path = dir.path().join("flat.npy");
        NpyIo.save(&flat, &path, SampleType::Int16).unwrap();
        let raw: Array3<i16> = read_npy(&path).unwrap();
        assert!(raw.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_2d_arrays_load_as_single_plane() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plane.npy");
        let plane = Array2::from_shape_fn((3, 5), |(y, x)| (x + y) as f64);
        write_npy(&path, &plane).unwrap();
        let loaded = NpyIo.load(&path).unwrap();
        assert_eq!(loaded.shape(), Shape::new(5, 3, 1));
        assert_eq!(loaded.get(4, 2, 0), 6.0);
    }
}
