use crate::error::{ensure_same_shape, Result};
use crate::signal::Shape;
use ndarray::parallel::prelude::*;
use ndarray::{Array3, ArrayView2, ArrayViewMut2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// A real-valued 3D volume, one `f32` sample per voxel.
///
/// The samples are stored in standard (C) layout indexed `[z, y, x]`, so each
/// z-plane is one contiguous `nx * ny` slice. Every constructor normalises the
/// layout; nothing else in the crate has to care about strides.
#[derive(Clone, Debug)]
pub struct RealBuffer {
    name: String,
    data: Array3<f32>,
}

/// Summary statistics of a buffer, accumulated in `f64`.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct BufferStats {
    pub min: f32,
    pub max: f32,
    pub mean: f64,
    pub stdev: f64,
    pub sum: f64,
    pub norm: f64,
}

#[derive(Clone, Copy)]
struct Accumulator {
    min: f32,
    max: f32,
    sum: f64,
    sum_sq: f64,
    count: usize,
}

impl Accumulator {
    fn empty() -> Self {
        Accumulator {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            sum: 0.0,
            sum_sq: 0.0,
            count: 0,
        }
    }

    fn push(mut self, v: f32) -> Self {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.sum += v as f64;
        self.sum_sq += (v as f64) * (v as f64);
        self.count += 1;
        self
    }

    fn merge(self, other: Self) -> Self {
        Accumulator {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
            sum_sq: self.sum_sq + other.sum_sq,
            count: self.count + other.count,
        }
    }
}

impl RealBuffer {
    pub fn zeros(name: &str, shape: Shape) -> Self {
        RealBuffer {
            name: name.to_string(),
            data: Array3::zeros(shape.dim()),
        }
    }

    /// Wraps an existing `[z, y, x]` array.
    pub fn from_array(name: &str, data: Array3<f32>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        RealBuffer {
            name: name.to_string(),
            data,
        }
    }

    /// Builds a buffer by evaluating `f(x, y, z)` at every voxel.
    pub fn from_fn<F>(name: &str, shape: Shape, f: F) -> Self
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        RealBuffer {
            name: name.to_string(),
            data: Array3::from_shape_fn(shape.dim(), |(z, y, x)| f(x, y, z)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn shape(&self) -> Shape {
        Shape::from_dim(self.data.dim())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    pub fn into_array(self) -> Array3<f32> {
        self.data
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[[z, y, x]]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f32) {
        self.data[[z, y, x]] = value;
    }

    pub fn plane(&self, z: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), z)
    }

    pub fn plane_mut(&mut self, z: usize) -> ArrayViewMut2<'_, f32> {
        self.data.index_axis_mut(Axis(0), z)
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Copies the samples of `other` into this buffer.
    pub fn copy_from(&mut self, other: &RealBuffer) -> Result<()> {
        ensure_same_shape(self.shape(), other.shape())?;
        self.data.assign(&other.data);
        Ok(())
    }

    pub fn stats(&self) -> BufferStats {
        let acc = self
            .data
            .par_iter()
            .fold(Accumulator::empty, |acc, &v| acc.push(v))
            .reduce(Accumulator::empty, Accumulator::merge);
        if acc.count == 0 {
            return BufferStats::default();
        }
        let n = acc.count as f64;
        let mean = acc.sum / n;
        let variance = (acc.sum_sq / n - mean * mean).max(0.0);
        BufferStats {
            min: acc.min,
            max: acc.max,
            mean,
            stdev: variance.sqrt(),
            sum: acc.sum,
            norm: acc.sum_sq.sqrt(),
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.par_iter().map(|&v| v as f64).sum()
    }

    pub fn norm(&self) -> f64 {
        self.data
            .par_iter()
            .map(|&v| (v as f64) * (v as f64))
            .sum::<f64>()
            .sqrt()
    }

    pub fn dot(&self, other: &RealBuffer) -> Result<f64> {
        ensure_same_shape(self.shape(), other.shape())?;
        let mut acc = 0.0f64;
        Zip::from(&self.data)
            .and(&other.data)
            .for_each(|&a, &b| acc += (a as f64) * (b as f64));
        Ok(acc)
    }

    /// Euclidean distance `||self - other||`.
    pub fn distance(&self, other: &RealBuffer) -> Result<f64> {
        ensure_same_shape(self.shape(), other.shape())?;
        let mut acc = 0.0f64;
        Zip::from(&self.data).and(&other.data).for_each(|&a, &b| {
            let d = (a - b) as f64;
            acc += d * d;
        });
        Ok(acc.sqrt())
    }

    /// Position `(x, y, z)` of the largest sample.
    pub fn argmax(&self) -> (usize, usize, usize) {
        let mut best = (0, 0, 0);
        let mut max = f32::NEG_INFINITY;
        for ((z, y, x), &v) in self.data.indexed_iter() {
            if v > max {
                max = v;
                best = (x, y, z);
            }
        }
        best
    }

    pub fn scale(&mut self, factor: f32) {
        self.data.par_mapv_inplace(|v| v * factor);
    }

    pub fn add_scalar(&mut self, value: f32) {
        self.data.par_mapv_inplace(|v| v + value);
    }

    pub fn clamp(&mut self, min: f32, max: f32) {
        self.data.par_mapv_inplace(|v| v.clamp(min, max));
    }

    pub fn clamp_min(&mut self, min: f32) {
        self.data.par_mapv_inplace(|v| v.max(min));
    }

    /// `self += other`
    pub fn plus(&mut self, other: &RealBuffer) -> Result<()> {
        ensure_same_shape(self.shape(), other.shape())?;
        Zip::from(&mut self.data)
            .and(&other.data)
            .par_for_each(|a, &b| *a += b);
        Ok(())
    }

    /// `self -= other`
    pub fn minus(&mut self, other: &RealBuffer) -> Result<()> {
        ensure_same_shape(self.shape(), other.shape())?;
        Zip::from(&mut self.data)
            .and(&other.data)
            .par_for_each(|a, &b| *a -= b);
        Ok(())
    }

    /// `self *= other`, voxel by voxel.
    pub fn times(&mut self, other: &RealBuffer) -> Result<()> {
        ensure_same_shape(self.shape(), other.shape())?;
        Zip::from(&mut self.data)
            .and(&other.data)
            .par_for_each(|a, &b| *a *= b);
        Ok(())
    }

    /// `self += factor * other`
    pub fn plus_scaled(&mut self, factor: f32, other: &RealBuffer) -> Result<()> {
        ensure_same_shape(self.shape(), other.shape())?;
        Zip::from(&mut self.data)
            .and(&other.data)
            .par_for_each(|a, &b| *a += factor * b);
        Ok(())
    }

    /// Replaces `self` by `numerator / self`, where denominators below
    /// `epsilon` produce zero instead of a blow-up.
    pub fn reciprocal_ratio(&mut self, numerator: &RealBuffer, epsilon: f32) -> Result<()> {
        ensure_same_shape(self.shape(), numerator.shape())?;
        Zip::from(&mut self.data)
            .and(&numerator.data)
            .par_for_each(|d, &n| {
                *d = if *d < epsilon { 0.0 } else { n / *d };
            });
        Ok(())
    }

    /// Circularly shifts the volume so that voxel `(x, y, z)` moves to
    /// `(x + sx, y + sy, z + sz)` modulo the shape.
    pub fn circular_shift(&self, sx: isize, sy: isize, sz: isize) -> RealBuffer {
        let shape = self.shape();
        let wrap = |i: usize, s: isize, n: usize| -> usize {
            let n = n as isize;
            ((i as isize - s) % n + n) as usize % n as usize
        };
        let data = Array3::from_shape_fn(shape.dim(), |(z, y, x)| {
            self.data[[
                wrap(z, sz, shape.nz),
                wrap(y, sy, shape.ny),
                wrap(x, sx, shape.nx),
            ]]
        });
        RealBuffer {
            name: self.name.clone(),
            data,
        }
    }

    /// True when every sample is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(shape: Shape) -> RealBuffer {
        RealBuffer::from_fn("ramp", shape, |x, y, z| {
            (x + 10 * y + 100 * z) as f32
        })
    }

    #[test]
    fn test_stats_of_ramp() {
        let buffer = ramp(Shape::new(2, 2, 2));
        let stats = buffer.stats();
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 111.0);
        assert_abs_diff_eq!(stats.mean, 55.5, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.sum, 444.0, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.norm, buffer.norm(), epsilon = 1e-9);
    }

    #[test]
    fn test_indexing_is_x_y_z() {
        let buffer = ramp(Shape::new(4, 3, 2));
        assert_eq!(buffer.shape(), Shape::new(4, 3, 2));
        assert_eq!(buffer.get(3, 2, 1), 123.0);
        assert_eq!(buffer.plane(1).dim(), (3, 4));
    }

    #[test]
    fn test_circular_shift_wraps_around() {
        let shape = Shape::new(4, 4, 2);
        let mut buffer = RealBuffer::zeros("impulse", shape);
        buffer.set(1, 2, 1, 1.0);
        let shifted = buffer.circular_shift(-1, -2, -1);
        assert_eq!(shifted.get(0, 0, 0), 1.0);
        assert_eq!(shifted.argmax(), (0, 0, 0));
        let back = shifted.circular_shift(1, 2, 1);
        assert_eq!(back.get(1, 2, 1), 1.0);
        let wrapped = buffer.circular_shift(3, 2, 1);
        assert_eq!(wrapped.get(0, 0, 0), 1.0);
    }

    #[test]
    fn test_reciprocal_ratio_zeroes_small_denominators() {
        let shape = Shape::new(3, 1, 1);
        let numerator = RealBuffer::from_fn("y", shape, |_, _, _| 2.0);
        let mut denominator = RealBuffer::from_fn("d", shape, |x, _, _| x as f32 * 0.5);
        denominator.reciprocal_ratio(&numerator, 1e-6).unwrap();
        assert_eq!(denominator.get(0, 0, 0), 0.0);
        assert_abs_diff_eq!(denominator.get(1, 0, 0), 4.0);
        assert_abs_diff_eq!(denominator.get(2, 0, 0), 2.0);
        assert!(denominator.is_finite());
    }

    #[test]
    fn test_elementwise_ops_reject_other_shapes() {
        let mut a = RealBuffer::zeros("a", Shape::new(2, 2, 2));
        let b = RealBuffer::zeros("b", Shape::new(2, 2, 1));
        assert!(a.plus(&b).is_err());
        assert!(a.dot(&b).is_err());
    }
}
