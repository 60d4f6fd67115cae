//! Criterion benchmarks of the spectral hot paths.
//!
//! Run with: cargo bench
//! Run specific: cargo bench -- transform

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spectral_deconv::config::RunConfig;
use spectral_deconv::controller::StoppingPolicy;
use spectral_deconv::signal::{BufferTracker, RealBuffer, Shape};
use spectral_deconv::spectral::{algebra, Workspace};
use spectral_deconv::Deconvolution;
use std::sync::Arc;

fn volume(shape: Shape) -> RealBuffer {
    RealBuffer::from_fn("volume", shape, |x, y, z| {
        1.0 + ((x as f32 * 0.37).sin() * (y as f32 * 0.21).cos() + z as f32 * 0.05).abs()
    })
}

fn gaussian_psf(shape: Shape, sigma: f32) -> RealBuffer {
    let (cx, cy, cz) = (
        (shape.nx / 2) as f32,
        (shape.ny / 2) as f32,
        (shape.nz / 2) as f32,
    );
    RealBuffer::from_fn("psf", shape, |x, y, z| {
        let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2) + (z as f32 - cz).powi(2);
        (-d2 / (2.0 * sigma * sigma)).exp()
    })
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");

    for n in [16, 32, 64] {
        let shape = Shape::new(n, n, n / 2);
        let x = volume(shape);
        let mut ws = Workspace::for_shape(shape, Arc::new(BufferTracker::new()), 1e-6);
        group.throughput(Throughput::Elements(shape.len() as u64));

        group.bench_with_input(BenchmarkId::new("forward", n), &n, |b, _| {
            b.iter(|| {
                let spectrum = ws.forward(black_box(&x), "X").unwrap();
                ws.release_complex(spectrum);
            })
        });

        let spectrum = ws.forward(&x, "X").unwrap();
        group.bench_with_input(BenchmarkId::new("inverse", n), &n, |b, _| {
            b.iter(|| {
                let back = ws.inverse(black_box(&spectrum), "x").unwrap();
                ws.release_real(back);
            })
        });
        ws.release_complex(spectrum);
    }

    group.finish();
}

fn bench_landweber_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("landweber_step");

    for n in [32, 64] {
        let shape = Shape::new(n, n, n / 2);
        let mut ws = Workspace::for_shape(shape, Arc::new(BufferTracker::new()), 1e-6);
        let h = ws.forward(&gaussian_psf(shape, 2.0), "H").unwrap();
        let y = ws.forward(&volume(shape), "Y").unwrap();
        let a = algebra::delta(1.0, &h, ws.complex("A")).unwrap();
        let g = algebra::multiply_conjugate(&h, ws.duplicate_complex("G", &y)).unwrap();
        let mut x = ws.duplicate_complex("X", &y);
        group.throughput(Throughput::Elements(shape.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| algebra::fixed_point_assign(black_box(&mut x), &a, &g).unwrap())
        });
    }

    group.finish();
}

fn bench_richardson_lucy(c: &mut Criterion) {
    let mut group = c.benchmark_group("richardson_lucy");
    group.sample_size(10);

    let shape = Shape::new(64, 64, 16);
    let image = volume(shape);
    let psf = gaussian_psf(Shape::new(15, 15, 7), 2.0);
    let config = RunConfig {
        algorithm: "RL".to_string(),
        stopping: StoppingPolicy {
            iterations: 5,
            ..StoppingPolicy::default()
        },
        ..RunConfig::default()
    };

    group.bench_function("5_iterations_64x64x16", |b| {
        b.iter(|| {
            let mut run = Deconvolution::new(config.clone()).unwrap();
            run.run(black_box(&image), &psf, None).unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_transform,
    bench_landweber_step,
    bench_richardson_lucy
);
criterion_main!(benches);
