//! Benchmarks de la vectorisation et de l'érosion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geo::MultiPolygon;
use landcover::raster::polygonize::polygonize;
use landcover::raster::GeoTransform;
use landcover::{GeoEngine, GeometryEngine, RasterLayer};

/// Raster en damier de blocs carrés de `block` pixels, 5 codes
fn synthetic_raster(size: usize, block: usize) -> RasterLayer {
    let cells = (0..size * size)
        .map(|i| {
            let (row, col) = (i / size, i % size);
            Some(((row / block + col / block) % 5) as i64 * 10)
        })
        .collect();
    RasterLayer::new(
        "bench",
        size,
        size,
        cells,
        GeoTransform {
            origin_x: 0.0,
            origin_y: (size * 10) as f64,
            pixel_width: 10.0,
            pixel_height: 10.0,
        },
    )
    .unwrap()
}

fn bench_polygonize(c: &mut Criterion) {
    let mut group = c.benchmark_group("polygonize");
    for size in [128usize, 512] {
        let raster = synthetic_raster(size, 16);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &raster, |b, raster| {
            b.iter(|| black_box(polygonize(black_box(raster), true)))
        });
    }
    group.finish();
}

fn bench_erosion(c: &mut Criterion) {
    let engine = GeoEngine::new();
    let raster = synthetic_raster(256, 32);
    let polygons: Vec<MultiPolygon> = polygonize(&raster, true)
        .into_iter()
        .map(|region| MultiPolygon::new(vec![region.polygon]))
        .collect();

    let mut group = c.benchmark_group("erosion");
    group.throughput(Throughput::Elements(polygons.len() as u64));
    group.bench_function("buffer_-50", |b| {
        b.iter(|| {
            for polygon in &polygons {
                black_box(engine.buffer(black_box(polygon), -50.0));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_polygonize, bench_erosion);
criterion_main!(benches);
