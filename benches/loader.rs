use criterion::{criterion_group, criterion_main, Criterion};
use filterkit::prelude::*;
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::Arc;
use std::time::Duration;

fn photo() -> SharedImage {
    let img = RgbaImage::from_fn(128, 128, |x, y| Rgba([(x * 2) as u8, (y * 2) as u8, 96, 255]));
    SharedImage::new(DynamicImage::ImageRgba8(img))
}

fn bench_loader(c: &mut Criterion) {
    let catalog = Arc::new(Catalog::with_builtins());
    let keys = catalog.filters("color");

    for workers in [1, 4] {
        let loader = AsyncFilterLoader::new(
            catalog.clone(),
            Arc::new(RenderCache::new(64)),
            LoaderOptions::new().with_workers(workers).with_reuse_cached(false),
        )
        .unwrap();
        let input = photo();
        c.bench_function(&format!("color category 128px, {} workers", workers), |b| {
            b.iter(|| {
                loader.load(input.clone(), keys.clone(), |_| {}, |_| {});
                loader.run_until_idle(Duration::from_secs(30))
            })
        });
    }

    let loader = AsyncFilterLoader::new(catalog.clone(), Arc::new(RenderCache::new(64)), LoaderOptions::new()).unwrap();
    let input = photo();
    loader.load(input.clone(), keys.clone(), |_| {}, |_| {});
    loader.run_until_idle(Duration::from_secs(30));
    c.bench_function("color category 128px, cached", |b| {
        b.iter(|| {
            loader.load(input.clone(), keys.clone(), |_| {}, |_| {});
            loader.run_until_idle(Duration::from_secs(30))
        })
    });
}

criterion_group!(benches, bench_loader);
criterion_main!(benches);
