//! Benchmark template compilation, loading and rendering time.

use criterion::{criterion_group, criterion_main, Criterion};

use benches::{context, Site, PAGE};
use trellis::{Candidates, TemplateEngine, View};

criterion_main! { benches }
criterion_group! { benches, bench_compile, bench_load, bench_render }

/// Benchmarks the time taken to compile a template.
fn bench_compile(c: &mut Criterion) {
    let site = Site::new();
    let (engine, _services) = site.engine();
    let source = repeat(PAGE, 50);
    c.bench_function("compile", |b| {
        b.iter(|| engine.compile(source.as_str()).unwrap());
    });
}

/// Benchmarks the time taken to load a template by name, from the memory
/// cache and from the disk cache.
fn bench_load(c: &mut Criterion) {
    let mut g = c.benchmark_group("load");
    let site = Site::new();

    g.bench_function("memory", |b| {
        let (engine, _services) = site.engine();
        engine.load("Page.twig").unwrap();
        b.iter(|| engine.load("Page.twig").unwrap());
    });

    g.bench_function("disk", |b| {
        b.iter_batched(
            || site.engine(),
            |(engine, _services)| {
                engine.load("Page.twig").unwrap();
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Benchmarks the time taken to render the selected page through a view.
fn bench_render(c: &mut Criterion) {
    let site = Site::new();
    let (engine, services) = site.engine();
    let mut view = View::new(&engine);
    view.set_template(&Candidates::from("Page")).unwrap();
    let model = context::page(150);
    let overlay = context::overlay();
    c.bench_function("render", |b| {
        b.iter(|| {
            services.requirements.clear();
            view.render(&model, &overlay).unwrap()
        });
    });
}

fn repeat(source: &str, n: usize) -> String {
    let mut s = String::new();
    for _ in 0..n {
        s.push_str(source);
    }
    s
}
