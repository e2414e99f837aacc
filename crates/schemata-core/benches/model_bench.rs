//! # Model Benchmarks
//!
//! Performance benchmarks for schemata-core mutations.
//!
//! Run with: `cargo bench -p schemata-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use schemata_core::{
    BackingType, EntityTypeId, Model, Provenance, TypeRegistration, ValueType, export_snapshot,
};
use std::hint::black_box;

fn add(model: &mut Model, name: &str, backing: BackingType) -> EntityTypeId {
    model
        .add_entity_type(name, Some(backing), TypeRegistration::Ordinary, Provenance::Explicit)
        .expect("add")
        .applied()
        .expect("applied")
}

fn keyed(model: &mut Model, name: &str) -> EntityTypeId {
    let id = add(model, name, BackingType::new(name));
    let key = model
        .add_property(id, "Id", ValueType::new("i32"), Provenance::Explicit)
        .expect("prop")
        .applied()
        .expect("applied");
    model
        .set_primary_key(id, &[key], Provenance::Explicit)
        .expect("pk");
    id
}

/// A single inheritance chain `T0 <- T1 <- ... <- Tn`, one property each.
fn create_deep_hierarchy(depth: usize) -> Model {
    let mut model = Model::new();
    let mut ancestors: Vec<String> = Vec::new();
    let mut previous = None;
    for level in 0..depth {
        let name = format!("T{}", level);
        let mut backing = BackingType::new(name.clone());
        for ancestor in ancestors.iter().rev() {
            backing = backing.extends(ancestor.clone());
        }
        let node = add(&mut model, &name, backing);
        model
            .add_property(node, &format!("P{}", level), ValueType::new("i32"), Provenance::Explicit)
            .expect("prop");
        if let Some(base) = previous {
            model
                .set_base_type(node, Some(base), Provenance::Explicit)
                .expect("base");
        }
        ancestors.push(name);
        previous = Some(node);
    }
    model
}

/// One root with `width` direct derived types.
fn create_wide_hierarchy(width: usize) -> Model {
    let mut model = Model::new();
    let root = keyed(&mut model, "Root");
    for i in 0..width {
        let name = format!("Leaf{}", i);
        let leaf = add(&mut model, &name, BackingType::new(name.clone()).extends("Root"));
        model
            .set_base_type(leaf, Some(root), Provenance::Explicit)
            .expect("base");
    }
    model
}

/// One principal referenced by `fan` dependents through conventional keys.
fn create_relationship_fan(fan: usize) -> Model {
    let mut model = Model::new();
    let hub = keyed(&mut model, "Hub");
    for i in 0..fan {
        let spoke = keyed(&mut model, &format!("Spoke{}", i));
        model
            .add_relationship(spoke, hub, &[], Some("Hub"), Provenance::Convention)
            .expect("fk");
    }
    model
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_deep_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_hierarchy");

    for depth in [10, 50, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            b.iter(|| black_box(create_deep_hierarchy(depth)));
        });
    }

    group.finish();
}

fn bench_wide_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_hierarchy");

    for width in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, &width| {
            b.iter(|| black_box(create_wide_hierarchy(width)));
        });
    }

    group.finish();
}

fn bench_relationship_fan(c: &mut Criterion) {
    let mut group = c.benchmark_group("relationship_fan");

    for fan in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(fan), fan, |b, &fan| {
            b.iter(|| black_box(create_relationship_fan(fan)));
        });
    }

    group.finish();
}

fn bench_base_type_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("base_type_toggle");

    for width in [10, 100].iter() {
        let model = create_wide_hierarchy(*width);
        let root = model.find_entity_type("Root").expect("root");
        let leaf = model.find_entity_type("Leaf0").expect("leaf");

        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, _| {
            b.iter(|| {
                let mut model = model.clone();
                model
                    .set_base_type(leaf, None, Provenance::Explicit)
                    .expect("detach");
                model
                    .set_base_type(leaf, Some(root), Provenance::Explicit)
                    .expect("attach");
                black_box(model)
            });
        });
    }

    group.finish();
}

fn bench_export_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_snapshot");

    for fan in [100, 500].iter() {
        let model = create_relationship_fan(*fan);

        group.bench_with_input(BenchmarkId::from_parameter(fan), fan, |b, _| {
            b.iter(|| black_box(export_snapshot(&model)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_deep_hierarchy,
    bench_wide_hierarchy,
    bench_relationship_fan,
    bench_base_type_toggle,
    bench_export_snapshot,
);
criterion_main!(benches);
