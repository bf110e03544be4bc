//! Benchmarks for volume build, path planning and region updates.
//!
//! All workloads use a 128-unit cube cluttered with pillars and floating
//! blocks, which is roughly what a dense indoor/outdoor flight level looks like.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use octnav::{
	build_volume, plan_path, BoxField, CancelToken, DAabb3, NavConfig, PathRequest, PlannerSettings,
	UpdateManager, VolumeId,
};

const SIZE: f64 = 128.0;

fn config(depth: u8) -> NavConfig {
	NavConfig::new(DAabb3::new(DVec3::ZERO, DVec3::splat(SIZE)), depth)
}

/// Pillars on a grid plus a few floating slabs.
fn level() -> BoxField {
	let mut boxes = Vec::new();
	for i in 0..6 {
		for j in 0..6 {
			let x = 8.0 + i as f64 * 20.0;
			let z = 8.0 + j as f64 * 20.0;
			let height = 20.0 + ((i * 7 + j * 3) % 5) as f64 * 20.0;
			boxes.push(DAabb3::new(DVec3::new(x, 0.0, z), DVec3::new(x + 3.0, height, z + 3.0)));
		}
	}
	for k in 0..4 {
		let y = 30.0 + k as f64 * 22.0;
		let x = 10.0 + k as f64 * 25.0;
		boxes.push(DAabb3::new(DVec3::new(x, y, 4.0), DVec3::new(x + 14.0, y + 1.5, 120.0)));
	}
	BoxField::from_boxes(boxes)
}

// ============================================================================
// Build
// ============================================================================

fn bench_build(c: &mut Criterion) {
	let mut group = c.benchmark_group("build");
	group.sample_size(20);
	let geometry = level();

	for depth in [5u8, 6, 7] {
		let config = config(depth);
		group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
			b.iter(|| {
				let volume = build_volume(&config, &geometry, VolumeId::new(), 1).unwrap();
				black_box(volume.stats().nodes)
			})
		});
	}

	group.finish();
}

// ============================================================================
// Planning
// ============================================================================

fn bench_plan(c: &mut Criterion) {
	let mut group = c.benchmark_group("plan");
	let volume = build_volume(&config(7), &level(), VolumeId::new(), 1).unwrap();
	let cancel = CancelToken::new();

	let requests = [
		("short", PathRequest::new(DVec3::new(2.0, 5.0, 2.0), DVec3::new(30.0, 12.0, 30.0))),
		("across", PathRequest::new(DVec3::new(2.0, 5.0, 2.0), DVec3::new(126.0, 5.0, 126.0))),
		(
			"across_radius",
			PathRequest::new(DVec3::new(2.0, 5.0, 2.0), DVec3::new(126.0, 5.0, 126.0)).with_radius(1.0),
		),
	];

	for (name, request) in &requests {
		group.bench_function(*name, |b| {
			b.iter(|| {
				let result = plan_path(&volume, request, &PlannerSettings::DEFAULT, &cancel);
				black_box(result.map(|p| p.waypoints.len()).unwrap_or(0))
			})
		});
	}

	group.finish();
}

// ============================================================================
// Updates
// ============================================================================

/// Toggle one block on and off; each iteration publishes one generation.
fn bench_notify(c: &mut Criterion) {
	let mut group = c.benchmark_group("notify");
	group.sample_size(30);
	let geometry = Arc::new(level());
	let manager = UpdateManager::build(&config(7), geometry.clone()).unwrap();
	let door = DAabb3::new(DVec3::new(60.0, 0.0, 60.0), DVec3::new(64.0, 12.0, 61.0));
	let mut present = None;

	group.bench_function("door_toggle", |b| {
		b.iter(|| {
			match present.take() {
				Some(id) => {
					geometry.remove(id);
				}
				None => present = Some(geometry.insert(door)),
			}
			black_box(manager.notify(door).unwrap().generation)
		})
	});

	group.finish();
}

criterion_group!(benches, bench_build, bench_plan, bench_notify);
criterion_main!(benches);
