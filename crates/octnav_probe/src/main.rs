//! Scene runner for octnav.
//!
//! Builds a navigation volume from a scene file, runs its queries, then
//! replays each scripted geometry update and runs the queries again, reporting
//! which earlier paths the update made stale.

mod scene;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use octnav::{
	BoxField, NavPath, NavSettings, PathResult, PathStatus, QueryService, SolidId, UpdateManager,
};
use tracing_subscriber::EnvFilter;

use scene::{QuerySpec, Scene};

/// Octree navigation scene runner.
#[derive(Parser, Debug)]
#[command(name = "octnav-probe")]
#[command(about = "Builds a navigation volume from a scene and runs its path queries")]
struct Args {
	/// Path to scene TOML file.
	#[arg(short, long)]
	scene: PathBuf,

	/// Settings TOML that replaces the scene's [settings] table.
	#[arg(long)]
	settings: Option<PathBuf>,

	/// Submit queries to the query service instead of planning inline.
	#[arg(long)]
	r#async: bool,

	/// Print every waypoint of successful paths.
	#[arg(short, long)]
	waypoints: bool,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("octnav=info,octnav_probe=info")),
		)
		.init();

	let args = Args::parse();
	println!("Loading scene from: {}", args.scene.display());
	let mut scene = Scene::load(&args.scene)?;
	if let Some(path) = &args.settings {
		scene.settings = NavSettings::load(path).with_context(|| format!("Loading settings: {}", path.display()))?;
	}

	let geometry = Arc::new(BoxField::new());
	let mut solids: Vec<Option<SolidId>> = scene.obstacles.iter().map(|b| Some(geometry.insert(*b))).collect();

	let manager = UpdateManager::build(&scene.settings.volume, geometry.clone()).context("Building volume")?;
	let snapshot = manager.snapshot();
	let stats = snapshot.stats();
	println!(
		"Built volume: {} nodes ({} free, {} blocked leaves), {} links in {}us",
		stats.nodes, stats.free_leaves, stats.blocked_leaves, stats.links, stats.elapsed_us
	);

	let service = QueryService::new(Arc::new(manager), scene.settings.planner, scene.settings.service)?;
	let mut paths = run_queries(&service, &scene.queries, args.r#async, args.waypoints)?;

	for (step, update) in scene.updates.iter().enumerate() {
		let mut regions = Vec::new();
		for &index in &update.remove {
			let id = solids
				.get_mut(index)
				.and_then(Option::take)
				.with_context(|| format!("Update {step}: no live obstacle at index {index}"))?;
			regions.extend(geometry.remove(id));
		}
		for bounds in &update.add {
			solids.push(Some(geometry.insert(*bounds)));
			regions.push(*bounds);
		}

		let report = service
			.manager()
			.notify_many(&regions)
			.with_context(|| format!("Applying update {step}"))?;
		println!(
			"\nUpdate {step}: generation {} ({} reclassified, {} retired, {} created) in {}us",
			report.generation,
			report.stats.reclassified,
			report.stats.retired,
			report.stats.created,
			report.elapsed_us
		);

		for (i, path) in paths.iter().enumerate() {
			if let Some(path) = path {
				if service.manager().is_path_stale(path) {
					println!("  query {i}: path is stale");
				}
			}
		}
		paths = run_queries(&service, &scene.queries, args.r#async, args.waypoints)?;
	}

	let snapshot = service.manager().snapshot();
	for flood in &scene.floods {
		match snapshot.flood_fill(flood.origin, flood.max_distance, flood.max_points) {
			Ok(points) => println!(
				"Flood from {:?} within {}: {} reachable points",
				flood.origin,
				flood.max_distance,
				points.len()
			),
			Err(err) => println!("Flood from {:?}: {err}", flood.origin),
		}
	}

	let load = service.load();
	println!(
		"\nDone: {} succeeded, {} failed, {} cancelled, avg {:.0}us",
		load.completed, load.failed, load.cancelled, load.average_query_us
	);
	Ok(())
}

/// Run every query and print its outcome. Returns the successful paths by index.
fn run_queries(
	service: &QueryService,
	queries: &[QuerySpec],
	submit: bool,
	waypoints: bool,
) -> Result<Vec<Option<NavPath>>> {
	let results: Vec<PathResult> = if submit {
		let tickets: Vec<_> = queries
			.iter()
			.map(|q| service.submit(q.request(), q.priority))
			.collect();
		tickets.iter().map(|t| t.wait()).collect()
	} else {
		queries
			.iter()
			.map(|q| service.find_path(&q.request()))
			.collect::<Result<_, _>>()
			.context("Running queries")?
	};

	let mut paths = Vec::with_capacity(results.len());
	for (i, result) in results.into_iter().enumerate() {
		match (&result.status, &result.path) {
			(PathStatus::Success, Some(path)) => {
				println!(
					"  query {i}: {} waypoints, length {:.2}, {} expansions, {}us (generation {})",
					path.waypoints.len(),
					path.length(),
					path.stats.expansions,
					path.stats.elapsed_us,
					path.generation
				);
				if waypoints {
					for p in &path.waypoints {
						println!("    ({:.3}, {:.3}, {:.3})", p.x, p.y, p.z);
					}
				}
			}
			(status, _) => match &result.error {
				Some(err) => println!("  query {i}: {status:?}: {err}"),
				None => println!("  query {i}: {status:?}"),
			},
		}
		paths.push(result.path);
	}
	Ok(paths)
}
