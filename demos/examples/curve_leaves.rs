// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Build curve leaves for a procedural hair patch and compare box tightness.
//!
//! Each strand is a chain of cubic segments. Runs of consecutive segments of
//! one geometry become leaves, the way a BVH builder would hand them over.
//! For every stored primitive the example compares the volume of its oriented
//! box with the volume of its world-aligned box.
//!
//! Run:
//! - `cargo run -p understory_curve_demos --example curve_leaves`

use glam::{Vec3, Vec4};
use understory_curve_leaf::{
    Curve4Leaf, Curve8Leaf, CurveGeometry, CurveLeaf, CurveScene, CurveSource, LeafArena,
    LeafBlock, PrimRef,
};

/// Strand control points for a gently curling hair rooted at `root`.
fn strand(root: Vec3, phase: f32, segments: usize) -> Vec<Vec4> {
    (0..=segments * 3)
        .map(|i| {
            let t = i as f32 * 0.25;
            let curl = Vec3::new((t + phase).sin(), 0.0, (t + phase).cos()) * 0.15 * t;
            let radius = 0.02 * (1.0 - 0.8 * t / (segments as f32 * 0.75));
            (root + Vec3::new(0.0, t, 0.0) + curl).extend(radius)
        })
        .collect()
}

fn hair_patch() -> CurveScene {
    let mut scene = CurveScene::new();
    for geom_id in 0..3_u32 {
        let mut geometry = CurveGeometry::new();
        for s in 0..40 {
            let s = s as f32;
            let root = Vec3::new((s * 0.37).fract() * 4.0, 0.0, (s * 0.61).fract() * 4.0)
                + Vec3::X * geom_id as f32 * 5.0;
            geometry.add_strand(&strand(root, s * 0.9, 6));
        }
        scene.insert(geom_id, geometry);
    }
    scene
}

/// Runs of at most `run_len` primitives that never cross a geometry boundary.
fn runs(prims: &[PrimRef], run_len: usize) -> Vec<&[PrimRef]> {
    prims
        .chunk_by(|a, b| a.geom_id == b.geom_id)
        .flat_map(|g| g.chunks(run_len))
        .collect()
}

/// Average ratio of oriented box volume to world box volume over a leaf.
fn tightness(scene: &CurveScene, leaf: LeafBlock<'_>) -> (f32, usize) {
    let mut sum = 0.0;
    let mut n = 0;
    for record in leaf.iter() {
        let norm = record.normalization();
        for packed in record.primitives() {
            let Some(curve) = scene.curve(PrimRef::new(record.geom_id(), packed.prim_id)) else {
                continue;
            };
            let world = curve.bounds().size() * norm.scale;
            let axes = packed.space.to_space().axes().map(|a| a.length());
            let local = packed.bounds.to_bounds().size() / Vec3::from_array(axes);
            sum += local.element_product() / world.element_product().max(f32::MIN_POSITIVE);
            n += 1;
        }
    }
    (sum, n)
}

fn build<const M: usize>(scene: &CurveScene, prims: &[PrimRef]) {
    let mut arena = LeafArena::new();
    let mut leaves = Vec::new();
    for run in runs(prims, 2 * M) {
        match CurveLeaf::<M>::create_leaf(&mut arena, run, scene) {
            Ok(handle) => leaves.push(handle),
            Err(err) => eprintln!("skipping run: {err}"),
        }
    }

    let records: usize = leaves.iter().map(|h| h.records).sum();
    let (mut ratio, mut counted) = (0.0, 0);
    for handle in &leaves {
        if let Some(leaf) = arena.leaf(handle) {
            let (sum, n) = tightness(scene, leaf);
            ratio += sum;
            counted += n;
        }
    }
    println!(
        "M = {M}: {} leaves, {records} records, {} bytes ({:.1} bytes/primitive, full record {} bytes)",
        leaves.len(),
        arena.len(),
        arena.len() as f32 / prims.len() as f32,
        CurveLeaf::<M>::max_size(),
    );
    println!(
        "        oriented/world box volume: {:.3} on average over {counted} primitives",
        ratio / counted.max(1) as f32,
    );
}

fn main() {
    let scene = hair_patch();
    let prims = scene.prim_refs();
    println!("hair patch: {} curve segments", prims.len());
    println!(
        "record sizes: {} bytes for 4 primitives, {} bytes for 8",
        Curve4Leaf::max_size(),
        Curve8Leaf::max_size(),
    );
    build::<4>(&scene, &prims);
    build::<8>(&scene, &prims);
}
