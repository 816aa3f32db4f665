//! Reference noise shared by the CPU path and the compute shader.
//!
//! Hashed value noise on an integer lattice with quintic fade, summed into fBm.
//! `density.wgsl` mirrors every function here operation for operation; keep the
//! two in sync so both backends produce the same field.

use crate::{
    settings::{DensityFieldSettings, ShapeMode},
    types::{Point, Value},
};

/// Downward bias of the terrain field per unit of height.
pub const GROUND_GRADIENT: Value = 1.2;

const HASH_PRIMES: [u32; 4] = [0x8da6_b343, 0xd816_3841, 0xcb1a_b31f, 0x1656_67b1];

/// Hashes an integer lattice point.
#[inline]
pub fn hash4(cell: [i32; 4], seed: u32) -> u32 {
    let mut h = cell
        .iter()
        .zip(HASH_PRIMES)
        .fold(seed, |h, (&c, prime)| h ^ (c as u32).wrapping_mul(prime));
    h = (h ^ (h >> 16)).wrapping_mul(0x7feb_352d);
    h = (h ^ (h >> 15)).wrapping_mul(0x846c_a68b);
    h ^ (h >> 16)
}

/// Value in `[-1, 1]` attached to a lattice point.
#[inline]
pub fn lattice_value(cell: [i32; 4], seed: u32) -> Value {
    (hash4(cell, seed) & 0x00ff_ffff) as Value / 16_777_215.0 * 2.0 - 1.0
}

#[inline]
fn fade(t: Value) -> Value {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// 4D value noise in `[-1, 1]`, continuous across lattice cells.
pub fn value_noise(p: [Value; 4], seed: u32) -> Value {
    let cell = p.map(Value::floor);
    let base = cell.map(|c| c as i32);
    let weights: [Value; 4] = std::array::from_fn(|axis| fade(p[axis] - cell[axis]));

    let mut sum = 0.0;
    for corner in 0..16 {
        let mut lattice = base;
        let mut weight = 1.0;
        for axis in 0..4 {
            if corner & (1 << axis) != 0 {
                lattice[axis] += 1;
                weight *= weights[axis];
            } else {
                weight *= 1.0 - weights[axis];
            }
        }
        sum += weight * lattice_value(lattice, seed);
    }
    sum
}

/// Fractal sum of [`value_noise`] layers at `position`, animated along the fourth axis.
pub fn fbm(position: &Point, time: Value, settings: &DensityFieldSettings) -> Value {
    let mut amplitude = settings.amplitude;
    let mut frequency = settings.frequency;
    let w = time * settings.time_scale;
    let mut value = 0.0;

    for _ in 0..settings.octaves {
        let sample = [
            position.x * frequency,
            position.y * frequency,
            position.z * frequency,
            w,
        ];
        value += value_noise(sample, settings.seed) * amplitude;
        amplitude *= settings.persistence;
        frequency *= settings.lacunarity;
    }

    value
}

/// Folds `value` around zero into ridged peaks: `max(0, 1 - |v|)^sharpness`.
///
/// A sharpness of 0 flattens everything to 1. Where `r` is 0 the result is 0, also
/// for negative sharpness, which would otherwise be infinite.
#[inline]
pub fn ridge(value: Value, sharpness: Value) -> Value {
    if sharpness == 0.0 {
        return 1.0;
    }
    let r = (1.0 - value.abs()).max(0.0);
    if r <= 0.0 { 0.0 } else { r.powf(sharpness) }
}

/// Density of the ridged terrain at a normalised position.
pub fn terrain_density(position: &Point, time: Value, settings: &DensityFieldSettings) -> Value {
    let ridged = ridge(fbm(position, time, settings), settings.ridge_sharpness);
    ridged - position.y * GROUND_GRADIENT
}

/// Density of `mode` at a normalised position.
#[inline]
pub fn density(
    mode: ShapeMode,
    position: &Point,
    time: Value,
    settings: &DensityFieldSettings,
) -> Value {
    match mode {
        ShapeMode::Terrain => terrain_density(position, time, settings),
        ShapeMode::Sphere { radius } => position.coords.norm() - radius,
    }
}
