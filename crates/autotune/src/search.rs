//! Matrix instruction search.
//!
//! For a base instruction and a problem shape, enumerate the wave-level tile
//! decompositions that fit one compute unit's share of the output. Candidates
//! come out in a fixed priority order: finer compute-unit partitioning first,
//! larger wave splits first. Callers that only want one candidate per shape
//! take the first element.

use gemmtune_problem::{InstructionCandidate, InstructionTemplate, ProblemShape};

/// Largest per-compute-unit tile extent along M or N.
pub const MAX_TILE_EXTENT: usize = 256;
/// Largest wave tile (in instructions) along M or N.
pub const MAX_WAVE_TILE: usize = 32;
/// Wave split exponents, tried largest first.
const WAVE_SPLIT_EXPONENTS: [u32; 3] = [2, 1, 0];

/// Lazily enumerates instruction candidates for `shape` on `compute_units` CUs.
///
/// Batch and K do not influence the search. The sequence is finite and the
/// same inputs always produce the same sequence.
pub fn search_instructions(
    template: InstructionTemplate,
    shape: ProblemShape,
    compute_units: usize,
) -> impl Iterator<Item = InstructionCandidate> {
    let batch_levels = template.max_batch_multiplier.max(1).ilog2();

    (0..=batch_levels).flat_map(move |level| {
        let batch_multiplier = 1usize << level;
        (1..=compute_units)
            .rev()
            .filter_map(move |tiles_m| wave_tile(shape.m, tiles_m, template.m))
            .flat_map(move |wave_tile_m| {
                (1..=compute_units)
                    .rev()
                    .filter_map(move |tiles_n| wave_tile(shape.n, tiles_n, template.n))
                    .flat_map(move |wave_tile_n| {
                        wave_splits(wave_tile_m).flat_map(move |(tile_m, split_m)| {
                            wave_splits(wave_tile_n).map(move |(tile_n, split_n)| {
                                InstructionCandidate {
                                    instr_m: template.m,
                                    instr_n: template.n,
                                    instr_k: template.k,
                                    batch_multiplier,
                                    wave_tile_m: tile_m,
                                    wave_tile_n: tile_n,
                                    wave_split_m: split_m,
                                    wave_split_n: split_n,
                                }
                            })
                        })
                    })
            })
    })
}

/// Instructions needed to cover one tile of `extent / tiles`, or `None` when
/// the tile is empty.
fn wave_tile(extent: usize, tiles: usize, instr: usize) -> Option<usize> {
    let tile_extent = (extent / tiles).min(MAX_TILE_EXTENT);
    let wave_tile = tile_extent.div_ceil(instr);
    (wave_tile > 0).then_some(wave_tile)
}

/// `(wave_tile / split, split)` pairs whose wave tile lies in `1..=32`.
fn wave_splits(wave_tile: usize) -> impl Iterator<Item = (usize, usize)> {
    WAVE_SPLIT_EXPONENTS.into_iter().filter_map(move |exp| {
        let split = 1usize << exp;
        let tile = wave_tile / split;
        (1..=MAX_WAVE_TILE).contains(&tile).then_some((tile, split))
    })
}
