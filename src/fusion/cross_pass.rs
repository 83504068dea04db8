use tracing::debug;

use crate::core::config::FusionConfig;
use crate::core::confidence::by_confidence_desc;
use crate::core::model::Equipment;
use crate::fusion::compare::{same_tag, size_class};

/// Dedup radius for one candidate: the base tolerance scaled by its size class.
pub fn tolerance(equipment: &Equipment, config: &FusionConfig) -> f64 {
    config.cross_pass_base_tolerance_px * size_class(equipment).multiplier(&config.size_multipliers)
}

/// Reconciles a whole-page pass with a tiled pass of the same page.
///
/// Tagged candidates are visited first, highest confidence first. A tagged
/// candidate is a duplicate of a kept one with the same tag within the larger
/// of their tolerances; an untagged one is a duplicate of any kept candidate
/// within that radius. Distinct tags never merge.
pub fn dedup_passes(tiled: &[Equipment], global: &[Equipment], config: &FusionConfig) -> Vec<Equipment> {
    let pool: Vec<&Equipment> = tiled.iter().chain(global.iter()).collect();
    let mut order: Vec<usize> = (0..pool.len()).collect();
    order.sort_by(|&a, &b| {
        pool[b]
            .has_tag()
            .cmp(&pool[a].has_tag())
            .then_with(|| by_confidence_desc(pool[a].confidence, pool[b].confidence))
    });

    let mut kept: Vec<(&Equipment, f64)> = Vec::with_capacity(pool.len());
    for idx in order {
        let candidate = pool[idx];
        let tol = tolerance(candidate, config);
        let center = candidate.center();

        let duplicate = kept.iter().any(|(k, k_tol)| {
            if k.page != candidate.page || center.distance(&k.center()) > tol.max(*k_tol) {
                return false;
            }
            match candidate.tag.as_deref() {
                Some(tag) => same_tag(Some(tag), k.tag.as_deref()),
                // Passes may name the same symbol differently, so category is not compared.
                None => true,
            }
        });

        if !duplicate {
            kept.push((candidate, tol));
        }
    }

    debug!(
        "cross-pass dedup: {} tiled + {} global -> {}",
        tiled.len(),
        global.len(),
        kept.len()
    );
    kept.into_iter().map(|(eq, _)| eq.clone()).collect()
}
