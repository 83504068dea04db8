use petgraph::unionfind::UnionFind;
use tracing::debug;

use crate::core::confidence::by_confidence_desc;
use crate::core::geometry::Point;
use crate::core::model::Equipment;
use crate::fusion::compare::conflicting_tags;

/// Groups indices whose points chain together within `epsilon`.
///
/// Linking is transitive: A-B and B-C within `epsilon` put A, B and C in one
/// group even when A-C is farther apart. `can_link` vetoes individual pairs.
/// `tag_of` gives each point's usable tag; two groups carrying different tags
/// are never joined, even through an untagged member between them.
/// Groups are ordered by their lowest member and members ascend.
pub fn cluster_points<F, K>(points: &[Point], epsilon: f64, can_link: F, tag_of: K) -> Vec<Vec<usize>>
where
    F: Fn(usize, usize) -> bool,
    K: Fn(usize) -> Option<String>,
{
    let n = points.len();
    let mut sets = UnionFind::<usize>::new(n);
    // Tag held by each set, indexed by the set's current root.
    let mut set_tags: Vec<Option<String>> = (0..n).map(&tag_of).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if points[i].distance(&points[j]) > epsilon || !can_link(i, j) {
                continue;
            }
            let (ri, rj) = (sets.find_mut(i), sets.find_mut(j));
            if ri == rj || conflicting_tags(set_tags[ri].as_deref(), set_tags[rj].as_deref()) {
                continue;
            }
            let tag = set_tags[ri].take().or_else(|| set_tags[rj].take());
            sets.union(ri, rj);
            let root = sets.find_mut(ri);
            set_tags[root] = tag;
        }
    }

    let labels = sets.into_labeling();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
    for (idx, root) in labels.into_iter().enumerate() {
        match slot_of_root[root] {
            Some(slot) => groups[slot].push(idx),
            None => {
                slot_of_root[root] = Some(groups.len());
                groups.push(vec![idx]);
            }
        }
    }
    groups
}

/// Collapses one cluster into a single detection.
///
/// The survivor is the best tagged member, or the best member overall when none
/// carries a tag. The result keeps its box and tag, takes the cluster's top
/// confidence, and is partial only if every member was.
pub fn merge_cluster(members: &[&Equipment]) -> Option<Equipment> {
    let best = members.iter().copied().min_by(|a, b| {
        b.has_tag()
            .cmp(&a.has_tag())
            .then_with(|| by_confidence_desc(a.confidence, b.confidence))
    })?;

    let confidence = members.iter().map(|m| m.confidence).fold(0.0_f64, f64::max);
    let partial = members.iter().all(|m| m.partial);
    let description = best
        .description
        .clone()
        .or_else(|| members.iter().find_map(|m| m.description.clone()));

    Some(Equipment {
        confidence,
        partial,
        description,
        ..best.clone()
    })
}

/// Centroid clustering plus merge over one category's detections.
pub fn cluster_and_merge(detections: &[Equipment], epsilon: f64) -> Vec<Equipment> {
    let centers: Vec<Point> = detections.iter().map(Equipment::center).collect();
    let groups = cluster_points(
        &centers,
        epsilon,
        |i, j| detections[i].category == detections[j].category,
        |i| detections[i].tag.clone(),
    );

    let merged: Vec<Equipment> = groups
        .iter()
        .filter_map(|group| {
            let members: Vec<&Equipment> = group.iter().map(|&i| &detections[i]).collect();
            merge_cluster(&members)
        })
        .collect();

    debug!(
        "clustering merged {} detections into {}",
        detections.len(),
        merged.len()
    );
    merged
}
