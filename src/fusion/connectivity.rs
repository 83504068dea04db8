use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::FusionConfig;
use crate::core::confidence::by_confidence_desc;
use crate::core::geometry::{path_similarity, Point};
use crate::core::model::{Connection, Endpoint, Equipment, ResolvedEndpoint};
use crate::fusion::cluster::cluster_points;
use crate::fusion::compare::{same_tag, tag_pair_key};

const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapOutcome {
    pub resolved: Vec<ResolvedEndpoint>,
    pub leftovers: Vec<Endpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Connectivity {
    pub connections: Vec<Connection>,
    pub resolved_endpoints: Vec<ResolvedEndpoint>,
    pub leftovers: Vec<Endpoint>,
}

/// Collapses duplicate wires.
///
/// Two connections are duplicates when they join the same pair of tags, in
/// either order, and their paths are at least `threshold` similar. The
/// higher-confidence member survives with its own path and direction.
pub fn merge_connections(connections: &[Connection], threshold: f64, samples: usize) -> Vec<Connection> {
    let mut order: Vec<usize> = (0..connections.len())
        .filter(|&i| connections[i].path.len() >= 2)
        .collect();
    order.sort_by(|&a, &b| by_confidence_desc(connections[a].confidence, connections[b].confidence));

    let mut kept: Vec<&Connection> = Vec::with_capacity(order.len());
    for idx in order {
        let candidate = &connections[idx];
        let key = tag_pair_key(candidate.from_tag.as_deref(), candidate.to_tag.as_deref());
        let duplicate = kept.iter().any(|k| {
            tag_pair_key(k.from_tag.as_deref(), k.to_tag.as_deref()) == key
                && path_similarity(&k.path, &candidate.path, samples) >= threshold
        });
        if !duplicate {
            kept.push(candidate);
        }
    }

    debug!("connection merge kept {} of {}", kept.len(), connections.len());
    kept.into_iter().cloned().collect()
}

/// Finds the tagged equipment an endpoint lands on.
///
/// Distance is measured to the equipment's box, so a point on the outline is at
/// zero. Among equally near candidates the endpoint's hint tag wins, then the
/// lowest input index.
pub fn nearest_equipment<'a>(
    endpoint: &Endpoint,
    equipment: &'a [Equipment],
    radius: f64,
) -> Option<(&'a Equipment, f64)> {
    let mut best: Option<(&Equipment, f64, bool)> = None;
    for eq in equipment.iter().filter(|e| e.has_tag() && e.page == endpoint.page) {
        let distance = eq.bbox.distance_to_point(&endpoint.point);
        if distance > radius {
            continue;
        }
        let hinted = same_tag(endpoint.hint_tag.as_deref(), eq.tag.as_deref());
        best = match best {
            None => Some((eq, distance, hinted)),
            Some((_, best_distance, best_hinted))
                if distance < best_distance - TIE_EPSILON
                    || ((distance - best_distance).abs() <= TIE_EPSILON && hinted && !best_hinted) =>
            {
                Some((eq, distance, hinted))
            }
            keep => keep,
        };
    }
    best.map(|(eq, distance, _)| (eq, distance))
}

pub fn snap_endpoints(endpoints: &[Endpoint], equipment: &[Equipment], radius: f64) -> SnapOutcome {
    let mut outcome = SnapOutcome::default();
    for endpoint in endpoints {
        match nearest_equipment(endpoint, equipment, radius) {
            Some((eq, distance)) => outcome.resolved.push(ResolvedEndpoint {
                endpoint: endpoint.clone(),
                tag: eq.tag.clone().unwrap_or_default(),
                distance,
            }),
            None => outcome.leftovers.push(endpoint.clone()),
        }
    }
    debug!(
        "snapped {} endpoints, {} leftovers",
        outcome.resolved.len(),
        outcome.leftovers.len()
    );
    outcome
}

/// Reduces endpoints lying within `epsilon` of each other to one per group.
///
/// The lowest-index member represents the group and borrows a hint tag from a
/// sibling when it has none.
pub fn dedup_endpoints(endpoints: &[Endpoint], epsilon: f64) -> Vec<Endpoint> {
    let points: Vec<Point> = endpoints.iter().map(|e| e.point).collect();
    let groups = cluster_points(
        &points,
        epsilon,
        |i, j| endpoints[i].page == endpoints[j].page,
        |i| endpoints[i].hint_tag.clone(),
    );

    groups
        .into_iter()
        .map(|group| {
            let mut rep = endpoints[group[0]].clone();
            if rep.hint_tag.is_none() {
                rep.hint_tag = group.iter().find_map(|&i| endpoints[i].hint_tag.clone());
            }
            rep
        })
        .collect()
}

/// Fills unresolved `from`/`to` tags by snapping the path's first and last points.
///
/// Ends that find nothing come back as leftovers. An end never snaps onto the
/// tag already held by the opposite end.
pub fn complete_connections(
    connections: &[Connection],
    equipment: &[Equipment],
    radius: f64,
) -> (Vec<Connection>, Vec<Endpoint>) {
    let mut completed = Vec::with_capacity(connections.len());
    let mut leftovers = Vec::new();

    for conn in connections {
        let mut conn = conn.clone();
        if conn.from_tag.is_none() {
            if let Some(point) = conn.start() {
                let opposite = conn.to_tag.clone();
                conn.from_tag = resolve_end(point, conn.page, opposite.as_deref(), equipment, radius, &mut leftovers);
            }
        }
        if conn.to_tag.is_none() {
            if let Some(point) = conn.end() {
                let opposite = conn.from_tag.clone();
                conn.to_tag = resolve_end(point, conn.page, opposite.as_deref(), equipment, radius, &mut leftovers);
            }
        }
        completed.push(conn);
    }

    (completed, leftovers)
}

fn resolve_end(
    point: Point,
    page: usize,
    opposite: Option<&str>,
    equipment: &[Equipment],
    radius: f64,
    leftovers: &mut Vec<Endpoint>,
) -> Option<String> {
    let endpoint = Endpoint {
        hint_tag: None,
        point,
        page,
    };
    let tag = nearest_equipment(&endpoint, equipment, radius)
        .and_then(|(eq, _)| eq.tag.clone())
        .filter(|tag| !same_tag(Some(tag), opposite));
    if tag.is_none() {
        leftovers.push(endpoint);
    }
    tag
}

/// Builds the connection graph for one page from fused equipment.
pub fn reconcile(
    connections: &[Connection],
    endpoints: &[Endpoint],
    equipment: &[Equipment],
    config: &FusionConfig,
) -> Connectivity {
    let merged = merge_connections(connections, config.connection_merge_threshold, config.path_samples);
    let (completed, dangling) = complete_connections(&merged, equipment, config.snap_radius_px);
    // Completion can turn two half-known duplicates into a matching pair.
    let connections = merge_connections(&completed, config.connection_merge_threshold, config.path_samples);

    let unique = dedup_endpoints(endpoints, config.endpoint_epsilon_px);
    let snapped = snap_endpoints(&unique, equipment, config.snap_radius_px);

    let mut leftovers = dangling;
    leftovers.extend(snapped.leftovers);
    let leftovers = dedup_endpoints(&leftovers, config.endpoint_epsilon_px);

    Connectivity {
        connections,
        resolved_endpoints: snapped.resolved,
        leftovers,
    }
}
