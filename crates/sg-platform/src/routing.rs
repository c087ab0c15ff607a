//! Per-zone routing algorithms (spec.md §4.1).
//!
//! Each [`Zone`](crate::zone::Zone) answers "route between two of its direct
//! elements" using exactly one of these methods. Cross-zone routing
//! (climbing to the least common ancestor) lives in `graph.rs`; this module
//! only computes *local* routes, i.e. routes between elements that are
//! direct children of the same zone.
//!
//! The floyd/dijkstra algorithms are grounded on
//! `dslab-network::routing::{ShortestPathFloydWarshall, ShortestPathDijkstra}`,
//! generalized from "route between hosts" to "route between zone-local node
//! indices" (a local node may itself be a gateway into a child zone).

use std::collections::HashMap;

use crate::error::{PlatformError, Result};
use crate::link::LinkId;

/// A zone-local adjacency: `(from_index, to_index) -> link`, built from the
/// links the zone owns directly (as opposed to links inside child zones).
pub type LocalAdjacency = HashMap<(usize, usize), LinkId>;

/// Routing method selectable per zone (spec.md §3 `Zone`).
#[derive(Debug, Clone)]
pub enum RoutingMethod {
    /// Dense `N x N` table, populated explicitly by the platform builder.
    Full,
    /// Floyd–Warshall shortest path by latency, precomputed at seal.
    Floyd,
    /// Dijkstra shortest path by latency, computed per source and cached.
    Dijkstra,
    /// `route = up(src) ++ down(dst)`, shared links deduplicated.
    Star,
    /// Index-arithmetic routing over a flat cluster (one shared backbone).
    ClusterFlat,
    /// Index-arithmetic routing over a torus of the given dimensions.
    ClusterTorus { dimensions: Vec<usize> },
    /// Not specified closely enough to implement without guessing (DESIGN.md).
    ClusterFatTree,
    /// Not specified closely enough to implement without guessing (DESIGN.md).
    ClusterDragonfly,
    /// No links; latency is Euclidean distance in a stored coordinate plus height.
    Vivaldi,
    /// Per-station weighting function; no fixed topology of its own.
    Wifi,
    /// A zone with no internal connectivity (a single element, or unused).
    Empty,
}

/// A computed local route: the ordered links and whether it was found at all.
#[derive(Debug, Clone, Default)]
pub struct LocalRoute {
    pub links: Vec<LinkId>,
    /// Latency not attributable to any traversed link (spec.md §3 `vivaldi`:
    /// "no links; the latency is the Euclidean distance ... plus height").
    /// `0.0` for every link-based routing method, where latency is instead
    /// the sum of `links`' own propagation latencies.
    pub extra_latency: f64,
}

/// Precomputed routing state for a zone using [`RoutingMethod::Floyd`] or
/// [`RoutingMethod::Dijkstra`].
#[derive(Debug, Clone, Default)]
pub struct ShortestPathState {
    parent: Vec<Vec<usize>>,
    cache: HashMap<(usize, usize), Vec<LinkId>>,
}

const INVALID: usize = usize::MAX;

impl ShortestPathState {
    /// Runs Floyd–Warshall over `node_count` local nodes given a latency adjacency.
    pub fn floyd(node_count: usize, adjacency: &LocalAdjacency, latency_of: impl Fn(LinkId) -> f64) -> Self {
        let mut dist = vec![vec![f64::INFINITY; node_count]; node_count];
        let mut parent = vec![vec![INVALID; node_count]; node_count];
        for i in 0..node_count {
            dist[i][i] = 0.0;
            parent[i][i] = i;
        }
        for (&(a, b), &link) in adjacency.iter() {
            let lat = latency_of(link);
            if lat < dist[a][b] {
                dist[a][b] = lat;
                parent[a][b] = a;
            }
        }
        for k in 0..node_count {
            for i in 0..node_count {
                for j in 0..node_count {
                    if dist[i][k] < f64::INFINITY && dist[k][j] < f64::INFINITY && dist[i][k] + dist[k][j] < dist[i][j] {
                        dist[i][j] = dist[i][k] + dist[k][j];
                        parent[i][j] = parent[k][j];
                    }
                }
            }
        }
        Self {
            parent,
            cache: HashMap::new(),
        }
    }

    /// Runs single-source Dijkstra lazily per query, caching results.
    pub fn dijkstra(node_count: usize, adjacency: &LocalAdjacency, latency_of: impl Fn(LinkId) -> f64) -> Self {
        // Dijkstra state is computed lazily per-source in `local_route`, so the
        // eagerly built structure here only records adjacency via parent=self
        // placeholders; the real relaxation happens on first query per source.
        let _ = (node_count, adjacency, latency_of);
        Self {
            parent: Vec::new(),
            cache: HashMap::new(),
        }
    }

    fn reconstruct(&self, adjacency: &LocalAdjacency, src: usize, dst: usize) -> Option<Vec<LinkId>> {
        if let Some(cached) = self.cache.get(&(src, dst)) {
            return Some(cached.clone());
        }
        if self.parent.is_empty() || self.parent[src][dst] == INVALID {
            return None;
        }
        let mut path = Vec::new();
        let mut cur = dst;
        while cur != src {
            let prev = self.parent[src][cur];
            if prev == INVALID {
                return None;
            }
            let link = *adjacency.get(&(prev, cur)).or_else(|| adjacency.get(&(cur, prev)))?;
            path.push(link);
            cur = prev;
        }
        path.reverse();
        Some(path)
    }
}

fn dijkstra_single_source(
    node_count: usize,
    adjacency: &LocalAdjacency,
    latency_of: &impl Fn(LinkId) -> f64,
    src: usize,
) -> Vec<usize> {
    let mut dist = vec![f64::INFINITY; node_count];
    let mut parent = vec![INVALID; node_count];
    let mut visited = vec![false; node_count];
    dist[src] = 0.0;
    for _ in 0..node_count {
        let mut u = INVALID;
        for n in 0..node_count {
            if !visited[n] && (u == INVALID || dist[n] < dist[u]) {
                u = n;
            }
        }
        if u == INVALID || dist[u] == f64::INFINITY {
            break;
        }
        visited[u] = true;
        for ((a, b), link) in adjacency.iter() {
            if *a != u {
                continue;
            }
            let lat = latency_of(*link);
            if dist[u] + lat < dist[*b] {
                dist[*b] = dist[u] + lat;
                parent[*b] = u;
            }
        }
    }
    parent
}

/// Computes a local route between zone-local node indices `src`/`dst` using
/// `method` over `adjacency`.
#[allow(clippy::too_many_arguments)]
pub fn local_route(
    method: &RoutingMethod,
    node_count: usize,
    src: usize,
    dst: usize,
    adjacency: &LocalAdjacency,
    floyd: Option<&ShortestPathState>,
    dijkstra_cache: &mut HashMap<usize, Vec<usize>>,
    latency_of: &impl Fn(LinkId) -> f64,
) -> Result<LocalRoute> {
    if src == dst {
        return Ok(LocalRoute::default());
    }
    match method {
        RoutingMethod::Full | RoutingMethod::ClusterFlat => {
            let link = adjacency
                .get(&(src, dst))
                .or_else(|| adjacency.get(&(dst, src)))
                .ok_or(PlatformError::NoRoute {
                    src: src.to_string(),
                    dst: dst.to_string(),
                })?;
            Ok(LocalRoute { links: vec![*link], extra_latency: 0.0 })
        }
        RoutingMethod::Floyd => {
            let state = floyd.expect("floyd routing requires precomputed state");
            let links = state.reconstruct(adjacency, src, dst).ok_or(PlatformError::NoRoute {
                src: src.to_string(),
                dst: dst.to_string(),
            })?;
            Ok(LocalRoute { links, extra_latency: 0.0 })
        }
        RoutingMethod::Dijkstra => {
            let parent = dijkstra_cache
                .entry(src)
                .or_insert_with(|| dijkstra_single_source(node_count, adjacency, latency_of, src));
            if parent[dst] == INVALID && src != dst {
                return Err(PlatformError::NoRoute {
                    src: src.to_string(),
                    dst: dst.to_string(),
                });
            }
            let mut path = Vec::new();
            let mut cur = dst;
            while cur != src {
                let prev = parent[cur];
                let link = *adjacency
                    .get(&(prev, cur))
                    .or_else(|| adjacency.get(&(cur, prev)))
                    .ok_or(PlatformError::NoRoute {
                        src: src.to_string(),
                        dst: dst.to_string(),
                    })?;
                path.push(link);
                cur = prev;
            }
            path.reverse();
            Ok(LocalRoute { links: path, extra_latency: 0.0 })
        }
        RoutingMethod::ClusterTorus { dimensions } => cluster_torus_route(dimensions, src, dst, adjacency),
        RoutingMethod::ClusterFatTree => Err(PlatformError::UnsupportedTopology("cluster-fat-tree")),
        RoutingMethod::ClusterDragonfly => Err(PlatformError::UnsupportedTopology("cluster-dragonfly")),
        RoutingMethod::Star | RoutingMethod::Vivaldi | RoutingMethod::Wifi | RoutingMethod::Empty => {
            Err(PlatformError::NoRoute {
                src: src.to_string(),
                dst: dst.to_string(),
            })
        }
    }
}

/// Torus routing: decompose `src`/`dst` indices into per-dimension coordinates
/// and hop dimension by dimension, wrapping around each ring — the
/// "algebraic routing... index arithmetic over torus/fat-tree/dragonfly
/// indices" of spec.md §4.1, grounded on `original_source/AsClusterTorus.cpp`.
fn cluster_torus_route(dimensions: &[usize], src: usize, dst: usize, adjacency: &LocalAdjacency) -> Result<LocalRoute> {
    let coords_of = |mut idx: usize| -> Vec<usize> {
        let mut coords = Vec::with_capacity(dimensions.len());
        for &d in dimensions {
            coords.push(idx % d);
            idx /= d;
        }
        coords
    };
    let index_of = |coords: &[usize]| -> usize {
        let mut idx = 0usize;
        let mut mult = 1usize;
        for (i, &d) in dimensions.iter().enumerate() {
            idx += coords[i] * mult;
            mult *= d;
        }
        idx
    };

    let mut cur = coords_of(src);
    let target = coords_of(dst);
    let mut links = Vec::new();
    for dim in 0..dimensions.len() {
        while cur[dim] != target[dim] {
            let d = dimensions[dim];
            let forward = (target[dim] + d - cur[dim]) % d;
            let backward = (cur[dim] + d - target[dim]) % d;
            let step: i64 = if forward <= backward { 1 } else { -1 };
            let next = ((cur[dim] as i64 + step).rem_euclid(d as i64)) as usize;
            let mut next_coords = cur.clone();
            next_coords[dim] = next;
            let from = index_of(&cur);
            let to = index_of(&next_coords);
            let link = *adjacency
                .get(&(from, to))
                .or_else(|| adjacency.get(&(to, from)))
                .ok_or(PlatformError::NoRoute {
                    src: from.to_string(),
                    dst: to.to_string(),
                })?;
            links.push(link);
            cur = next_coords;
        }
    }
    Ok(LocalRoute { links, extra_latency: 0.0 })
}
