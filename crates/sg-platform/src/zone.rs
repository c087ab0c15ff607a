//! Recursive network zones.

use std::collections::HashMap;

use crate::error::{PlatformError, Result};
use crate::host::HostId;
use crate::link::LinkId;
use crate::routing::{local_route, LocalAdjacency, LocalRoute, RoutingMethod, ShortestPathState};

/// Dense identifier of a [`Zone`] within a [`crate::PlatformGraph`].
pub type ZoneId = usize;

/// A direct child of a zone: either a host, or a nested zone exposing a
/// single gateway host to this zone's routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneElement {
    /// A host that lives directly in this zone.
    Host(HostId),
    /// A nested zone, reachable through its `gateway` host.
    Child(ZoneId, HostId),
}

impl ZoneElement {
    /// The host identifier this element is addressed by at this zone's level.
    pub fn gateway_host(&self) -> HostId {
        match self {
            ZoneElement::Host(h) => *h,
            ZoneElement::Child(_, gw) => *gw,
        }
    }
}

/// A recursive container of hosts, links and child zones (spec.md §3 `Zone`).
pub struct Zone {
    id: ZoneId,
    name: String,
    parent: Option<ZoneId>,
    gateway: Option<HostId>,
    elements: Vec<ZoneElement>,
    host_index: HashMap<HostId, usize>,
    routing: RoutingMethod,
    adjacency: LocalAdjacency,
    star_up: HashMap<usize, Vec<LinkId>>,
    star_down: HashMap<usize, Vec<LinkId>>,
    wifi_weight: Option<Box<dyn Fn(f64, &[LinkId]) -> f64>>,
    wifi_link: Option<LinkId>,
    vivaldi_coords: HashMap<usize, (f64, f64, f64)>,
    sealed: bool,
    floyd: Option<ShortestPathState>,
    dijkstra_cache: HashMap<usize, Vec<usize>>,
    explicit_full_routes: Option<HashMap<(usize, usize), Vec<LinkId>>>,
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("elements", &self.elements.len())
            .field("sealed", &self.sealed)
            .finish()
    }
}

impl Zone {
    pub(crate) fn new(id: ZoneId, name: impl Into<String>, parent: Option<ZoneId>, routing: RoutingMethod) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            gateway: None,
            elements: Vec::new(),
            host_index: HashMap::new(),
            routing,
            adjacency: HashMap::new(),
            star_up: HashMap::new(),
            star_down: HashMap::new(),
            wifi_weight: None,
            wifi_link: None,
            vivaldi_coords: HashMap::new(),
            sealed: false,
            floyd: None,
            dijkstra_cache: HashMap::new(),
            explicit_full_routes: None,
        }
    }

    /// Zone identifier.
    pub fn id(&self) -> ZoneId {
        self.id
    }

    /// Zone name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent zone, if any (`None` for the root zone).
    pub fn parent(&self) -> Option<ZoneId> {
        self.parent
    }

    /// The host this zone exposes to its parent's routing, if set.
    pub fn gateway(&self) -> Option<HostId> {
        self.gateway
    }

    /// Whether the zone has been sealed (no further topology mutation allowed).
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn check_unsealed(&self) -> Result<()> {
        if self.sealed {
            return Err(PlatformError::ZoneSealed(self.name.clone()));
        }
        Ok(())
    }

    /// Registers a direct host element, returning its zone-local index.
    pub fn add_host(&mut self, host: HostId) -> Result<usize> {
        self.check_unsealed()?;
        let idx = self.elements.len();
        self.elements.push(ZoneElement::Host(host));
        self.host_index.insert(host, idx);
        Ok(idx)
    }

    /// Registers a nested zone, exposed through `gateway`, returning its zone-local index.
    pub fn add_child_zone(&mut self, child: ZoneId, gateway: HostId) -> Result<usize> {
        self.check_unsealed()?;
        let idx = self.elements.len();
        self.elements.push(ZoneElement::Child(child, gateway));
        self.host_index.insert(gateway, idx);
        Ok(idx)
    }

    /// Sets the host through which this zone connects to its parent.
    pub fn set_gateway(&mut self, host: HostId) {
        self.gateway = Some(host);
    }

    /// Adds a direct link between two of this zone's elements (by zone-local index).
    pub fn add_local_link(&mut self, from_idx: usize, to_idx: usize, link: LinkId, bidirectional: bool) -> Result<()> {
        self.check_unsealed()?;
        self.adjacency.insert((from_idx, to_idx), link);
        if bidirectional {
            self.adjacency.insert((to_idx, from_idx), link);
        }
        Ok(())
    }

    /// Sets an explicit `(src_idx, dst_idx) -> route` entry for `RoutingMethod::Full`
    /// when the route spans more than one link (otherwise `add_local_link` suffices).
    pub fn set_full_route(&mut self, from_idx: usize, to_idx: usize, links: Vec<LinkId>) -> Result<()> {
        self.check_unsealed()?;
        self.explicit_full_routes
            .get_or_insert_with(HashMap::new)
            .insert((from_idx, to_idx), links);
        Ok(())
    }

    /// Adds the up-link list for `child_idx` (links from the child up to this
    /// zone's own level) used by `RoutingMethod::Star`.
    pub fn add_star_up(&mut self, child_idx: usize, links: Vec<LinkId>) -> Result<()> {
        self.check_unsealed()?;
        self.star_up.insert(child_idx, links);
        Ok(())
    }

    /// Adds the down-link list for `child_idx` used by `RoutingMethod::Star`.
    pub fn add_star_down(&mut self, child_idx: usize, links: Vec<LinkId>) -> Result<()> {
        self.check_unsealed()?;
        self.star_down.insert(child_idx, links);
        Ok(())
    }

    /// Installs the wifi per-station weighting callback (spec.md §4.2 wifi policy).
    pub fn set_wifi_weight(&mut self, f: Box<dyn Fn(f64, &[LinkId]) -> f64>) {
        self.wifi_weight = Some(f);
    }

    /// Evaluates the wifi weight for a transfer of `size` bytes over `route`,
    /// defaulting to `1.0` when no callback was installed.
    pub fn wifi_weight(&self, size: f64, route: &[LinkId]) -> f64 {
        self.wifi_weight.as_ref().map(|f| f(size, route)).unwrap_or(1.0)
    }

    /// Sets the single access-point link every station in a
    /// [`RoutingMethod::Wifi`] zone shares (spec.md §3 `wifi`: "a per-station
    /// weighting function"; all traffic couples through the one shared
    /// medium, which `sg-resources::network` weights per spec.md §4.2).
    pub fn set_wifi_link(&mut self, link: LinkId) {
        self.wifi_link = Some(link);
    }

    /// Sets the vivaldi coordinate `(x, y, height)` for the element at
    /// `idx` (spec.md §3 `vivaldi`).
    pub fn set_vivaldi_coordinate(&mut self, idx: usize, x: f64, y: f64, height: f64) {
        self.vivaldi_coords.insert(idx, (x, y, height));
    }

    /// Seals the zone: precomputes Floyd–Warshall state if needed. No further
    /// `add_*`/`set_*` calls are accepted afterwards.
    pub fn seal(&mut self, latency_of: impl Fn(LinkId) -> f64) {
        if let RoutingMethod::Floyd = self.routing {
            self.floyd = Some(ShortestPathState::floyd(self.elements.len(), &self.adjacency, latency_of));
        }
        self.sealed = true;
    }

    /// Zone-local index of `host`, if it (or the child zone it gateways) is
    /// a direct element of this zone.
    pub fn index_of(&self, host: HostId) -> Option<usize> {
        self.host_index.get(&host).copied()
    }

    /// Number of direct elements in this zone.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// The element at zone-local index `idx`.
    pub fn element(&self, idx: usize) -> ZoneElement {
        self.elements[idx]
    }

    /// Computes a local route between two of this zone's direct elements.
    pub fn local_route(&mut self, src_idx: usize, dst_idx: usize, latency_of: &impl Fn(LinkId) -> f64) -> Result<LocalRoute> {
        if let RoutingMethod::Star = self.routing {
            return self.star_route(src_idx, dst_idx);
        }
        if let RoutingMethod::Vivaldi = self.routing {
            return self.vivaldi_route(src_idx, dst_idx);
        }
        if let RoutingMethod::Wifi = self.routing {
            return self.wifi_route(src_idx, dst_idx);
        }
        if let Some(route) = self.explicit_full_routes.as_ref().and_then(|m| m.get(&(src_idx, dst_idx))) {
            return Ok(LocalRoute {
                links: route.clone(),
                extra_latency: 0.0,
            });
        }
        local_route(
            &self.routing,
            self.elements.len(),
            src_idx,
            dst_idx,
            &self.adjacency,
            self.floyd.as_ref(),
            &mut self.dijkstra_cache,
            latency_of,
        )
    }

    fn star_route(&self, src_idx: usize, dst_idx: usize) -> Result<LocalRoute> {
        if src_idx == dst_idx {
            return Ok(LocalRoute::default());
        }
        let mut links = self.star_up.get(&src_idx).cloned().unwrap_or_default();
        let down = self.star_down.get(&dst_idx).cloned().unwrap_or_default();
        // `StarZone.cpp`-grounded dedup: a link present on both the up-path
        // and the down-path (e.g. a shared backbone segment) is counted once.
        for link in down {
            if links.last().copied() != Some(link) {
                links.push(link);
            }
        }
        Ok(LocalRoute { links, extra_latency: 0.0 })
    }

    /// `vivaldi` routing (spec.md §3 Zone): no links at all, latency is the
    /// Euclidean distance between the two elements' coordinates plus both
    /// nodes' height terms.
    fn vivaldi_route(&self, src_idx: usize, dst_idx: usize) -> Result<LocalRoute> {
        if src_idx == dst_idx {
            return Ok(LocalRoute::default());
        }
        let (sx, sy, sh) = self.vivaldi_coords.get(&src_idx).copied().ok_or_else(|| PlatformError::NoRoute {
            src: src_idx.to_string(),
            dst: dst_idx.to_string(),
        })?;
        let (dx, dy, dh) = self.vivaldi_coords.get(&dst_idx).copied().ok_or_else(|| PlatformError::NoRoute {
            src: src_idx.to_string(),
            dst: dst_idx.to_string(),
        })?;
        let euclidean = ((sx - dx).powi(2) + (sy - dy).powi(2)).sqrt();
        Ok(LocalRoute {
            links: Vec::new(),
            extra_latency: euclidean + sh + dh,
        })
    }

    /// `wifi` routing (spec.md §3 Zone): every station shares the single
    /// access-point link set via [`Self::set_wifi_link`].
    fn wifi_route(&self, src_idx: usize, dst_idx: usize) -> Result<LocalRoute> {
        if src_idx == dst_idx {
            return Ok(LocalRoute::default());
        }
        let link = self.wifi_link.ok_or_else(|| PlatformError::NoRoute {
            src: src_idx.to_string(),
            dst: dst_idx.to_string(),
        })?;
        Ok(LocalRoute {
            links: vec![link],
            extra_latency: 0.0,
        })
    }
}
