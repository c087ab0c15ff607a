//! The platform graph (spec.md §4.1, C1): hosts, links, disks, zones and the
//! `route`/`links_latency` queries the rest of the core consumes.

use std::collections::HashMap;

use crate::disk::{Disk, DiskId};
use crate::error::{PlatformError, Result};
use crate::host::{Host, HostId};
use crate::link::LinkId;
use crate::routing::RoutingMethod;
use crate::vm::{VirtualMachine, VmId};
use crate::zone::{Zone, ZoneElement, ZoneId};

/// A resolved route: the ordered links traversed, and their summed latency.
#[derive(Debug, Clone, Default)]
pub struct Route {
    /// Links traversed, in order from source to destination.
    pub links: Vec<LinkId>,
    /// Sum of each traversed link's propagation latency.
    pub latency: f64,
}

/// The in-memory platform: hosts, links, disks, VMs and the zone tree.
///
/// Built programmatically (the XML loader is out of scope, spec.md §1); see
/// [`PlatformGraph::builder`]-style `add_*` methods.
pub struct PlatformGraph {
    hosts: Vec<Host>,
    links: Vec<crate::link::Link>,
    disks: Vec<Disk>,
    vms: Vec<VirtualMachine>,
    zones: Vec<Zone>,
    root: ZoneId,
    host_zone: HashMap<HostId, ZoneId>,
    names: HashMap<String, NamedElement>,
}

#[derive(Debug, Clone, Copy)]
enum NamedElement {
    Host(HostId),
    Link(LinkId),
    Disk(DiskId),
    Zone(ZoneId),
    Vm(VmId),
}

impl PlatformGraph {
    /// Creates a platform with a single root zone using `routing` as its method.
    pub fn new(root_name: impl Into<String>, routing: RoutingMethod) -> Self {
        let mut zones = Vec::new();
        let root_name = root_name.into();
        zones.push(Zone::new(0, root_name.clone(), None, routing));
        let mut names = HashMap::new();
        names.insert(root_name, NamedElement::Zone(0));
        Self {
            hosts: Vec::new(),
            links: Vec::new(),
            disks: Vec::new(),
            vms: Vec::new(),
            zones,
            root: 0,
            host_zone: HashMap::new(),
            names,
        }
    }

    fn check_unique(&self, name: &str) -> Result<()> {
        if self.names.contains_key(name) {
            return Err(PlatformError::InvalidValue(format!("duplicate platform element name '{}'", name)));
        }
        Ok(())
    }

    /// Root zone id.
    pub fn root(&self) -> ZoneId {
        self.root
    }

    /// Creates an empty nested zone under `parent`. The zone is not yet
    /// routable from its parent: add hosts to it, call
    /// [`Self::set_zone_gateway`] to pick which of them represents it
    /// externally, then [`Self::attach_child_zone`] to register it as a
    /// routable element of `parent`.
    pub fn add_zone(&mut self, name: impl Into<String>, parent: ZoneId, routing: RoutingMethod) -> Result<ZoneId> {
        let name = name.into();
        self.check_unique(&name)?;
        let id = self.zones.len();
        self.zones.push(Zone::new(id, name.clone(), Some(parent), routing));
        self.names.insert(name, NamedElement::Zone(id));
        Ok(id)
    }

    /// Picks the host through which `zone` is addressed by its parent's routing.
    /// `host` must already be a direct element of `zone`.
    pub fn set_zone_gateway(&mut self, zone: ZoneId, host: HostId) -> Result<()> {
        if self.zones[zone].index_of(host).is_none() {
            return Err(PlatformError::UnknownHost(host.to_string()));
        }
        self.zones[zone].set_gateway(host);
        Ok(())
    }

    /// Registers `child` as a routable element of `parent`, using `child`'s
    /// gateway (set via [`Self::set_zone_gateway`]) as the address parent-side
    /// links connect to.
    pub fn attach_child_zone(&mut self, parent: ZoneId, child: ZoneId) -> Result<usize> {
        let gateway = self.zones[child]
            .gateway()
            .ok_or_else(|| PlatformError::InvalidValue(format!("zone '{}' has no gateway set", self.zones[child].name())))?;
        self.zones[parent].add_child_zone(child, gateway)
    }

    /// Creates and registers a host inside `zone`.
    pub fn add_host(&mut self, name: impl Into<String>, zone: ZoneId, speed: f64, core_count: u32) -> Result<HostId> {
        let name = name.into();
        self.check_unique(&name)?;
        let id = self.hosts.len();
        let host = Host::new(id, name.clone(), speed, core_count)?;
        self.hosts.push(host);
        self.zones[zone].add_host(id)?;
        self.host_zone.insert(id, zone);
        self.names.insert(name, NamedElement::Host(id));
        Ok(id)
    }

    /// Creates and registers a disk attached to `host`.
    pub fn add_disk(&mut self, name: impl Into<String>, host: HostId, read_bw: f64, write_bw: f64) -> Result<DiskId> {
        let name = name.into();
        self.check_unique(&name)?;
        if host >= self.hosts.len() {
            return Err(PlatformError::UnknownHost(host.to_string()));
        }
        let id = self.disks.len();
        self.disks.push(Disk::new(id, name.clone(), host, read_bw, write_bw));
        self.hosts[host].attach_disk(id);
        self.names.insert(name, NamedElement::Disk(id));
        Ok(id)
    }

    /// Creates a VM whose CPU constraint is carved from `physical_host`.
    pub fn add_vm(&mut self, name: impl Into<String>, physical_host: HostId, ram_size: u64, core_reservation: u32) -> Result<VmId> {
        let name = name.into();
        self.check_unique(&name)?;
        let id = self.vms.len();
        self.vms.push(VirtualMachine::new(id, name.clone(), physical_host, ram_size, core_reservation));
        self.names.insert(name, NamedElement::Vm(id));
        Ok(id)
    }

    /// Creates a link inside `zone`, connecting two of the zone's elements
    /// (given by zone-local index, see [`Zone::index_of`]).
    pub fn add_link(
        &mut self,
        name: impl Into<String>,
        zone: ZoneId,
        bandwidth: f64,
        latency: f64,
        policy: crate::link::SharingPolicy,
        from_idx: usize,
        to_idx: usize,
        bidirectional: bool,
    ) -> Result<LinkId> {
        let name = name.into();
        self.check_unique(&name)?;
        if bandwidth <= 0.0 {
            return Err(PlatformError::InvalidValue("link bandwidth must be > 0".into()));
        }
        let id = self.links.len();
        self.links.push(crate::link::Link::new(id, name.clone(), bandwidth, latency, policy));
        self.zones[zone].add_local_link(from_idx, to_idx, id, bidirectional)?;
        self.names.insert(name, NamedElement::Link(id));
        Ok(id)
    }

    /// Sets the single access-point link every station of a `wifi` zone
    /// shares (spec.md §3 Zone `wifi`).
    pub fn set_wifi_link(&mut self, zone: ZoneId, link: crate::link::LinkId) {
        self.zones[zone].set_wifi_link(link);
    }

    /// Sets the vivaldi coordinate `(x, y, height)` of `host` within `zone`
    /// (spec.md §3 Zone `vivaldi`). `host` must already be a direct element
    /// of `zone`.
    pub fn set_vivaldi_coordinate(&mut self, zone: ZoneId, host: HostId, x: f64, y: f64, height: f64) -> Result<()> {
        let idx = self.zones[zone].index_of(host).ok_or_else(|| PlatformError::UnknownHost(host.to_string()))?;
        self.zones[zone].set_vivaldi_coordinate(idx, x, y, height);
        Ok(())
    }

    /// Seals `zone` (and, transitively, nothing below it — each zone seals independently).
    pub fn seal_zone(&mut self, zone: ZoneId) {
        let links = self.links.clone();
        self.zones[zone].seal(|link_id| links[link_id].latency());
    }

    /// Seals every zone in the platform. Call once platform construction is complete.
    pub fn seal_all(&mut self) {
        for z in 0..self.zones.len() {
            self.seal_zone(z);
        }
    }

    /// Looks up a host by name.
    pub fn host_by_name(&self, name: &str) -> Result<&Host> {
        match self.names.get(name) {
            Some(NamedElement::Host(id)) => Ok(&self.hosts[*id]),
            _ => Err(PlatformError::UnknownName(name.to_string())),
        }
    }

    /// Looks up a host by name, mutably.
    pub fn host_by_name_mut(&mut self, name: &str) -> Result<&mut Host> {
        match self.names.get(name) {
            Some(NamedElement::Host(id)) => Ok(&mut self.hosts[*id]),
            _ => Err(PlatformError::UnknownName(name.to_string())),
        }
    }

    /// Borrows a host by id.
    pub fn host(&self, id: HostId) -> &Host {
        &self.hosts[id]
    }

    /// Mutably borrows a host by id.
    pub fn host_mut(&mut self, id: HostId) -> &mut Host {
        &mut self.hosts[id]
    }

    /// All hosts, in id order.
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Borrows a link by id.
    pub fn link(&self, id: LinkId) -> &crate::link::Link {
        &self.links[id]
    }

    /// Mutably borrows a link by id. Used by the engine to flip `on`/`off` trace events.
    pub fn link_mut(&mut self, id: LinkId) -> &mut crate::link::Link {
        &mut self.links[id]
    }

    /// Borrows a disk by id.
    pub fn disk(&self, id: DiskId) -> &Disk {
        &self.disks[id]
    }

    /// Borrows a VM by id.
    pub fn vm(&self, id: VmId) -> &VirtualMachine {
        &self.vms[id]
    }

    /// Mutably borrows a VM by id (for migration).
    pub fn vm_mut(&mut self, id: VmId) -> &mut VirtualMachine {
        &mut self.vms[id]
    }

    /// Migrates a VM to `new_host`, rebinding its CPU constraint.
    pub fn migrate_vm(&mut self, vm: VmId, new_host: HostId) {
        self.vms[vm].migrate_to(new_host);
    }

    /// Turns a host on or off. Turning off fails every activity whose route
    /// touches it (handled by `sg-resources`), and kills actors on it
    /// (handled by `sg-actors`); the graph only flips the bit.
    pub fn set_host_power(&mut self, host: HostId, on: bool) {
        self.hosts[host].set_on(on);
    }

    /// Turns a link on or off.
    pub fn set_link_power(&mut self, link: LinkId, on: bool) {
        self.links[link].set_on(on);
    }

    fn zone_of_host(&self, host: HostId) -> Result<ZoneId> {
        self.host_zone
            .get(&host)
            .copied()
            .ok_or_else(|| PlatformError::UnknownHost(host.to_string()))
    }

    /// Ancestor chain of the zone containing `host`, root-first, each entry
    /// paired with the zone-local index used to address the element one
    /// level below (or the host itself, for the innermost entry).
    fn ancestor_chain(&self, host: HostId) -> Result<Vec<ZoneId>> {
        let mut chain = vec![self.zone_of_host(host)?];
        while let Some(parent) = self.zones[*chain.last().unwrap()].parent() {
            chain.push(parent);
        }
        chain.reverse(); // root-first
        Ok(chain)
    }

    /// Route between two hosts (spec.md §4.1 `route`). Climbs to the least
    /// common ancestor zone, concatenating sub-paths through gateway
    /// endpoints, exactly as spec.md §3 `Zone` describes.
    pub fn route(&mut self, src: HostId, dst: HostId) -> Result<Route> {
        if src == dst {
            return Ok(Route::default());
        }
        let src_name = self.hosts[src].name().to_string();
        let dst_name = self.hosts[dst].name().to_string();
        let no_route = || PlatformError::NoRoute {
            src: src_name.clone(),
            dst: dst_name.clone(),
        };

        let src_chain = self.ancestor_chain(src)?;
        let dst_chain = self.ancestor_chain(dst)?;
        let mut common = 0;
        while common < src_chain.len() && common < dst_chain.len() && src_chain[common] == dst_chain[common] {
            common += 1;
        }
        if common == 0 {
            return Err(no_route());
        }
        let lca = src_chain[common - 1];

        // Snapshot latencies once; zone-local routing needs to borrow the
        // zone mutably (for its dijkstra cache) while also reading latencies,
        // which a live `&self.links` borrow would conflict with.
        let link_latencies: Vec<f64> = self.links.iter().map(|l| l.latency()).collect();
        let latency_of = |l: LinkId| link_latencies[l];

        let mut links = Vec::new();
        let mut latency = 0.0;

        // Ascend from src, one zone at a time, up to (not including) the LCA.
        let mut node = src;
        for &zone_id in src_chain[common..].iter().rev() {
            let zone = &self.zones[zone_id];
            let from_idx = zone.index_of(node).ok_or_else(&no_route)?;
            let gateway = zone.gateway().unwrap_or(node);
            let to_idx = zone.index_of(gateway).unwrap_or(from_idx);
            if from_idx != to_idx {
                let route = self.zones[zone_id].local_route(from_idx, to_idx, &latency_of)?;
                latency += route.links.iter().map(|&l| latency_of(l)).sum::<f64>() + route.extra_latency;
                links.extend(route.links);
            }
            node = gateway;
        }
        let src_side_node = node;

        // Same ascent on the dst side, used only to find the LCA-local index.
        let mut node = dst;
        for &zone_id in dst_chain[common..].iter().rev() {
            let zone = &self.zones[zone_id];
            node = zone.gateway().unwrap_or(node);
        }
        let dst_side_node = node;

        // Route within the LCA between the two ascended endpoints.
        {
            let zone = &self.zones[lca];
            let from_idx = zone.index_of(src_side_node).ok_or_else(&no_route)?;
            let to_idx = zone.index_of(dst_side_node).ok_or_else(&no_route)?;
            let route = self.zones[lca].local_route(from_idx, to_idx, &latency_of)?;
            latency += route.links.iter().map(|&l| latency_of(l)).sum::<f64>() + route.extra_latency;
            links.extend(route.links);
        }

        // Descend from the LCA to dst, one zone at a time (built bottom-up, then reversed).
        let mut node = dst;
        let mut descend_links = Vec::new();
        let mut descend_latency = 0.0;
        for &zone_id in dst_chain[common..].iter().rev() {
            let zone = &self.zones[zone_id];
            let from_idx = zone.index_of(node).ok_or_else(&no_route)?;
            let gateway = zone.gateway().unwrap_or(node);
            let to_idx = zone.index_of(gateway).unwrap_or(from_idx);
            if from_idx != to_idx {
                let route = self.zones[zone_id].local_route(to_idx, from_idx, &latency_of)?;
                descend_latency += route.links.iter().map(|&l| latency_of(l)).sum::<f64>() + route.extra_latency;
                descend_links.extend(route.links);
            }
            node = gateway;
        }
        descend_links.reverse();
        links.extend(descend_links);
        latency += descend_latency;

        if links.iter().any(|&l| !self.links[l].is_on()) {
            return Err(no_route());
        }

        Ok(Route { links, latency })
    }

    /// Sum of latencies along `route.links` (spec.md §4.1 `links_latency`).
    pub fn links_latency(&self, route: &[LinkId]) -> f64 {
        route.iter().map(|l| self.links[*l].latency()).sum()
    }

    /// Elements of `zone`.
    pub fn zone_elements(&self, zone: ZoneId) -> Vec<ZoneElement> {
        (0..self.zones[zone].element_count()).map(|i| self.zones[zone].element(i)).collect()
    }

    /// Looks up any named element, returning its kind for disambiguation by the caller.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }
}
