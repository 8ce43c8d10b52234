//! SS node records at NM (spec §3 "SS node record", §4.3 "Liveness").
//! Stable id is the SS's own listen address string (spec §9's "stable ids
//! + lookup" guidance, rather than a direct connection pointer).

use super::file::FileKey;
use std::collections::HashSet;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Suspect,
    Dead,
}

#[derive(Debug, Clone)]
pub struct SsNode {
    pub id: String,
    pub addr: SocketAddr,
    pub liveness: Liveness,
    pub last_heartbeat_unix: u64,
    pub missed_heartbeats: u32,
    pub hosted: HashSet<FileKey>,
}

impl SsNode {
    pub fn new(id: String, addr: SocketAddr, now_unix: u64, hosted: HashSet<FileKey>) -> Self {
        Self {
            id,
            addr,
            liveness: Liveness::Alive,
            last_heartbeat_unix: now_unix,
            missed_heartbeats: 0,
            hosted,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.liveness, Liveness::Alive | Liveness::Suspect)
    }
}

#[derive(Debug, Default)]
pub struct SsRegistry {
    nodes: std::collections::HashMap<String, SsNode>,
}

impl SsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node: SsNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn unregister(&mut self, id: &str) -> Option<SsNode> {
        self.nodes.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&SsNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SsNode> {
        self.nodes.get_mut(id)
    }

    /// Picks the ALIVE node hosting the fewest files, tie-broken by the
    /// smallest id (spec §4.2 "Placement").
    pub fn pick_for_placement(&self) -> Option<&SsNode> {
        self.nodes
            .values()
            .filter(|n| n.liveness == Liveness::Alive)
            .min_by(|a, b| {
                a.hosted
                    .len()
                    .cmp(&b.hosted.len())
                    .then_with(|| a.id.cmp(&b.id))
            })
    }

    pub fn mark_hosted(&mut self, id: &str, file: FileKey) {
        if let Some(n) = self.nodes.get_mut(id) {
            n.hosted.insert(file);
        }
    }

    pub fn unmark_hosted(&mut self, id: &str, file: &FileKey) {
        if let Some(n) = self.nodes.get_mut(id) {
            n.hosted.remove(file);
        }
    }

    /// Records a heartbeat, resetting the missed counter and reviving a
    /// SUSPECT node back to ALIVE.
    pub fn record_heartbeat(&mut self, id: &str, now_unix: u64) {
        if let Some(n) = self.nodes.get_mut(id) {
            n.last_heartbeat_unix = now_unix;
            n.missed_heartbeats = 0;
            n.liveness = Liveness::Alive;
        }
    }

    /// Advances liveness for every node that missed its expected heartbeat
    /// window: three consecutive misses -> SUSPECT, `dead_after` -> DEAD
    /// (spec §4.3, configurable via `nm.toml`'s
    /// `client_dead_after_missed_heartbeats`). Called periodically from the
    /// liveness monitor task.
    pub fn sweep(&mut self, now_unix: u64, interval_secs: u64, dead_after: u32) {
        for node in self.nodes.values_mut() {
            if node.liveness == Liveness::Dead {
                continue;
            }
            let elapsed = now_unix.saturating_sub(node.last_heartbeat_unix);
            let missed = if interval_secs == 0 {
                0
            } else {
                elapsed / interval_secs
            };
            node.missed_heartbeats = missed as u32;
            node.liveness = if node.missed_heartbeats >= dead_after {
                Liveness::Dead
            } else if node.missed_heartbeats >= 3 {
                Liveness::Suspect
            } else {
                Liveness::Alive
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, hosted: usize) -> SsNode {
        let files = (0..hosted)
            .map(|i| ("".to_string(), format!("f{i}.txt")))
            .collect();
        SsNode::new(id.to_string(), "127.0.0.1:9001".parse().unwrap(), 0, files)
    }

    #[test]
    fn placement_picks_fewest_hosted_then_smallest_id() {
        let mut r = SsRegistry::new();
        r.register(node("ss-b", 1));
        r.register(node("ss-a", 1));
        r.register(node("ss-c", 0));
        assert_eq!(r.pick_for_placement().unwrap().id, "ss-c");

        let mut r2 = SsRegistry::new();
        r2.register(node("ss-b", 2));
        r2.register(node("ss-a", 2));
        assert_eq!(r2.pick_for_placement().unwrap().id, "ss-a");
    }

    #[test]
    fn placement_ignores_dead_and_suspect_nodes() {
        let mut r = SsRegistry::new();
        let mut dead = node("ss-a", 0);
        dead.liveness = Liveness::Dead;
        r.register(dead);
        assert!(r.pick_for_placement().is_none());
    }

    #[test]
    fn three_missed_heartbeats_suspects_then_dead() {
        let mut r = SsRegistry::new();
        r.register(node("ss-a", 0));
        r.sweep(30, 10, 4); // 3 intervals elapsed
        assert_eq!(r.get("ss-a").unwrap().liveness, Liveness::Suspect);
        r.sweep(40, 10, 4); // 4 intervals elapsed
        assert_eq!(r.get("ss-a").unwrap().liveness, Liveness::Dead);
    }

    #[test]
    fn heartbeat_revives_a_suspect_node() {
        let mut r = SsRegistry::new();
        r.register(node("ss-a", 0));
        r.sweep(30, 10, 4);
        assert_eq!(r.get("ss-a").unwrap().liveness, Liveness::Suspect);
        r.record_heartbeat("ss-a", 31);
        assert_eq!(r.get("ss-a").unwrap().liveness, Liveness::Alive);
    }
}
