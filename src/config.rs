//! The crate's sole I/O boundary: a TOML cluster description, loaded and
//! validated into an immutable [`crate::topology::ClusterTopology`].

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::topology::{ClusterTopology, Switch};

#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub cores: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SwitchConfig {
    pub name: String,
    pub level: u32,
    pub nodes: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SpecCoreConfig {
    pub node: String,
    pub cores: Vec<u16>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
    #[serde(default)]
    pub specialized_cores: Vec<SpecCoreConfig>,
}

impl ClusterConfig {
    /// Reads and parses a TOML cluster description from `path`. Does not
    /// validate cross-references; call [`Self::into_topology`] for that.
    pub fn load(path: &Path) -> Result<ClusterConfig> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Validates the configuration (unique node names, resolvable switch
    /// and specialized-core node references, nonzero core counts,
    /// in-range specialized-core indices) and builds the immutable
    /// [`ClusterTopology`] every other operation in this crate is handed.
    pub fn into_topology(self) -> Result<ClusterTopology> {
        if self.nodes.is_empty() {
            return Err(Error::Config("cluster must have at least one node".into()));
        }

        // IndexMap keeps node lookups in declaration order, so any
        // future error message that iterates this map (e.g. a full
        // cluster dump) lists nodes the same way the config file does,
        // rather than in HashMap's unspecified order.
        let mut name_to_inx: IndexMap<String, usize> = IndexMap::with_capacity(self.nodes.len());
        let mut core_counts = Vec::with_capacity(self.nodes.len());
        for (inx, node) in self.nodes.iter().enumerate() {
            if node.cores == 0 {
                return Err(Error::Config(format!("node {:?} has zero cores", node.name)));
            }
            if name_to_inx.insert(node.name.clone(), inx).is_some() {
                return Err(Error::Config(format!("duplicate node name {:?}", node.name)));
            }
            core_counts.push(node.cores);
        }

        if let Some(dup) = self.switches.iter().map(|sw| &sw.name).duplicates().next() {
            return Err(Error::Config(format!("duplicate switch name {dup:?}")));
        }

        let mut topo = ClusterTopology::new(&core_counts);

        let mut switches = Vec::with_capacity(self.switches.len());
        for sw in &self.switches {
            let mut bitmap = topo.new_node_bitmap();
            for node_name in &sw.nodes {
                let inx = name_to_inx
                    .get(node_name)
                    .ok_or_else(|| Error::Config(format!("switch {:?} references unknown node {:?}", sw.name, node_name)))?;
                bitmap.set(*inx);
            }
            switches.push(Switch::new(sw.name.clone(), sw.level, bitmap));
        }
        topo = topo.with_switches(switches);

        let mut specialized = topo.new_core_bitmap();
        for spec in &self.specialized_cores {
            let inx = *name_to_inx
                .get(&spec.node)
                .ok_or_else(|| Error::Config(format!("specialized-core entry references unknown node {:?}", spec.node)))?;
            let local_count = topo.core_count(inx);
            let offset = topo.core_offset(inx);
            for &local in &spec.cores {
                if local >= local_count {
                    return Err(Error::Config(format!(
                        "node {:?} has {local_count} cores, specialized-core index {local} is out of range",
                        spec.node
                    )));
                }
                specialized.set((offset + local as u32) as usize);
            }
        }
        topo = topo.with_specialized_cores(specialized);

        Ok(topo)
    }
}
