use crate::error::{inconsistent, CafError};
use crate::model::group::{load_from_binary_representation, write_binary_representation, Group};
use crate::model::net::Net;
use crate::model::Name;
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const DISK_MAGIC: &[u8; 8] = b"CAFDISK1";

#[derive(Serialize, Deserialize)]
struct ChainImage {
    name: Name,
    /// `(left, right, group)` per link
    links: Vec<(Name, Name, Name)>,
}

#[derive(Serialize, Deserialize)]
struct NetImage {
    name: Name,
    parent: Option<(Name, Name)>,
    ends: Vec<Name>,
    /// Group records as written by `write_binary_representation`
    groups: Vec<Vec<u8>>,
    chains: Vec<ChainImage>,
}

#[derive(Serialize, Deserialize)]
struct DiskImage {
    next_name: Name,
    nets: Vec<NetImage>,
}

/// Store owning every net of a decomposition and handing out unique names.
#[derive(Debug, Clone)]
pub struct NetDisk {
    next_name: Name,
    nets: IndexMap<Name, Net>,
}

impl Default for NetDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl NetDisk {
    pub fn new() -> Self {
        Self {
            next_name: 1,
            nets: IndexMap::new(),
        }
    }

    fn allocate_name(&mut self) -> Name {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    pub fn net(&self, name: Name) -> Option<&Net> {
        self.nets.get(&name)
    }

    pub fn net_mut(&mut self, name: Name) -> Option<&mut Net> {
        self.nets.get_mut(&name)
    }

    pub fn nets(&self) -> impl Iterator<Item = &Net> {
        self.nets.values()
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    fn existing_net(&self, name: Name) -> Result<&Net, CafError> {
        self.nets.get(&name).ok_or(CafError::Missing { kind: "net", name })
    }

    fn existing_net_mut(&mut self, name: Name) -> Result<&mut Net, CafError> {
        self.nets
            .get_mut(&name)
            .ok_or(CafError::Missing { kind: "net", name })
    }

    fn existing_group(&self, net: Name, group: Name) -> Result<&Group, CafError> {
        self.existing_net(net)?
            .group(group)
            .ok_or(CafError::Missing { kind: "group", name: group })
    }

    pub fn construct_net(&mut self) -> Name {
        let name = self.allocate_name();
        self.nets.insert(name, Net::new(name));
        name
    }

    pub fn construct_end(&mut self, net: Name) -> Result<Name, CafError> {
        self.existing_net(net)?;
        let name = self.allocate_name();
        self.existing_net_mut(net)?.add_end(name)?;
        Ok(name)
    }

    /// Copy `end` of `source_net` into `target_net` under the same name.
    pub fn copy_construct_end(
        &mut self,
        source_net: Name,
        end: Name,
        target_net: Name,
    ) -> Result<Name, CafError> {
        self.existing_net(source_net)?
            .end(end)
            .ok_or(CafError::Missing { kind: "end", name: end })?;
        self.existing_net_mut(target_net)?.add_end(end)?;
        Ok(end)
    }

    /// Construct a leaf group with a fresh name.
    pub fn construct_leaf_group(&mut self, net: Name) -> Result<Name, CafError> {
        self.existing_net(net)?;
        let name = self.allocate_name();
        self.existing_net_mut(net)?.insert_group(Group::new(name, net, true))?;
        Ok(name)
    }

    /// Construct the non-leaf group pointing at `nested_net`. The group takes
    /// the nested net's name and every end the nested net holds.
    pub fn construct_group(&mut self, net: Name, nested_net: Name) -> Result<Name, CafError> {
        if net == nested_net {
            return Err(inconsistent(format!("Net {} cannot be nested in itself", net)));
        }
        let nested = self.existing_net(nested_net)?;
        if let Some((parent_net, parent_group)) = nested.parent() {
            return Err(inconsistent(format!(
                "Net {} is already nested in group {} of net {}",
                nested_net, parent_group, parent_net
            )));
        }
        let ends: Vec<Name> = nested.ends().map(|e| e.name()).collect();
        let parent = self.existing_net(net)?;
        if parent.group(nested_net).is_some() {
            return Err(inconsistent(format!(
                "Net {} already has a group named {}",
                net, nested_net
            )));
        }
        for &end in &ends {
            let e = parent
                .end(end)
                .ok_or(CafError::Missing { kind: "end", name: end })?;
            if let Some(other) = e.group() {
                return Err(inconsistent(format!(
                    "End {} already belongs to group {}",
                    end, other
                )));
            }
        }

        let parent = self.existing_net_mut(net)?;
        parent.insert_group(Group::new(nested_net, net, false))?;
        for &end in &ends {
            parent.set_group(end, nested_net)?;
        }
        self.existing_net_mut(nested_net)?
            .set_parent(Some((net, nested_net)));
        Ok(nested_net)
    }

    pub fn construct_chain(&mut self, net: Name) -> Result<Name, CafError> {
        self.existing_net(net)?;
        let name = self.allocate_name();
        self.existing_net_mut(net)?.add_chain(name)?;
        Ok(name)
    }

    /// Make the group hold exactly the ends of its nested net. Ends the nested
    /// net no longer has are left ungrouped; nested ends sitting in another
    /// group of `net` are moved over. Returns the number of ends added.
    pub fn update_contained_ends(&mut self, net: Name, group: Name) -> Result<usize, CafError> {
        let g = self.existing_group(net, group)?;
        let nested_name = g
            .nested_net()
            .ok_or_else(|| inconsistent(format!("Group {} is a leaf", group)))?;
        let nested = self.existing_net(nested_name)?;
        let parent = self.existing_net(net)?;

        let stale: Vec<Name> = g.end_names().filter(|&e| nested.end(e).is_none()).collect();
        let mut missing = Vec::new();
        for end in nested.ends().map(|e| e.name()) {
            if g.contains_end(end) {
                continue;
            }
            parent
                .end(end)
                .ok_or(CafError::Missing { kind: "end", name: end })?;
            missing.push(end);
        }

        let parent = self.existing_net_mut(net)?;
        for &end in &stale {
            parent.detach_end(end)?;
        }
        for &end in &missing {
            parent.set_group(end, group)?;
        }
        if !stale.is_empty() {
            debug!(
                "Dropped {} ends from group {} missing in nested net {}",
                stale.len(),
                group,
                nested_name
            );
        }
        Ok(missing.len())
    }

    /// Give a leaf group a nested net holding copies of its ends in a single
    /// fresh leaf group.
    pub fn make_nested_net(&mut self, net: Name, group: Name) -> Result<Name, CafError> {
        let g = self.existing_group(net, group)?;
        if !g.is_leaf() {
            return Err(CafError::AlreadyNested(group));
        }
        if self.nets.contains_key(&group) {
            return Err(inconsistent(format!("A net named {} already exists", group)));
        }
        let ends: Vec<Name> = g.end_names().collect();

        let mut nested = Net::new(group);
        nested.set_parent(Some((net, group)));
        let leaf = self.allocate_name();
        nested.insert_group(Group::new(leaf, group, true))?;
        for &end in &ends {
            nested.add_end(end)?;
            nested.set_group(end, leaf)?;
        }
        self.nets.insert(group, nested);
        if let Some(g) = self.existing_net_mut(net)?.group_mut(group) {
            g.set_leaf(false);
        }
        debug!(
            "Nested net {} created for group {} of net {} with {} ends",
            group,
            group,
            net,
            ends.len()
        );
        Ok(group)
    }

    /// Destroy a net. Its parent group becomes a leaf and nets nested below
    /// it lose their parent.
    pub fn destroy_net(&mut self, name: Name) -> Result<Net, CafError> {
        let removed = self
            .nets
            .shift_remove(&name)
            .ok_or(CafError::Missing { kind: "net", name })?;
        if let Some((parent_net, parent_group)) = removed.parent() {
            if let Some(g) = self
                .nets
                .get_mut(&parent_net)
                .and_then(|n| n.group_mut(parent_group))
            {
                g.set_leaf(true);
            }
        }
        for nested in removed.groups().filter_map(|g| g.nested_net()) {
            if let Some(n) = self.nets.get_mut(&nested) {
                n.set_parent(None);
            }
        }
        Ok(removed)
    }

    /// Validate the model invariants of every net.
    pub fn check(&self) -> Result<(), CafError> {
        for net in self.nets.values() {
            self.check_net(net)?;
        }
        Ok(())
    }

    fn check_net(&self, net: &Net) -> Result<(), CafError> {
        let n = net.name();
        for end in net.ends() {
            if let Some(group) = end.group() {
                let contains = net.group(group).is_some_and(|g| g.contains_end(end.name()));
                if !contains {
                    return Err(inconsistent(format!(
                        "End {} of net {} points at group {} which does not hold it",
                        end.name(),
                        n,
                        group
                    )));
                }
            }
        }

        for group in net.groups() {
            let g = group.name();
            if group.net() != n {
                return Err(inconsistent(format!("Group {} is filed under net {}", g, n)));
            }
            for end in group.end_names() {
                if net.end(end).and_then(|e| e.group()) != Some(g) {
                    return Err(inconsistent(format!(
                        "Group {} of net {} holds end {} that does not point back",
                        g, n, end
                    )));
                }
            }
            if let Some((chain, index)) = group.link() {
                let link = net.chain(chain).and_then(|c| c.link(index));
                if link.map(|l| l.group) != Some(g) {
                    return Err(inconsistent(format!(
                        "Group {} points at link {} of chain {} which does not run through it",
                        g, index, chain
                    )));
                }
            }
            if let Some(nested_name) = group.nested_net() {
                let nested = self.nets.get(&nested_name).ok_or_else(|| {
                    inconsistent(format!("Nested net {} of group {} is missing", nested_name, g))
                })?;
                if nested.parent() != Some((n, g)) {
                    return Err(inconsistent(format!(
                        "Nested net {} does not record group {} of net {} as its parent",
                        nested_name, g, n
                    )));
                }
                if let Some(end) = nested.ends().find(|e| !group.contains_end(e.name())) {
                    return Err(inconsistent(format!(
                        "End {} of nested net {} is not in group {}",
                        end.name(),
                        nested_name,
                        g
                    )));
                }
            }
        }

        for chain in net.chains() {
            for (index, link) in chain.links().iter().enumerate() {
                let group = net.group(link.group).ok_or_else(|| {
                    inconsistent(format!(
                        "Link {} of chain {} runs through missing group {}",
                        index,
                        chain.name(),
                        link.group
                    ))
                })?;
                if group.link() != Some((chain.name(), index)) {
                    return Err(inconsistent(format!(
                        "Group {} does not record link {} of chain {}",
                        link.group,
                        index,
                        chain.name()
                    )));
                }
                if !group.contains_end(link.left) || !group.contains_end(link.right) {
                    return Err(inconsistent(format!(
                        "Link {} of chain {} joins ends outside group {}",
                        index,
                        chain.name(),
                        link.group
                    )));
                }
            }
        }

        if let Some((parent_net, parent_group)) = net.parent() {
            let parent_ok = parent_group == n
                && self
                    .nets
                    .get(&parent_net)
                    .and_then(|p| p.group(parent_group))
                    .is_some_and(|g| !g.is_leaf());
            if !parent_ok {
                return Err(inconsistent(format!(
                    "Net {} records parent group {} of net {} which does not nest it",
                    n, parent_group, parent_net
                )));
            }
        }
        Ok(())
    }

    fn image(&self) -> DiskImage {
        let nets = self
            .nets
            .values()
            .map(|net| NetImage {
                name: net.name(),
                parent: net.parent(),
                ends: net.ends().map(|e| e.name()).collect(),
                groups: net
                    .groups()
                    .map(|g| {
                        let mut bytes = Vec::new();
                        write_binary_representation(g, |chunk| bytes.extend_from_slice(chunk));
                        bytes
                    })
                    .collect(),
                chains: net
                    .chains()
                    .map(|c| ChainImage {
                        name: c.name(),
                        links: c.links().iter().map(|l| (l.left, l.right, l.group)).collect(),
                    })
                    .collect(),
            })
            .collect();
        DiskImage {
            next_name: self.next_name,
            nets,
        }
    }

    fn from_image(image: DiskImage) -> Result<Self, CafError> {
        let mut disk = NetDisk::new();
        let mut max_name = 0;
        for net_image in image.nets {
            let mut net = Net::new(net_image.name);
            net.set_parent(net_image.parent);
            max_name = max_name.max(net_image.name);
            for end in net_image.ends {
                net.add_end(end)?;
                max_name = max_name.max(end);
            }
            for record in &net_image.groups {
                let mut cursor = &record[..];
                let group = load_from_binary_representation(&mut cursor, &mut net)?
                    .ok_or_else(|| {
                        CafError::Decode(format!("Net {} holds a non-group record", net_image.name))
                    })?;
                if !cursor.is_empty() {
                    return Err(CafError::Decode(format!(
                        "Trailing bytes after group {} in net {}",
                        group, net_image.name
                    )));
                }
                max_name = max_name.max(group);
            }
            for chain in net_image.chains {
                net.add_chain(chain.name)?;
                max_name = max_name.max(chain.name);
                for (left, right, group) in chain.links {
                    net.construct_link(chain.name, left, right, group)?;
                }
            }
            if disk.nets.insert(net_image.name, net).is_some() {
                return Err(inconsistent(format!(
                    "Net {} appears twice",
                    net_image.name
                )));
            }
        }
        disk.next_name = image.next_name.max(max_name + 1);
        disk.check()?;
        Ok(disk)
    }

    /// Write the magic bytes and an image of every net. A disk failing
    /// `check` is refused before anything is written.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), CafError> {
        self.check()?;
        writer.write_all(DISK_MAGIC)?;
        bincode::serde::encode_into_std_write(self.image(), &mut writer, bincode::config::standard())
            .map_err(|e| {
                CafError::IoError(std::io::Error::other(format!(
                    "Failed to encode net disk: {e:?}"
                )))
            })?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, CafError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != DISK_MAGIC {
            return Err(CafError::Decode(
                "Invalid magic bytes - not a net disk file".to_string(),
            ));
        }
        let image: DiskImage =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .map_err(|e| CafError::Decode(format!("Failed to load net disk: {e:?}")))?;
        Self::from_image(image)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CafError> {
        let file = File::create(path.as_ref())?;
        self.write_to(BufWriter::new(file))?;
        info!(
            "Saved {} nets to {}",
            self.nets.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CafError> {
        let file = File::open(path.as_ref())?;
        let disk = Self::read_from(BufReader::new(file))?;
        info!(
            "Loaded {} nets from {}",
            disk.nets.len(),
            path.as_ref().display()
        );
        Ok(disk)
    }
}
