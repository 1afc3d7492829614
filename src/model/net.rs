use crate::error::{inconsistent, CafError};
use crate::model::chain::{Chain, Link};
use crate::model::group::Group;
use crate::model::Name;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct End {
    name: Name,
    group: Option<Name>,
}

impl End {
    pub fn name(&self) -> Name {
        self.name
    }

    /// Group of the owning net holding this end
    pub fn group(&self) -> Option<Name> {
        self.group
    }
}

/// One level of the decomposition.
#[derive(Debug, Clone)]
pub struct Net {
    name: Name,
    parent: Option<(Name, Name)>,
    ends: IndexMap<Name, End>,
    groups: IndexMap<Name, Group>,
    chains: IndexMap<Name, Chain>,
}

impl Net {
    pub(crate) fn new(name: Name) -> Self {
        Self {
            name,
            parent: None,
            ends: IndexMap::new(),
            groups: IndexMap::new(),
            chains: IndexMap::new(),
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    /// `(net, group)` this net is nested in
    pub fn parent(&self) -> Option<(Name, Name)> {
        self.parent
    }

    pub fn parent_group(&self) -> Option<Name> {
        self.parent.map(|(_, group)| group)
    }

    pub(crate) fn set_parent(&mut self, parent: Option<(Name, Name)>) {
        self.parent = parent;
    }

    pub fn end(&self, name: Name) -> Option<&End> {
        self.ends.get(&name)
    }

    pub fn ends(&self) -> impl Iterator<Item = &End> {
        self.ends.values()
    }

    pub fn end_count(&self) -> usize {
        self.ends.len()
    }

    pub fn first_end(&self) -> Option<&End> {
        self.ends.first().map(|(_, end)| end)
    }

    pub fn group(&self, name: Name) -> Option<&Group> {
        self.groups.get(&name)
    }

    pub(crate) fn group_mut(&mut self, name: Name) -> Option<&mut Group> {
        self.groups.get_mut(&name)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn first_group(&self) -> Option<&Group> {
        self.groups.first().map(|(_, group)| group)
    }

    pub fn chain(&self, name: Name) -> Option<&Chain> {
        self.chains.get(&name)
    }

    pub fn chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains.values()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// A single leaf group and no chains: nothing left to decompose.
    pub fn is_terminal(&self) -> bool {
        self.chains.is_empty()
            && self.groups.len() == 1
            && self.first_group().is_some_and(|g| g.is_leaf())
    }

    pub(crate) fn add_end(&mut self, name: Name) -> Result<(), CafError> {
        if self.ends.contains_key(&name) {
            return Err(inconsistent(format!(
                "Net {} already has an end named {}",
                self.name, name
            )));
        }
        self.ends.insert(name, End { name, group: None });
        Ok(())
    }

    pub(crate) fn insert_group(&mut self, group: Group) -> Result<(), CafError> {
        if self.groups.contains_key(&group.name()) {
            return Err(inconsistent(format!(
                "Net {} already has a group named {}",
                self.name,
                group.name()
            )));
        }
        self.groups.insert(group.name(), group);
        Ok(())
    }

    pub(crate) fn add_chain(&mut self, name: Name) -> Result<(), CafError> {
        if self.chains.contains_key(&name) {
            return Err(inconsistent(format!(
                "Net {} already has a chain named {}",
                self.name, name
            )));
        }
        self.chains.insert(name, Chain::new(name));
        Ok(())
    }

    fn missing_end(name: Name) -> CafError {
        CafError::Missing { kind: "end", name }
    }

    fn missing_group(name: Name) -> CafError {
        CafError::Missing { kind: "group", name }
    }

    /// True if a link of the end's current group uses the end.
    fn end_in_link(&self, end: Name) -> bool {
        let Some(group) = self.ends.get(&end).and_then(|e| e.group) else {
            return false;
        };
        self.group_link(group)
            .is_some_and(|link| link.left == end || link.right == end)
    }

    /// Move `end` into `group`, taking it out of its previous group first.
    pub fn set_group(&mut self, end: Name, group: Name) -> Result<(), CafError> {
        let previous = self.ends.get(&end).ok_or_else(|| Self::missing_end(end))?.group;
        if !self.groups.contains_key(&group) {
            return Err(Self::missing_group(group));
        }
        if previous == Some(group) {
            return Ok(());
        }
        if self.end_in_link(end) {
            return Err(inconsistent(format!(
                "End {} is held by a link of group {}",
                end,
                previous.unwrap_or_default()
            )));
        }
        if let Some(g) = previous.and_then(|p| self.groups.get_mut(&p)) {
            g.remove_end(end);
        }
        if let Some(g) = self.groups.get_mut(&group) {
            g.insert_end(end);
        }
        if let Some(e) = self.ends.get_mut(&end) {
            e.group = Some(group);
        }
        Ok(())
    }

    /// Take an end out of its group, leaving it ungrouped.
    pub(crate) fn detach_end(&mut self, end: Name) -> Result<(), CafError> {
        let group = self.ends.get(&end).ok_or_else(|| Self::missing_end(end))?.group;
        if self.end_in_link(end) {
            return Err(inconsistent(format!("End {} is held by a link", end)));
        }
        if let Some(g) = group.and_then(|g| self.groups.get_mut(&g)) {
            g.remove_end(end);
        }
        if let Some(e) = self.ends.get_mut(&end) {
            e.group = None;
        }
        Ok(())
    }

    /// Destroy an end, detaching it from its group.
    pub fn destroy_end(&mut self, end: Name) -> Result<(), CafError> {
        let group = self.ends.get(&end).ok_or_else(|| Self::missing_end(end))?.group;
        if self.end_in_link(end) {
            return Err(inconsistent(format!("End {} is held by a link", end)));
        }
        if let Some(g) = group.and_then(|g| self.groups.get_mut(&g)) {
            g.remove_end(end);
        }
        self.ends.shift_remove(&end);
        Ok(())
    }

    /// The link running through `group`, if any.
    pub fn group_link(&self, group: Name) -> Option<&Link> {
        let (chain, index) = self.groups.get(&group)?.link()?;
        self.chains.get(&chain)?.link(index)
    }

    /// Append a link joining `left` and `right` through `group` to `chain`.
    /// Both ends must already belong to the group, which must not hold a link.
    pub fn construct_link(
        &mut self,
        chain: Name,
        left: Name,
        right: Name,
        group: Name,
    ) -> Result<usize, CafError> {
        if !self.chains.contains_key(&chain) {
            return Err(CafError::Missing { kind: "chain", name: chain });
        }
        let g = self.groups.get(&group).ok_or_else(|| Self::missing_group(group))?;
        if let Some((other_chain, _)) = g.link() {
            return Err(inconsistent(format!(
                "Group {} already holds a link of chain {}",
                group, other_chain
            )));
        }
        if left == right {
            return Err(inconsistent(format!("Link ends must differ, got {} twice", left)));
        }
        for end in [left, right] {
            let e = self.ends.get(&end).ok_or_else(|| Self::missing_end(end))?;
            if e.group != Some(group) {
                return Err(inconsistent(format!(
                    "End {} is not in group {}",
                    end, group
                )));
            }
        }
        let index = self
            .chains
            .get_mut(&chain)
            .map(|c| c.push_link(Link { left, right, group }))
            .ok_or(CafError::Missing { kind: "chain", name: chain })?;
        if let Some(g) = self.groups.get_mut(&group) {
            g.set_link(Some((chain, index)));
        }
        Ok(index)
    }

    /// Destroy a chain; every group it ran through becomes a tangle.
    pub fn destroy_chain(&mut self, chain: Name) -> Result<Chain, CafError> {
        let removed = self
            .chains
            .shift_remove(&chain)
            .ok_or(CafError::Missing { kind: "chain", name: chain })?;
        for link in removed.links() {
            if let Some(g) = self.groups.get_mut(&link.group) {
                if g.link().is_some_and(|(c, _)| c == chain) {
                    g.set_link(None);
                }
            }
        }
        Ok(removed)
    }

    /// Destroy a group, leaving its ends without a group. A group still
    /// holding a link must have its chain destroyed first.
    pub fn destroy_group(&mut self, group: Name) -> Result<Group, CafError> {
        let g = self.groups.get(&group).ok_or_else(|| Self::missing_group(group))?;
        if let Some((chain, _)) = g.link() {
            return Err(inconsistent(format!(
                "Group {} holds a link of chain {}",
                group, chain
            )));
        }
        let removed = self
            .groups
            .shift_remove(&group)
            .ok_or_else(|| Self::missing_group(group))?;
        for end in removed.end_names() {
            if let Some(e) = self.ends.get_mut(&end) {
                e.group = None;
            }
        }
        Ok(removed)
    }
}
