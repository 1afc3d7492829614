use crate::model::Name;

/// One step of a chain through a group: the pair of ends it joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub left: Name,
    pub right: Name,
    pub group: Name,
}

/// An ordered sequence of links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    name: Name,
    links: Vec<Link>,
}

impl Chain {
    pub(crate) fn new(name: Name) -> Self {
        Self {
            name,
            links: Vec::new(),
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn push_link(&mut self, link: Link) -> usize {
        self.links.push(link);
        self.links.len() - 1
    }
}
