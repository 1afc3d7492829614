use crate::error::{inconsistent, CafError};
use crate::model::net::Net;
use crate::model::Name;
use indexmap::IndexSet;

const CODE_GROUP: u8 = b'G';
const CODE_GROUP_END: u8 = b'E';
const CODE_GROUP_TERMINATOR: u8 = 0;

/// A cell of a net's end partition.
///
/// A leaf group has no further structure. A non-leaf group owns a nested net
/// carrying the group's own name. Independently of that, a group is a link
/// while one chain link runs through it and a tangle otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: Name,
    net: Name,
    leaf: bool,
    ends: IndexSet<Name>,
    link: Option<(Name, usize)>,
}

impl Group {
    pub(crate) fn new(name: Name, net: Name, leaf: bool) -> Self {
        Self {
            name,
            net,
            leaf,
            ends: IndexSet::new(),
            link: None,
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    /// The net this group belongs to
    pub fn net(&self) -> Name {
        self.net
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Name of the nested net, present only for non-leaf groups.
    pub fn nested_net(&self) -> Option<Name> {
        (!self.leaf).then_some(self.name)
    }

    pub fn is_tangle(&self) -> bool {
        self.link.is_none()
    }

    pub fn is_link(&self) -> bool {
        self.link.is_some()
    }

    /// `(chain, index)` of the link running through this group
    pub fn link(&self) -> Option<(Name, usize)> {
        self.link
    }

    pub fn end_count(&self) -> usize {
        self.ends.len()
    }

    pub fn contains_end(&self, end: Name) -> bool {
        self.ends.contains(&end)
    }

    /// The end named `end`, if it belongs to this group.
    pub fn end(&self, end: Name) -> Option<Name> {
        self.ends.get(&end).copied()
    }

    pub fn first_end(&self) -> Option<Name> {
        self.ends.first().copied()
    }

    pub fn end_iter(&self) -> GroupEndIterator<'_> {
        GroupEndIterator {
            ends: &self.ends,
            position: 0,
        }
    }

    pub(crate) fn set_leaf(&mut self, leaf: bool) {
        self.leaf = leaf;
    }

    pub(crate) fn set_link(&mut self, link: Option<(Name, usize)>) {
        self.link = link;
    }

    pub(crate) fn insert_end(&mut self, end: Name) {
        self.ends.insert(end);
    }

    pub(crate) fn remove_end(&mut self, end: Name) -> bool {
        self.ends.shift_remove(&end)
    }

    pub(crate) fn end_names(&self) -> impl Iterator<Item = Name> + '_ {
        self.ends.iter().copied()
    }
}

/// Cursor over a group's ends in insertion order that can move both ways.
///
/// The cursor sits between two ends: `next` returns the end after it and
/// `previous` the end before it, each `None` at the respective boundary.
#[derive(Debug, Clone)]
pub struct GroupEndIterator<'a> {
    ends: &'a IndexSet<Name>,
    position: usize,
}

impl GroupEndIterator<'_> {
    pub fn previous(&mut self) -> Option<Name> {
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        self.ends.get_index(self.position).copied()
    }

    /// Move back to the first end.
    pub fn rewind(&mut self) {
        self.position = 0;
    }
}

impl Iterator for GroupEndIterator<'_> {
    type Item = Name;

    fn next(&mut self) -> Option<Name> {
        let end = self.ends.get_index(self.position).copied()?;
        self.position += 1;
        Some(end)
    }
}

/// Emit the group record: the group code, the name, the leaf flag, one
/// record per end in order and a terminator.
pub fn write_binary_representation<F>(group: &Group, mut emit: F)
where
    F: FnMut(&[u8]),
{
    emit(&[CODE_GROUP]);
    emit(&group.name.to_le_bytes());
    emit(&[group.leaf as u8]);
    for &end in &group.ends {
        emit(&[CODE_GROUP_END]);
        emit(&end.to_le_bytes());
    }
    emit(&[CODE_GROUP_TERMINATOR]);
}

/// Rebuild a group record into `net`, attaching the ends it names.
///
/// Returns `Ok(None)`, leaving the cursor untouched, when the input does not
/// start with a group record. On success the cursor is advanced past it.
/// Every named end must already exist in `net` and belong to no group.
pub fn load_from_binary_representation(
    cursor: &mut &[u8],
    net: &mut Net,
) -> Result<Option<Name>, CafError> {
    let data: &[u8] = *cursor;
    let Some((&CODE_GROUP, mut input)) = data.split_first() else {
        return Ok(None);
    };
    let name = read_name(&mut input)?;
    let leaf = match read_byte(&mut input)? {
        0 => false,
        1 => true,
        other => {
            return Err(CafError::Decode(format!(
                "Invalid leaf flag {} for group {}",
                other, name
            )))
        }
    };
    let mut ends = Vec::new();
    loop {
        match read_byte(&mut input)? {
            CODE_GROUP_END => ends.push(read_name(&mut input)?),
            CODE_GROUP_TERMINATOR => break,
            other => {
                return Err(CafError::Decode(format!(
                    "Unexpected code {:#04x} in group {}",
                    other, name
                )))
            }
        }
    }

    for &end in &ends {
        let e = net.end(end).ok_or(CafError::Missing { kind: "end", name: end })?;
        if let Some(other) = e.group() {
            return Err(inconsistent(format!(
                "End {} of group {} already belongs to group {}",
                end, name, other
            )));
        }
    }
    net.insert_group(Group::new(name, net.name(), leaf))?;
    for &end in &ends {
        net.set_group(end, name)?;
    }
    *cursor = input;
    Ok(Some(name))
}

fn read_byte(input: &mut &[u8]) -> Result<u8, CafError> {
    let data: &[u8] = *input;
    let (&byte, rest) = data
        .split_first()
        .ok_or_else(|| CafError::Decode("Truncated group record".to_string()))?;
    *input = rest;
    Ok(byte)
}

fn read_name(input: &mut &[u8]) -> Result<Name, CafError> {
    let data: &[u8] = *input;
    let (bytes, rest) = data
        .split_first_chunk::<8>()
        .ok_or_else(|| CafError::Decode("Truncated name in group record".to_string()))?;
    *input = rest;
    Ok(Name::from_le_bytes(*bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net_with_ends(ends: &[Name]) -> Net {
        let mut net = Net::new(1);
        for &end in ends {
            net.add_end(end).unwrap();
        }
        net
    }

    fn encode(group: &Group) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_binary_representation(group, |chunk| bytes.extend_from_slice(chunk));
        bytes
    }

    #[test]
    fn test_iterator_moves_both_ways() {
        let mut group = Group::new(5, 1, true);
        group.insert_end(10);
        group.insert_end(11);
        let mut it = group.end_iter();
        assert_eq!(it.next(), Some(10));
        let mut copy = it.clone();
        assert_eq!(it.previous(), Some(10));
        assert_eq!(it.previous(), None);
        assert_eq!(copy.next(), Some(11));
        assert_eq!(copy.next(), None);
        assert_eq!(copy.next(), None);
        assert_eq!(copy.previous(), Some(11));
        copy.rewind();
        assert_eq!(copy.collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn test_record_layout() {
        let mut group = Group::new(0x0102, 1, false);
        group.insert_end(7);
        let bytes = encode(&group);
        assert_eq!(bytes.len(), 1 + 8 + 1 + 9 + 1);
        assert_eq!(bytes[0], CODE_GROUP);
        assert_eq!(&bytes[1..9], &0x0102u64.to_le_bytes());
        assert_eq!(bytes[9], 0);
        assert_eq!(bytes[10], CODE_GROUP_END);
        assert_eq!(*bytes.last().unwrap(), CODE_GROUP_TERMINATOR);
    }

    #[test]
    fn test_load_advances_cursor_past_one_record() {
        let mut net = net_with_ends(&[20, 21, 22]);
        let mut first = Group::new(30, 1, true);
        first.insert_end(21);
        first.insert_end(20);
        let mut second = Group::new(31, 1, false);
        second.insert_end(22);
        let mut bytes = encode(&first);
        bytes.extend(encode(&second));

        let mut cursor = &bytes[..];
        assert_eq!(load_from_binary_representation(&mut cursor, &mut net).unwrap(), Some(30));
        assert_eq!(load_from_binary_representation(&mut cursor, &mut net).unwrap(), Some(31));
        assert!(cursor.is_empty());
        assert_eq!(load_from_binary_representation(&mut cursor, &mut net).unwrap(), None);

        let loaded = net.group(30).unwrap();
        assert_eq!(loaded.end_iter().collect::<Vec<_>>(), vec![21, 20]);
        assert!(loaded.is_leaf());
        assert_eq!(net.group(31).unwrap().nested_net(), Some(31));
        assert_eq!(net.end(22).unwrap().group(), Some(31));
    }

    #[test]
    fn test_load_rejects_bad_input() {
        let mut net = net_with_ends(&[20]);
        let mut cursor: &[u8] = &[0xff, 1, 2];
        assert_eq!(load_from_binary_representation(&mut cursor, &mut net).unwrap(), None);
        assert_eq!(cursor.len(), 3);

        let mut group = Group::new(40, 1, true);
        group.insert_end(99);
        let bytes = encode(&group);
        let mut cursor = &bytes[..];
        assert!(matches!(
            load_from_binary_representation(&mut cursor, &mut net),
            Err(CafError::Missing { kind: "end", name: 99 })
        ));
        assert_eq!(cursor.len(), bytes.len());
        assert!(net.group(40).is_none());

        let truncated = &bytes[..bytes.len() - 4];
        let mut cursor = truncated;
        assert!(matches!(
            load_from_binary_representation(&mut cursor, &mut net),
            Err(CafError::Decode(_))
        ));
    }
}
