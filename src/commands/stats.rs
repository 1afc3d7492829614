use crate::model::NetDisk;
use std::io::{self, Write};

/// Object counts over every net of a disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub nets: usize,
    pub terminal_nets: usize,
    pub ends: usize,
    pub groups: usize,
    pub leaf_groups: usize,
    pub tangles: usize,
    pub links: usize,
    pub chains: usize,
}

pub fn collect_stats(disk: &NetDisk) -> DiskStats {
    let mut stats = DiskStats::default();
    for net in disk.nets() {
        stats.nets += 1;
        if net.is_terminal() {
            stats.terminal_nets += 1;
        }
        stats.ends += net.end_count();
        stats.chains += net.chain_count();
        for group in net.groups() {
            stats.groups += 1;
            if group.is_leaf() {
                stats.leaf_groups += 1;
            }
            if group.is_link() {
                stats.links += 1;
            } else {
                stats.tangles += 1;
            }
        }
    }
    stats
}

pub fn write_stats<W: Write>(disk: &NetDisk, out: &mut W) -> io::Result<()> {
    let stats = collect_stats(disk);
    writeln!(out, "nets\t{}", stats.nets)?;
    writeln!(out, "terminal_nets\t{}", stats.terminal_nets)?;
    writeln!(out, "ends\t{}", stats.ends)?;
    writeln!(out, "groups\t{}", stats.groups)?;
    writeln!(out, "leaf_groups\t{}", stats.leaf_groups)?;
    writeln!(out, "tangles\t{}", stats.tangles)?;
    writeln!(out, "links\t{}", stats.links)?;
    writeln!(out, "chains\t{}", stats.chains)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_groups_by_kind() {
        let mut disk = NetDisk::new();
        let net = disk.construct_net();
        let a = disk.construct_end(net).unwrap();
        let b = disk.construct_end(net).unwrap();
        let linked = disk.construct_leaf_group(net).unwrap();
        let nested = disk.construct_leaf_group(net).unwrap();
        disk.net_mut(net).unwrap().set_group(a, linked).unwrap();
        disk.net_mut(net).unwrap().set_group(b, linked).unwrap();
        let chain = disk.construct_chain(net).unwrap();
        disk.net_mut(net).unwrap().construct_link(chain, a, b, linked).unwrap();
        disk.make_nested_net(net, nested).unwrap();

        let stats = collect_stats(&disk);
        assert_eq!(stats.nets, 2);
        assert_eq!(stats.terminal_nets, 1);
        assert_eq!(stats.ends, 2);
        assert_eq!(stats.groups, 3);
        assert_eq!(stats.leaf_groups, 2);
        assert_eq!(stats.links, 1);
        assert_eq!(stats.tangles, 2);
        assert_eq!(stats.chains, 1);

        let mut out = Vec::new();
        write_stats(&disk, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("nets\t2\n"));
        assert!(text.contains("links\t1\n"));
    }
}
