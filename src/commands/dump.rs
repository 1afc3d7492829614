use crate::model::{Name, Net, NetDisk};
use std::io::{self, Write};

/// Print the net hierarchy, nested nets indented below their group.
pub fn write_dump<W: Write>(disk: &NetDisk, out: &mut W) -> io::Result<()> {
    for net in disk.nets().filter(|n| n.parent().is_none()) {
        write_net(disk, net, 0, out)?;
    }
    Ok(())
}

fn names(iter: impl Iterator<Item = Name>) -> String {
    iter.map(|n| n.to_string()).collect::<Vec<_>>().join(",")
}

fn write_net<W: Write>(disk: &NetDisk, net: &Net, depth: usize, out: &mut W) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    writeln!(
        out,
        "{}net {} ends={} groups={} chains={}{}",
        indent,
        net.name(),
        net.end_count(),
        net.group_count(),
        net.chain_count(),
        if net.is_terminal() { " terminal" } else { "" }
    )?;
    for group in net.groups() {
        let kind = if group.is_leaf() { "leaf" } else { "nested" };
        let link = match group.link() {
            Some((chain, index)) => format!(" link={}:{}", chain, index),
            None => " tangle".to_string(),
        };
        writeln!(
            out,
            "{}  group {} {}{} ends=[{}]",
            indent,
            group.name(),
            kind,
            link,
            names(group.end_iter())
        )?;
        if let Some(nested) = group.nested_net().and_then(|n| disk.net(n)) {
            write_net(disk, nested, depth + 2, out)?;
        }
    }
    for chain in net.chains() {
        let links = chain
            .links()
            .iter()
            .map(|l| format!("({},{},{})", l.left, l.right, l.group))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, "{}  chain {} links=[{}]", indent, chain.name(), links)?;
    }
    Ok(())
}
