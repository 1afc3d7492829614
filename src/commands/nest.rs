use crate::error::CafError;
use crate::model::{Name, NetDisk};
use log::info;

/// Give `group` a nested net. Without `net`, the group is looked up across
/// every net of the disk.
pub fn nest_group(disk: &mut NetDisk, net: Option<Name>, group: Name) -> Result<Name, CafError> {
    let owner = match net {
        Some(net) => net,
        None => disk
            .nets()
            .find(|n| n.group(group).is_some())
            .map(|n| n.name())
            .ok_or(CafError::Missing {
                kind: "group",
                name: group,
            })?,
    };
    let nested = disk.make_nested_net(owner, group)?;
    info!("Nested net {} created under net {}", nested, owner);
    Ok(nested)
}
