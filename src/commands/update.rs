use crate::error::CafError;
use crate::model::{Name, NetDisk};
use log::debug;

/// Resync every non-leaf group with the ends of its nested net. Returns the
/// number of ends added.
pub fn update_all_contained_ends(disk: &mut NetDisk) -> Result<usize, CafError> {
    let targets: Vec<(Name, Name)> = disk
        .nets()
        .flat_map(|net| {
            net.groups()
                .filter(|g| !g.is_leaf())
                .map(move |g| (net.name(), g.name()))
        })
        .collect();

    let mut added = 0;
    for (net, group) in targets {
        let count = disk.update_contained_ends(net, group)?;
        if count > 0 {
            debug!("Group {} of net {} gained {} ends", group, net, count);
        }
        added += count;
    }
    Ok(added)
}
