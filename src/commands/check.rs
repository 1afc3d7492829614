use crate::model::NetDisk;
use std::io::{self, Write};

/// Validate the disk, reporting `OK` with the net count on success.
pub fn run_check<W: Write>(disk: &NetDisk, out: &mut W) -> io::Result<()> {
    disk.check()?;
    writeln!(out, "OK\t{} nets", disk.net_count())?;
    Ok(())
}
