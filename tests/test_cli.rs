//! Command-line round trips over a net disk written by the library.

use caf::model::{Name, NetDisk};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn get_caf_binary() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_caf") {
        return PathBuf::from(path);
    }
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidates = [
        manifest_dir.join("target/release/caf"),
        manifest_dir.join("target/debug/caf"),
    ];
    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }
    PathBuf::from("caf")
}

fn run_caf(args: &[&str]) -> std::io::Result<Output> {
    Command::new(get_caf_binary()).args(args).output()
}

/// One net with a linked leaf group and an empty leaf group; returns the
/// empty group's name.
fn write_disk(path: &Path) -> Name {
    let mut disk = NetDisk::new();
    let net = disk.construct_net();
    let a = disk.construct_end(net).unwrap();
    let b = disk.construct_end(net).unwrap();
    let c = disk.construct_end(net).unwrap();
    let linked = disk.construct_leaf_group(net).unwrap();
    let spare = disk.construct_leaf_group(net).unwrap();
    let n = disk.net_mut(net).unwrap();
    n.set_group(a, linked).unwrap();
    n.set_group(b, linked).unwrap();
    n.set_group(c, spare).unwrap();
    let chain = disk.construct_chain(net).unwrap();
    disk.net_mut(net)
        .unwrap()
        .construct_link(chain, a, b, linked)
        .unwrap();
    disk.save(path).unwrap();
    spare
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "caf failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_stats_and_check() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let disk_path = temp_dir.path().join("nets.caf");
    write_disk(&disk_path);
    let disk_arg = disk_path.to_str().unwrap();

    let stats = stdout_of(&run_caf(&["stats", "-d", disk_arg])?);
    assert!(stats.contains("nets\t1\n"));
    assert!(stats.contains("ends\t3\n"));
    assert!(stats.contains("groups\t2\n"));
    assert!(stats.contains("links\t1\n"));
    assert!(stats.contains("chains\t1\n"));

    let check = stdout_of(&run_caf(&["check", "-d", disk_arg])?);
    assert_eq!(check.trim(), "OK\t1 nets");
    Ok(())
}

#[test]
fn test_nest_saves_the_disk() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let disk_path = temp_dir.path().join("nets.caf");
    let spare = write_disk(&disk_path);
    let disk_arg = disk_path.to_str().unwrap();
    let group_arg = spare.to_string();

    let nested = stdout_of(&run_caf(&["nest", "-d", disk_arg, "-g", &group_arg])?);
    assert_eq!(nested.trim(), group_arg);

    let disk = NetDisk::load(&disk_path).unwrap();
    assert_eq!(disk.net_count(), 2);
    let created = disk.net(spare).unwrap();
    assert_eq!(created.end_count(), 1);
    assert!(created.is_terminal());

    let dump = stdout_of(&run_caf(&["dump", "-d", disk_arg])?);
    assert!(dump.contains(&format!("  group {} nested tangle", spare)));
    assert!(dump.contains(&format!("    net {} ends=1 groups=1 chains=0 terminal", spare)));

    // a second nest of the same group fails and leaves the file alone
    let again = run_caf(&["nest", "-d", disk_arg, "-g", &group_arg])?;
    assert!(!again.status.success());
    assert_eq!(NetDisk::load(&disk_path).unwrap().net_count(), 2);
    Ok(())
}

#[test]
fn test_update_reports_added_ends() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let disk_path = temp_dir.path().join("nets.caf");
    write_disk(&disk_path);
    let disk_arg = disk_path.to_str().unwrap();

    let added = stdout_of(&run_caf(&["update", "-d", disk_arg])?);
    assert_eq!(added.trim(), "0");
    Ok(())
}

#[test]
fn test_rejects_foreign_files() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let bogus = temp_dir.path().join("bogus.caf");
    std::fs::write(&bogus, b"not a net disk at all")?;

    let output = run_caf(&["check", "-d", bogus.to_str().unwrap()])?;
    assert!(!output.status.success());
    Ok(())
}
