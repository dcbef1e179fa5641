use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use weabase::WeaFile;

fn main() -> Result<()> {
    let Some(file_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: inspect_wea <file.wea>");
    };

    let wea = WeaFile::open(&file_path)
        .with_context(|| format!("failed to open {}", file_path.display()))?;
    let h = wea.header();

    // Same field order as the legacy dump tool
    println!("{}", h.tr);
    println!("{}", h.pr);
    println!("{}", h.oi);
    println!("{}", h.ne);
    println!("{}", h.rgt);
    println!("{}", h.wsh);
    println!("{}", h.pcodes.concat());

    for row in 0..wea.rows() {
        let values: Vec<String> = wea.row(row).iter().map(|v| format!("{:.6}", v)).collect();
        println!("{}", values.join("  "));
    }

    Ok(())
}
