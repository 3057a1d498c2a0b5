use anyhow::Result;
use serde::Serialize;
use std::io::Write;

/// Export a ping or traceroute result as pretty-printed JSON
pub fn export_json<T: Serialize, W: Write>(result: &T, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, result)?;
    writeln!(writer)?;
    Ok(())
}
