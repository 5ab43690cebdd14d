//! JSON Export
//!
//! Integers are written as decimal strings so no consumer loses precision.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::modules::toolkit::sanitize_json;

pub fn write_json<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> Result<()> {
    let json = sanitize_json(serde_json::to_value(value)?);
    serde_json::to_writer_pretty(&mut writer, &json)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
