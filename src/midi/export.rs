use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::types::{MidiError, Note};

/// Serialize notes as a pretty-printed JSON array
pub fn notes_to_json(notes: &[Note]) -> Result<String, MidiError> {
    Ok(serde_json::to_string_pretty(notes)?)
}

/// Write notes as JSON to `path`, creating parent folders as needed
pub fn export_notes(notes: &[Note], path: &Path) -> Result<(), MidiError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, notes)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// One line per note: start, duration, channel and pitch
pub fn notes_to_table(notes: &[Note]) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            format!(
                "{:>10.3}s {:>8.3}s  ch {:>2}  pitch {:>3}",
                note.start, note.duration, note.channel, note.pitch
            )
        })
        .collect()
}
