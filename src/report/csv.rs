//! CSV batch report, one row per file

use super::FileReport;
use std::io::{self, Write};

const HEADER: &str = "file_path,file_name,integrated_lufs,brightness_centroid_hz,high_end_rolloff_hz,is_stereo,l_r_correlation,dominant_key,error";

pub fn write<W: Write>(writer: &mut W, results: &[FileReport]) -> io::Result<()> {
    writeln!(writer, "{}", HEADER)?;

    for r in results {
        let metrics = match &r.report {
            Some(report) => format!(
                "{},{},{},{},{},{}",
                report.dynamics.integrated_lufs,
                report.spectral.brightness_centroid_hz,
                report.spectral.high_end_rolloff_hz,
                report.stereo.is_stereo,
                report.stereo.l_r_correlation,
                report.tonality.dominant_key
            ),
            None => ",,,,,".to_string(),
        };

        writeln!(
            writer,
            "{},{},{},{}",
            escape(&r.file_path),
            escape(&r.file_name),
            metrics,
            escape(r.error.as_deref().unwrap_or(""))
        )?;
    }

    Ok(())
}

/// Quote a field if it contains a delimiter, quote or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{failed_file, ok_file};

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain.wav"), "plain.wav");
        assert_eq!(escape("a,b.wav"), "\"a,b.wav\"");
        assert_eq!(escape("say \"hi\".wav"), "\"say \"\"hi\"\".wav\"");
    }

    #[test]
    fn test_rows() {
        let results = vec![ok_file("/music/a.flac"), failed_file("/music/b.mp3")];
        let mut out = Vec::new();
        write(&mut out, &results).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "/music/a.flac,a.flac,-14.25,1834.5,4120,true,0.873,F#,");
        assert_eq!(lines[2], "/music/b.mp3,b.mp3,,,,,,,audio source contains no samples");
    }

    #[test]
    fn test_column_count_is_stable() {
        let results = vec![ok_file("/x.wav"), failed_file("/y.wav")];
        let mut out = Vec::new();
        write(&mut out, &results).unwrap();
        let text = String::from_utf8(out).unwrap();
        for line in text.lines() {
            assert_eq!(line.matches(',').count(), 8, "line: {}", line);
        }
    }
}
