//! JSON batch report

use super::{FileReport, Summary};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct BatchReport<'a> {
    generated: String,
    summary: Summary,
    files: &'a [FileReport],
}

pub fn write<W: Write>(writer: &mut W, results: &[FileReport]) -> io::Result<()> {
    let report = BatchReport {
        generated: chrono::Local::now().to_rfc3339(),
        summary: Summary::from_results(results),
        files: results,
    };

    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{failed_file, ok_file};

    #[test]
    fn test_batch_document_shape() {
        let results = vec![ok_file("/music/a.flac"), failed_file("/music/b.mp3")];
        let mut out = Vec::new();
        write(&mut out, &results).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value["generated"].is_string());
        assert_eq!(value["summary"]["analyzed"], 1);
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["files"][0]["report"]["tonality"]["dominant_key"], "F#");
        assert!(value["files"][0]["error"].is_null());
        assert!(value["files"][1]["report"].is_null());
        assert_eq!(value["files"][1]["file_name"], "b.mp3");
    }

    #[test]
    fn test_empty_batch() {
        let mut out = Vec::new();
        write(&mut out, &[]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["summary"]["total"], 0);
        assert_eq!(value["files"].as_array().map(|a| a.len()), Some(0));
    }
}
