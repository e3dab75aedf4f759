use std::io::Write;

use serde::Serialize;

use super::{ChartImage, Document, RenderSink};
use crate::error::ReportError;

#[derive(Serialize)]
struct ChartReference<'a> {
    name: &'a str,
    file: String,
    media_type: &'a str,
    size_bytes: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    document: &'a Document,
    rendered_charts: Vec<ChartReference<'a>>,
}

/// Writes the document as pretty-printed JSON
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        JsonRenderer { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderSink for JsonRenderer<W> {
    fn render(&mut self, document: &Document, images: &[ChartImage]) -> Result<(), ReportError> {
        let report = JsonReport {
            document,
            rendered_charts: images
                .iter()
                .map(|image| ChartReference {
                    name: &image.name,
                    file: image.file_name(),
                    media_type: &image.media_type,
                    size_bytes: image.bytes.len(),
                })
                .collect(),
        };
        serde_json::to_writer_pretty(&mut self.out, &report)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
