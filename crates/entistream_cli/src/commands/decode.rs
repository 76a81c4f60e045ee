//! Decode command implementation.

use super::{CliError, CliResult, OutputOptions};
use entistream_sync::{
    CancellationToken, CollectorSink, Pipeline, PipelineConfig, ReaderSource, Sink, SyncReport,
    DEFAULT_BATCH_SIZE,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use tracing::debug;

/// Decoded stream summary.
#[derive(Debug, Serialize)]
pub struct DecodeSummary {
    /// Content entities in the stream.
    pub entity_count: usize,
    /// Content entities marked deleted.
    pub deleted_count: usize,
    /// Distinct property keys across all entities.
    pub property_keys: usize,
    /// Distinct reference keys across all entities.
    pub reference_keys: usize,
    /// Namespaces declared by the context.
    pub namespaces: BTreeMap<String, String>,
    /// Continuation token closing the stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

/// Layout of a printed summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFormat {
    /// Human-readable report.
    Text,
    /// Pretty-printed JSON object.
    Json,
}

impl SummaryFormat {
    /// Parses a `text` / `json` format name.
    pub fn parse(format: &str) -> CliResult<Self> {
        match format {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CliError::UnknownFormat {
                format: other.to_string(),
                expected: "text or json",
            }),
        }
    }
}

fn pipeline<R: Read, K: Sink>(reader: R, sink: K) -> Pipeline<ReaderSource<R>, K> {
    let config = PipelineConfig::new().with_batch_size(DEFAULT_BATCH_SIZE);
    Pipeline::with_config(ReaderSource::new(reader), sink, config)
}

/// Decodes a stream from `input` and writes it back out to `out`.
pub fn run<R: Read, W: Write>(
    input: R,
    output: &OutputOptions,
    out: W,
    cancel: &CancellationToken,
) -> CliResult<SyncReport> {
    let mut pipeline = pipeline(input, output.sink(out));
    let report = pipeline.sync(cancel, None, usize::MAX)?;
    debug!(entities = report.entities, "decoded stream");
    Ok(report)
}

/// Decodes a stream from `input` and prints a summary in `format`.
pub fn summarize<R: Read, W: Write>(
    input: R,
    format: SummaryFormat,
    mut out: W,
    cancel: &CancellationToken,
) -> CliResult<DecodeSummary> {
    let mut pipeline = pipeline(input, CollectorSink::new());
    let report = pipeline.sync(cancel, None, usize::MAX)?;
    let (_, sink) = pipeline.into_parts();

    let mut property_keys = BTreeSet::new();
    let mut reference_keys = BTreeSet::new();
    for entity in sink.entities() {
        property_keys.extend(entity.properties.keys());
        reference_keys.extend(entity.references.keys());
    }
    let summary = DecodeSummary {
        entity_count: report.entities,
        deleted_count: sink.entities().iter().filter(|e| e.deleted).count(),
        property_keys: property_keys.len(),
        reference_keys: reference_keys.len(),
        namespaces: sink
            .context()
            .and_then(|c| c.namespaces())
            .unwrap_or_default(),
        continuation: sink.continuation_token().map(str::to_string),
    };

    match format {
        SummaryFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &summary)?;
            writeln!(out)?;
        }
        SummaryFormat::Text => print_text_summary(&summary, &mut out)?,
    }
    Ok(summary)
}

fn print_text_summary<W: Write>(summary: &DecodeSummary, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "Entity Stream Summary")?;
    writeln!(out, "=====================")?;
    writeln!(out)?;
    writeln!(out, "Entities:")?;
    writeln!(out, "  Content:        {}", summary.entity_count)?;
    writeln!(out, "  Deleted:        {}", summary.deleted_count)?;
    writeln!(out, "  Property keys:  {}", summary.property_keys)?;
    writeln!(out, "  Reference keys: {}", summary.reference_keys)?;
    writeln!(out)?;
    writeln!(out, "Namespaces:")?;
    for (prefix, expansion) in &summary.namespaces {
        writeln!(out, "  {prefix:<12} {expansion}")?;
    }
    if let Some(token) = &summary.continuation {
        writeln!(out)?;
        writeln!(out, "Continuation: {token}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use entistream_testkit::{StreamBuilder, SCENARIO_A};

    #[test]
    fn rewrites_the_stream() {
        let output = OutputOptions::parse("raw", false).unwrap();
        let mut out = Vec::new();
        let cancel = CancellationToken::new();
        let report = run(SCENARIO_A.as_bytes(), &output, &mut out, &cancel).unwrap();
        assert_eq!(report.entities, 1);

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1]["id"], "mimiro-people:homer");
        assert_eq!(items[2]["token"], "next-20");
    }

    #[test]
    fn expands_with_the_context() {
        let output = OutputOptions::parse("pretty", true).unwrap();
        let mut out = Vec::new();
        let cancel = CancellationToken::new();
        run(SCENARIO_A.as_bytes(), &output, &mut out, &cancel).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json[1]["id"], "http://data.mimiro.io/people/homer");
    }

    #[test]
    fn summarizes_streams() {
        let stream = StreamBuilder::people()
            .people_entities("s", 4)
            .entity_json(serde_json::json!({"id": "people:gone", "deleted": true}))
            .continuation("c9")
            .build();
        let mut out = Vec::new();
        let summary = summarize(
            stream.as_bytes(),
            SummaryFormat::Text,
            &mut out,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(summary.entity_count, 5);
        assert_eq!(summary.deleted_count, 1);
        assert_eq!(summary.property_keys, 1);
        assert_eq!(summary.namespaces.len(), 2);
        assert_eq!(summary.continuation.as_deref(), Some("c9"));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Continuation: c9"));
    }

    #[test]
    fn summary_as_json() {
        let mut out = Vec::new();
        summarize(
            SCENARIO_A.as_bytes(),
            SummaryFormat::Json,
            &mut out,
            &CancellationToken::new(),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["entity_count"], 1);
        assert_eq!(json["reference_keys"], 1);
    }

    #[test]
    fn malformed_input_fails() {
        let output = OutputOptions::parse("raw", false).unwrap();
        let cancel = CancellationToken::new();
        assert!(run(&b"[{\"id\":"[..], &output, Vec::new(), &cancel).is_err());
    }

    #[test]
    fn unknown_summary_format_is_rejected() {
        assert_eq!(SummaryFormat::parse("json").unwrap(), SummaryFormat::Json);
        let err = SummaryFormat::parse("yaml").unwrap_err();
        assert!(matches!(&err, CliError::UnknownFormat { format, .. } if format == "yaml"));
        assert_eq!(err.to_string(), "unknown format 'yaml' (expected text or json)");
    }

    #[test]
    fn cancelled_decode_writes_a_closed_stream() {
        let output = OutputOptions::parse("raw", false).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut out = Vec::new();
        let report = run(SCENARIO_A.as_bytes(), &output, &mut out, &cancel).unwrap();

        assert!(report.is_interrupted());
        assert_eq!(report.entities, 0);
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json, serde_json::json!([]));
    }
}
