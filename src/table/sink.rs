//! Table sink implementations.

use super::Row;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Schema-first table writer.
///
/// `write_schema` is called exactly once, before any row, and lists every column a row
/// may carry. Rows are projected onto the schema order; missing cells are written as null.
#[async_trait]
pub trait TableSink: Send {
    async fn write_schema(&mut self, columns: &[String]) -> Result<()>;
    async fn write_row(&mut self, row: &Row) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

fn sink_error(msg: impl Into<String>, sink: &str) -> Error {
    Error::runtime_with_context(msg, ErrorContext::new().with_source(sink.to_string()))
}

fn project(schema: &[String], row: &Row, sink: &str) -> Result<Row> {
    if let Some(extra) = row.keys().find(|k| !schema.contains(k)) {
        return Err(sink_error(
            format!("row carries column '{}' missing from the declared schema", extra),
            sink,
        ));
    }
    Ok(schema
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect())
}

#[derive(Debug, Default)]
struct TableState {
    schema: Option<Vec<String>>,
    rows: Vec<Row>,
    closed: bool,
}

/// In-memory sink; clones share the same table so a caller can inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    state: Arc<Mutex<TableState>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> Option<Vec<String>> {
        self.state.lock().ok().and_then(|s| s.schema.clone())
    }

    pub fn rows(&self) -> Vec<Row> {
        self.state
            .lock()
            .map(|s| s.rows.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(false)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TableState) -> Result<T>) -> Result<T> {
        let mut st = self
            .state
            .lock()
            .map_err(|_| sink_error("MemoryTable poisoned", "memory_table"))?;
        f(&mut st)
    }
}

#[async_trait]
impl TableSink for MemoryTable {
    async fn write_schema(&mut self, columns: &[String]) -> Result<()> {
        self.with_state(|st| {
            if st.schema.is_some() {
                return Err(sink_error("schema already written", "memory_table"));
            }
            st.schema = Some(columns.to_vec());
            Ok(())
        })
    }

    async fn write_row(&mut self, row: &Row) -> Result<()> {
        self.with_state(|st| {
            let schema = st
                .schema
                .as_ref()
                .ok_or_else(|| sink_error("row written before schema", "memory_table"))?;
            let projected = project(schema, row, "memory_table")?;
            st.rows.push(projected);
            Ok(())
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.with_state(|st| {
            st.closed = true;
            Ok(())
        })
    }
}

/// Writes one JSON object per line; the first line is `{"columns": [...]}`.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    schema: Option<Vec<String>>,
    rows_written: usize,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            schema: None,
            rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::BufWriter<std::fs::File>> {
    pub fn create(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(std::io::BufWriter::new(file)))
    }
}

#[async_trait]
impl<W: Write + Send> TableSink for JsonLinesSink<W> {
    async fn write_schema(&mut self, columns: &[String]) -> Result<()> {
        if self.schema.is_some() {
            return Err(sink_error("schema already written", "jsonl_sink"));
        }
        let header = serde_json::json!({ "columns": columns });
        serde_json::to_writer(&mut self.writer, &header)?;
        self.writer.write_all(b"\n")?;
        self.schema = Some(columns.to_vec());
        Ok(())
    }

    async fn write_row(&mut self, row: &Row) -> Result<()> {
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| sink_error("row written before schema", "jsonl_sink"))?;
        let projected = project(schema, row, "jsonl_sink")?;
        serde_json::to_writer(&mut self.writer, &projected)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_memory_table_projects_rows_onto_schema() {
        let mut table = MemoryTable::new();
        let handle = table.clone();
        table
            .write_schema(&["b".to_string(), "a".to_string()])
            .await
            .unwrap();
        table.write_row(&row(&[("a", json!(1))])).await.unwrap();
        table.close().await.unwrap();

        let rows = handle.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(rows[0]["b"], Value::Null);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_memory_table_rejects_row_before_schema() {
        let mut table = MemoryTable::new();
        assert!(table.write_row(&row(&[("a", json!(1))])).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_table_rejects_undeclared_column() {
        let mut table = MemoryTable::new();
        table.write_schema(&["a".to_string()]).await.unwrap();
        let err = table
            .write_row(&row(&[("a", json!(1)), ("z", json!(2))]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'z'"));
    }

    #[tokio::test]
    async fn test_json_lines_sink_output() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.write_schema(&["path".to_string(), "score".to_string()])
            .await
            .unwrap();
        sink.write_row(&row(&[("path", json!("a.png")), ("score", json!(91.2))]))
            .await
            .unwrap();
        sink.close().await.unwrap();
        assert_eq!(sink.rows_written(), 1);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#"{"columns":["path","score"]}"#);
        assert_eq!(lines[1], r#"{"path":"a.png","score":91.2}"#);
    }
}
