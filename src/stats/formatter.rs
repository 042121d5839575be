use super::interval::SamplingInterval;
use crate::error::LoadError;
use crate::failure::FailureKind;
use crate::operation::OperationType;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Receives every interval the sampler emits, in time order
pub trait SamplingConsumer: Send {
    fn consume(&mut self, interval: &SamplingInterval) -> Result<(), LoadError>;

    /// Called once after the last interval
    fn close(&mut self) -> Result<(), LoadError> {
        Ok(())
    }
}

/// Keeps emitted intervals in memory
#[derive(Clone, Default)]
pub struct CollectingConsumer {
    intervals: Arc<Mutex<Vec<SamplingInterval>>>,
}

impl CollectingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intervals(&self) -> Vec<SamplingInterval> {
        self.intervals.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.intervals.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SamplingConsumer for CollectingConsumer {
    fn consume(&mut self, interval: &SamplingInterval) -> Result<(), LoadError> {
        self.intervals.lock().push(interval.clone());
        Ok(())
    }
}

/// Renders intervals as CSV rows.
///
/// Columns: timestamp, then per operation type the success rate, the average
/// success duration and one rate column per failure kind, then one column per
/// metric (taken from the first interval), then free-text notes.
pub struct CsvFormatter<W: Write + Send> {
    writer: csv::Writer<W>,
    operations: Vec<OperationType>,
    metric_names: Option<Vec<String>>,
}

impl CsvFormatter<File> {
    pub fn create(path: &Path, operations: Vec<OperationType>) -> Result<Self, LoadError> {
        let file = File::create(path)?;
        Ok(Self::new(file, operations))
    }
}

impl<W: Write + Send> CsvFormatter<W> {
    pub fn new(writer: W, operations: Vec<OperationType>) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            operations,
            metric_names: None,
        }
    }

    pub fn into_inner(self) -> Result<W, LoadError> {
        self.writer
            .into_inner()
            .map_err(|e| LoadError::Io(e.into_error()))
    }

    fn write_header(&mut self, interval: &SamplingInterval) -> Result<Vec<String>, LoadError> {
        let metric_names: Vec<String> = interval.metrics.iter().map(|m| m.name.clone()).collect();
        let mut header = vec!["timestamp".to_string()];
        for operation in &self.operations {
            header.push(format!("{} success/s", operation));
            header.push(format!("{} avg ms", operation));
            for kind in FailureKind::ALL {
                header.push(format!("{} {}/s", operation, kind));
            }
        }
        header.extend(metric_names.iter().cloned());
        header.push("notes".to_string());
        self.writer.write_record(&header)?;
        Ok(metric_names)
    }
}

impl<W: Write + Send> SamplingConsumer for CsvFormatter<W> {
    fn consume(&mut self, interval: &SamplingInterval) -> Result<(), LoadError> {
        if self.metric_names.is_none() {
            let names = self.write_header(interval)?;
            self.metric_names = Some(names);
        }
        let metric_names = self.metric_names.as_deref().unwrap_or_default();

        let mut row = vec![format_timestamp(interval.start_ms)];
        for operation in &self.operations {
            let values = interval.values(*operation).cloned().unwrap_or_default();
            row.push(format!("{:.2}", interval.per_second(values.success_count)));
            row.push(match values.average_success_nanos() {
                Some(nanos) => format!("{:.3}", nanos as f64 / 1_000_000.0),
                None => String::new(),
            });
            for kind in FailureKind::ALL {
                row.push(format!("{:.2}", interval.per_second(values.failure(kind).count)));
            }
        }
        for name in metric_names {
            row.push(
                interval
                    .metrics
                    .iter()
                    .find(|m| &m.name == name)
                    .map(|m| format!("{:.2}", m.value))
                    .unwrap_or_default(),
            );
        }
        row.push(interval.annotations.join("; "));
        self.writer.write_record(&row)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), LoadError> {
        self.writer.flush()?;
        Ok(())
    }
}

fn format_timestamp(ms: u64) -> String {
    match chrono::DateTime::from_timestamp_millis(ms as i64) {
        Some(ts) => ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => ms.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::counter::{CounterValues, FailureValues};
    use crate::stats::metrics::MetricReading;
    use std::collections::BTreeMap;

    fn interval(start_ms: u64, note: Option<&str>) -> SamplingInterval {
        let mut interval = SamplingInterval::new(start_ms, 1_000);
        let mut failures = BTreeMap::new();
        failures.insert(
            FailureKind::Timeout,
            FailureValues {
                count: 2,
                duration_nanos: 10,
            },
        );
        interval.counters.insert(
            OperationType::Write,
            CounterValues {
                success_count: 4,
                success_duration_nanos: 8_000_000,
                failures,
            },
        );
        interval.metrics.push(MetricReading::new("system-load-1m", 0.5));
        if let Some(note) = note {
            interval.annotations.push(note.to_string());
        }
        interval
    }

    fn render(intervals: &[SamplingInterval]) -> String {
        let mut formatter = CsvFormatter::new(Vec::new(), vec![OperationType::Write]);
        for i in intervals {
            formatter.consume(i).unwrap();
        }
        formatter.close().unwrap();
        String::from_utf8(formatter.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_header_and_rows() {
        let output = render(&[interval(0, None), interval(1_000, None)]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,write success/s,write avg ms,"));
        assert!(lines[0].contains("write timeout/s"));
        assert!(lines[0].ends_with("system-load-1m,notes"));
        assert!(lines[1].starts_with("1970-01-01T00:00:00.000Z,4.00,2.000,"));
        assert!(lines[2].starts_with("1970-01-01T00:00:01.000Z,"));
    }

    #[test]
    fn test_notes_with_commas_are_quoted() {
        let output = render(&[interval(0, Some("warmup done, starting"))]);
        assert!(output.contains("\"warmup done, starting\""));
    }

    #[test]
    fn test_missing_operation_renders_zero_rates() {
        let mut formatter = CsvFormatter::new(Vec::new(), vec![OperationType::Read]);
        formatter.consume(&interval(0, None)).unwrap();
        let output = String::from_utf8(formatter.into_inner().unwrap()).unwrap();
        let row = output.lines().nth(1).unwrap();
        assert!(row.starts_with("1970-01-01T00:00:00.000Z,0.00,,0.00"));
    }

    /// Fails the first `failures` writes, then accepts everything
    struct FlakyWriter {
        out: Vec<u8>,
        failures: usize,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_row_keeps_header_state() {
        let writer = FlakyWriter {
            out: Vec::new(),
            failures: 1,
        };
        let mut formatter = CsvFormatter::new(writer, vec![OperationType::Write]);
        formatter.consume(&interval(0, None)).unwrap();
        // larger than the csv buffer, so this row reaches the failing writer
        let long_note = "x".repeat(64 * 1024);
        assert!(formatter.consume(&interval(1_000, Some(&long_note))).is_err());
        assert_eq!(
            formatter.metric_names,
            Some(vec!["system-load-1m".to_string()])
        );
    }

    #[test]
    fn test_collecting_consumer_shares_storage() {
        let consumer = CollectingConsumer::new();
        let mut handle = consumer.clone();
        handle.consume(&interval(0, None)).unwrap();
        assert_eq!(consumer.len(), 1);
    }
}
