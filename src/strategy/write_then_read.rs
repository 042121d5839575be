use super::{random_text, require_cache_service, LoadStrategy, StrategyCore};
use crate::config::{ServiceConfig, StrategyConfig};
use crate::error::LoadError;
use crate::key::{KeyProvider, RandomKeyProvider};
use crate::operation::{Operation, OperationType};
use std::sync::Arc;

/// Which side opens a series and how many operations of the other side follow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Series {
    /// One write, then `reads` reads
    WriteLeads { reads: u32 },
    /// One read, then `writes` writes
    ReadLeads { writes: u32 },
}

impl Series {
    pub(crate) fn from_config(config: &StrategyConfig) -> Result<Self, LoadError> {
        match (config.read_to_write, config.write_to_read) {
            (Some(1), Some(1)) | (None, None) => Ok(Series::WriteLeads { reads: 1 }),
            (Some(_), Some(_)) => Err(LoadError::config(
                "read_to_write",
                "cannot be combined with write_to_read unless both are 1",
            )),
            (Some(reads), None) => Ok(Series::WriteLeads { reads }),
            (None, Some(writes)) => Ok(Series::ReadLeads { writes }),
        }
    }

    /// Operation type at `position`; a zero ratio never switches sides
    pub(crate) fn at(&self, position: u64) -> OperationType {
        let (lead, follow, n) = match *self {
            Series::WriteLeads { reads } => (OperationType::Write, OperationType::Read, reads),
            Series::ReadLeads { writes } => (OperationType::Read, OperationType::Write, writes),
        };
        if n == 0 || position % (n as u64 + 1) == 0 {
            lead
        } else {
            follow
        }
    }
}

/// Alternates writes and reads in fixed series, each operation on a fresh key.
///
/// Outcomes of previous operations are ignored.
pub struct WriteThenRead {
    core: StrategyCore,
    series: Series,
    position: u64,
    value: String,
}

impl WriteThenRead {
    pub const NAME: &'static str = "write-then-read";

    pub fn new() -> Self {
        Self {
            core: StrategyCore::new(Self::NAME),
            series: Series::WriteLeads { reads: 1 },
            position: 0,
            value: String::new(),
        }
    }
}

impl Default for WriteThenRead {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStrategy for WriteThenRead {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, service: &ServiceConfig, config: &StrategyConfig) -> Result<(), LoadError> {
        require_cache_service(Self::NAME, service)?;
        let series = Series::from_config(config)?;
        self.core.init_keys(|| {
            let provider = RandomKeyProvider::new(config.key_size, config.key_count)?;
            Ok(Some(Box::new(provider) as Box<dyn KeyProvider>))
        })?;
        self.series = series;
        self.value = random_text(config.value_size);
        Ok(())
    }

    fn start(&mut self) -> Result<(), LoadError> {
        self.core.start()
    }

    fn stop(&mut self) -> Result<(), LoadError> {
        self.core.stop()
    }

    fn is_started(&self) -> bool {
        self.core.is_started()
    }

    fn operation_types(&self) -> Vec<OperationType> {
        vec![OperationType::Read, OperationType::Write]
    }

    fn next(
        &mut self,
        _last: Option<&Operation>,
        _last_written_key: Option<&str>,
        shutting_down: bool,
    ) -> Result<Option<Operation>, LoadError> {
        self.core.require_running()?;
        if shutting_down {
            return Ok(None);
        }
        let key = match self.core.next_key()? {
            Some(key) => key,
            None => return Ok(None),
        };
        let operation = match self.series.at(self.position) {
            OperationType::Write => Operation::write(key, self.value.as_str()),
            _ => Operation::read(key),
        };
        self.position += 1;
        Ok(Some(operation))
    }

    fn attach_key_provider(&mut self, provider: Arc<dyn KeyProvider>) -> Result<(), LoadError> {
        self.core.attach(provider)
    }
}
