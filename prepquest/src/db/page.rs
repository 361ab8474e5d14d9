use serde::{Deserialize, Serialize};

/// 1-based page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub current: u64,
    pub size: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            current: 1,
            size: 10,
        }
    }
}

impl PageRequest {
    pub fn new(current: u64, size: u64) -> Self {
        Self { current, size }
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.current == 0 || self.size == 0 {
            return Err(crate::Error::InvalidQuery(format!(
                "page request needs current >= 1 and size >= 1, got {}/{}",
                self.current, self.size
            )));
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        self.current.saturating_sub(1).saturating_mul(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub current: u64,
    pub size: u64,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total.div_ceil(self.size)
    }

    pub fn has_next(&self) -> bool {
        self.current < self.pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            records: self.records.into_iter().map(f).collect(),
            total: self.total,
            current: self.current,
            size: self.size,
        }
    }
}
