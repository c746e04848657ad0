use crate::constants::PAGE_SIZE;
use crate::domain::NormalizedRecord;
use crate::error::Result;
use async_trait::async_trait;

/// One page of the attended listing, already normalized.
#[derive(Debug, Clone, Default)]
pub struct AttendedPage {
    pub records: Vec<NormalizedRecord>,
    /// Items the API returned, including any dropped during normalization.
    pub raw_count: usize,
    /// No further pages exist upstream.
    pub is_last: bool,
}

impl AttendedPage {
    /// A page whose length alone decides whether it is the last one.
    pub fn from_records(records: Vec<NormalizedRecord>) -> Self {
        let raw_count = records.len();
        Self {
            records,
            raw_count,
            is_last: raw_count < PAGE_SIZE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw_count == 0
    }
}

// Remote listing port: the planner pages through whatever implements this.
#[async_trait]
pub trait AttendedSource: Send + Sync {
    async fn fetch_page(&self, username: &str, page: u32) -> Result<AttendedPage>;
}
