//! History paginator: page-by-page transaction history from the indexer
//!
//! `has_more` is `records.len() == page_size`. When the total is an exact
//! multiple of the page size the last full page still reports `has_more`,
//! and the following page comes back empty with `has_more = false`.

use alloy::primitives::Address;
use serde::Serialize;

use crate::core::{ChainHandle, Error, Result, RpcResultExt};
use crate::domain::TransactionRecord;
use crate::infrastructure::indexer::to_transaction_record;
use crate::modules::toolkit::parse_address;

pub const DEFAULT_PAGE_SIZE: usize = 15;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub page: u32,
    pub records: Vec<TransactionRecord>,
    pub has_more: bool,
}

/// Fetch one page without touching any accumulated state
pub async fn fetch_page(
    handle: &ChainHandle,
    address: Address,
    page: u32,
    page_size: usize,
) -> Result<HistoryPage> {
    if page == 0 {
        return Err(Error::InvalidInput("page numbers start at 1".to_string()));
    }
    if page_size == 0 {
        return Err(Error::InvalidInput("page size must be at least 1".to_string()));
    }

    let indexer = handle.indexer()?;
    tracing::debug!(%address, page, page_size, indexer = %indexer.name(), "fetching history page");

    let entries = indexer.transactions(address, page, page_size).await.map_rpc()?;
    let records: Vec<TransactionRecord> = entries.iter().map(to_transaction_record).collect();
    let has_more = records.len() == page_size;

    Ok(HistoryPage {
        page,
        records,
        has_more,
    })
}

/// Accumulates pages for one address
#[derive(Debug)]
pub struct HistoryPaginator {
    page_size: usize,
    address: Option<Address>,
    records: Vec<TransactionRecord>,
    last_page: u32,
    has_more: bool,
}

impl Default for HistoryPaginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl HistoryPaginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            address: None,
            records: Vec::new(),
            last_page: 0,
            has_more: false,
        }
    }

    /// Fetch `page_number` for `address`
    ///
    /// Page 1 replaces the accumulated list, later pages append. Asking for a
    /// different address drops whatever was accumulated for the previous one.
    /// On error the accumulated list is left as it was.
    #[tracing::instrument(skip(self, handle), fields(network = %handle.name()))]
    pub async fn page(
        &mut self,
        handle: &ChainHandle,
        address: &str,
        page_number: u32,
    ) -> Result<HistoryPage> {
        let address = parse_address(address)?;
        if self.address != Some(address) {
            self.reset();
        }

        let page = fetch_page(handle, address, page_number, self.page_size).await?;

        if page_number == 1 {
            self.records = page.records.clone();
        } else {
            self.records.extend(page.records.iter().cloned());
        }
        self.address = Some(address);
        self.last_page = page_number;
        self.has_more = page.has_more;

        tracing::info!(
            page = page_number,
            fetched = page.records.len(),
            total = self.records.len(),
            has_more = page.has_more,
            "history page loaded"
        );

        Ok(page)
    }

    /// Fetch the page after the last one loaded for the current address
    pub async fn load_more(&mut self, handle: &ChainHandle) -> Result<HistoryPage> {
        let Some(address) = self.address else {
            return Err(Error::InvalidInput("no address loaded yet".to_string()));
        };
        let next = self.last_page + 1;
        self.page(handle, &format!("{:#x}", address), next).await
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn reset(&mut self) {
        self.address = None;
        self.records.clear();
        self.last_page = 0;
        self.has_more = false;
    }
}
