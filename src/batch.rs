//! Batch partitioner: cuts the extraction sequence into sitemap-sized groups.

use tracing::trace;

use crate::extract::ExtractedItem;
use crate::models::{AddressEntry, Priority};
use crate::stats::RunReport;

/// Pulls [`AddressEntry`] batches of at most `max_count` entries.
///
/// Items whose text is empty or whitespace-only are consumed from the
/// sequence and dropped; they are not counted and do not take up a place in
/// the batch. A batch shorter than `max_count` therefore means the sequence
/// is exhausted.
pub struct BatchPartitioner<I> {
    items: I,
    max_count: usize,
    priority: Priority,
    dropped: u64,
}

impl<'d, I> BatchPartitioner<I>
where
    I: Iterator<Item = ExtractedItem<'d>>,
{
    pub fn new(items: I, max_count: usize, priority: Priority) -> Self {
        BatchPartitioner {
            items,
            max_count: max_count.max(1),
            priority,
            dropped: 0,
        }
    }

    /// Next batch, in extraction order. Empty once the sequence is exhausted.
    pub fn next_batch(&mut self, report: &mut RunReport) -> Vec<AddressEntry> {
        let mut batch = Vec::new();
        while batch.len() < self.max_count {
            let Some(item) = self.items.next() else {
                break;
            };
            let text = item.text();
            let loc = text.trim();
            if loc.is_empty() {
                trace!(selector = item.selector, "dropping item with empty text");
                self.dropped += 1;
                continue;
            }
            report.record_address(item.selector);
            batch.push(AddressEntry {
                loc: loc.to_string(),
                priority: self.priority,
            });
        }
        batch
    }

    /// Items dropped so far for having no text.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
