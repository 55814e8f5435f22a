use crate::types::{compare_ids, Item};
use std::cmp::Ordering;

/// Select the genuinely new items from one fetch result.
///
/// `fetched` is newest-first as returned by the fetcher. With no watermark
/// (first-ever synchronization) only the single newest item is selected, so a
/// freshly added source does not flood the channel with backlog. With a
/// watermark, every item whose id compares strictly greater is selected, by
/// id order rather than array position since fetch results are not guaranteed
/// contiguous with the previous cycle.
///
/// The returned items are oldest-first, ready for in-order delivery.
pub fn new_items(fetched: &[Item], watermark: Option<&str>) -> Vec<Item> {
    if fetched.is_empty() {
        return Vec::new();
    }

    let mut selected: Vec<Item> = match watermark {
        None => vec![fetched[0].clone()],
        Some(mark) => fetched
            .iter()
            .filter(|item| compare_ids(&item.id, mark) == Ordering::Greater)
            .cloned()
            .collect(),
    };

    selected.reverse();
    selected
}
