//! Core POP3 types.

/// A message as announced by `LIST`.
///
/// Sequence numbers are assigned in arrival order and are only valid for
/// the session that listed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageHandle {
    /// Server-assigned sequence number.
    pub seq: u32,
    /// Declared size in octets.
    pub size: u64,
}

/// Maildrop summary from `STAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStat {
    /// Number of messages.
    pub count: u32,
    /// Total size in octets.
    pub size: u64,
}

/// Picks the `limit` most recently received messages, newest first.
///
/// POP3 numbers messages in arrival order, so the most recent are the
/// highest sequence numbers.
#[must_use]
pub fn select_recent(handles: &[MessageHandle], limit: usize) -> Vec<MessageHandle> {
    let mut sorted = handles.to_vec();
    sorted.sort_unstable_by(|a, b| b.seq.cmp(&a.seq));
    sorted.dedup_by_key(|h| h.seq);
    sorted.truncate(limit);
    sorted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn handles(seqs: &[u32]) -> Vec<MessageHandle> {
        seqs.iter()
            .map(|&seq| MessageHandle {
                seq,
                size: u64::from(seq) * 100,
            })
            .collect()
    }

    #[test]
    fn test_select_recent_takes_highest() {
        let selected = select_recent(&handles(&[1, 2, 3, 4, 5]), 2);
        let seqs: Vec<_> = selected.iter().map(|h| h.seq).collect();
        assert_eq!(seqs, vec![5, 4]);
    }

    #[test]
    fn test_select_recent_limit_exceeds_count() {
        assert_eq!(select_recent(&handles(&[2, 1]), 10).len(), 2);
        assert!(select_recent(&handles(&[1, 2]), 0).is_empty());
        assert!(select_recent(&[], 5).is_empty());
    }

    proptest! {
        #[test]
        fn selects_top_sequence_numbers(n in 0u32..60, limit in 0usize..80) {
            let all: Vec<u32> = (1..=n).collect();
            let selected = select_recent(&handles(&all), limit);
            let expected: Vec<u32> = (1..=n).rev().take(limit).collect();
            let seqs: Vec<u32> = selected.iter().map(|h| h.seq).collect();
            prop_assert_eq!(seqs, expected);
        }
    }
}
