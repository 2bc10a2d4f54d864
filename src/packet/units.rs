//! Wrapping packet counters
//!
//! Sequence numbers, block numbers and stream timestamps start from
//! arbitrary values and wrap; comparisons go through the signed difference.

/// RTP sequence number
pub type SeqNum = u16;

/// Signed [`SeqNum`] delta
pub type SeqNumDiff = i16;

/// FEC source block number
pub type BlkNum = u16;

/// Signed [`BlkNum`] delta
pub type BlkNumDiff = i16;

/// Position of packet contents in the stream, in samples per channel
pub type StreamTimestamp = u32;

/// Signed [`StreamTimestamp`] delta
pub type StreamTimestampDiff = i32;

pub fn seqnum_diff(a: SeqNum, b: SeqNum) -> SeqNumDiff {
    a.wrapping_sub(b) as SeqNumDiff
}

/// `a` is before `b`, taking wrap into account
pub fn seqnum_lt(a: SeqNum, b: SeqNum) -> bool {
    seqnum_diff(a, b) < 0
}

pub fn blknum_diff(a: BlkNum, b: BlkNum) -> BlkNumDiff {
    a.wrapping_sub(b) as BlkNumDiff
}

/// `a` is before `b`, taking wrap into account
pub fn blknum_lt(a: BlkNum, b: BlkNum) -> bool {
    blknum_diff(a, b) < 0
}

pub fn stream_timestamp_diff(a: StreamTimestamp, b: StreamTimestamp) -> StreamTimestampDiff {
    a.wrapping_sub(b) as StreamTimestampDiff
}

/// `a` is before `b`, taking wrap into account
pub fn stream_timestamp_lt(a: StreamTimestamp, b: StreamTimestamp) -> bool {
    stream_timestamp_diff(a, b) < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap() {
        assert_eq!(seqnum_diff(2, 65534), 4);
        assert!(seqnum_lt(65534, 2));
        assert!(!seqnum_lt(2, 65534));

        assert!(blknum_lt(u16::MAX, 0));

        assert_eq!(stream_timestamp_diff(100, 250), -150);
        assert_eq!(stream_timestamp_diff(5, u32::MAX - 4), 10);
        assert!(stream_timestamp_lt(u32::MAX, 0));
    }
}
