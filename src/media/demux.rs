//! Frame demuxing
//!
//! The decode process writes MJPEG to a pipe with no alignment guarantees:
//! a read may contain half a frame, several frames, or a frame split across
//! two reads. The demuxer accumulates chunks and cuts complete frames out by
//! scanning for the JPEG markers.
//!
//! Markers are trusted at face value wherever they occur, including inside a
//! prior frame's payload; pathological inputs can therefore mis-frame. This
//! mirrors the upstream pipe format and is not worth a stricter parser for
//! the stream we consume.

use bytes::{Buf, BytesMut};

use super::frame::{Frame, EOI, SOI};

/// Retained-tail ceiling. A tail larger than this without a complete frame
/// is discarded, bounding memory at the cost of at most one in-flight frame.
pub const MAX_TAIL_BYTES: usize = 1_000_000;

/// Splits an unstructured byte stream into discrete JPEG frames.
///
/// Chunks are appended to an internal accumulation buffer; each call to
/// [`push_chunk`](FrameDemuxer::push_chunk) extracts every frame the new
/// bytes complete and retains the unconsumed tail for the next call.
#[derive(Debug)]
pub struct FrameDemuxer {
    buf: BytesMut,
    /// Absolute stream offset of `buf[0]`.
    base_offset: u64,
    next_seq: u64,
    max_tail: usize,
    discarded_bytes: u64,
    tail_discards: u64,
}

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack
        .windows(2)
        .position(|w| w[0] == marker[0] && w[1] == marker[1])
}

impl FrameDemuxer {
    /// Create a demuxer with the default tail ceiling.
    pub fn new() -> Self {
        Self::with_max_tail(MAX_TAIL_BYTES)
    }

    /// Create a demuxer with a custom tail ceiling.
    pub fn with_max_tail(max_tail: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            base_offset: 0,
            next_seq: 0,
            max_tail,
            discarded_bytes: 0,
            tail_discards: 0,
        }
    }

    /// Append a chunk and extract every complete frame it completes.
    ///
    /// Frames are returned in stream order with monotonically non-decreasing
    /// offsets. Payload bytes are copied out of the accumulation buffer once
    /// and never mutated afterwards.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut pos = 0;
        loop {
            let Some(start) = find_marker(&self.buf[pos..], SOI).map(|i| pos + i) else {
                break;
            };
            // End marker search begins past the start marker so that a
            // zero-payload frame (SOI directly followed by EOI) still matches
            let Some(end) = find_marker(&self.buf[start + 2..], EOI).map(|i| start + 2 + i)
            else {
                break;
            };
            let frame_end = end + 2;
            let data = self.buf[start..frame_end].to_vec();
            frames.push(Frame::new(
                self.next_seq,
                self.base_offset + start as u64,
                data.into(),
            ));
            self.next_seq += 1;
            pos = frame_end;
        }

        if pos > 0 {
            self.buf.advance(pos);
            self.base_offset += pos as u64;
        }

        if self.buf.len() > self.max_tail {
            let len = self.buf.len();
            tracing::warn!(tail = len, "demux tail overflow, discarding buffered bytes");
            self.base_offset += len as u64;
            self.discarded_bytes += len as u64;
            self.tail_discards += 1;
            self.buf.clear();
        }

        frames
    }

    /// Bytes retained for the next chunk.
    pub fn tail(&self) -> &[u8] {
        &self.buf
    }

    /// Number of frames emitted so far.
    pub fn frames_emitted(&self) -> u64 {
        self.next_seq
    }

    /// Total bytes dropped by tail-overflow discards.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// Number of tail-overflow discards.
    pub fn tail_discards(&self) -> u64 {
        self.tail_discards
    }
}

impl Default for FrameDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a fake JPEG frame with `payload` bytes between the markers.
    /// Payload bytes avoid 0xFF so they can't alias a marker.
    fn jpeg(payload: &[u8]) -> Vec<u8> {
        let mut v = Vec::with_capacity(payload.len() + 4);
        v.extend_from_slice(&SOI);
        v.extend_from_slice(payload);
        v.extend_from_slice(&EOI);
        v
    }

    #[test]
    fn test_single_frame_single_chunk() {
        let mut demux = FrameDemuxer::new();
        let frames = demux.push_chunk(&jpeg(&[1, 2, 3]));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 0);
        assert_eq!(frames[0].offset, 0);
        assert!(frames[0].is_well_formed());
        assert!(demux.tail().is_empty());
    }

    #[test]
    fn test_back_to_back_frames_in_one_chunk() {
        let mut demux = FrameDemuxer::new();
        let mut input = jpeg(&[1, 2, 3]);
        input.extend_from_slice(&jpeg(&[4, 5]));

        let frames = demux.push_chunk(&input);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].seq, 0);
        assert_eq!(frames[1].seq, 1);
        assert_eq!(frames[0].data[2..5], [1, 2, 3]);
        assert_eq!(frames[1].data[2..4], [4, 5]);
        assert_eq!(frames[1].offset, frames[0].offset + frames[0].size() as u64);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut demux = FrameDemuxer::new();
        let input = jpeg(&[1, 2, 3, 4]);

        assert!(demux.push_chunk(&input[..3]).is_empty());
        let frames = demux.push_chunk(&input[3..]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, &input[..]);
    }

    #[test]
    fn test_split_mid_marker() {
        // Split between the two bytes of the end marker
        let mut demux = FrameDemuxer::new();
        let input = jpeg(&[9]);
        let cut = input.len() - 1;

        assert!(demux.push_chunk(&input[..cut]).is_empty());
        let frames = demux.push_chunk(&input[cut..]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, &input[..]);
    }

    #[test]
    fn test_arbitrary_splits_match_single_chunk() {
        let mut stream = jpeg(&[1, 2, 3]);
        stream.extend_from_slice(&jpeg(&[4]));
        stream.extend_from_slice(&jpeg(&[5, 6, 7, 8]));
        // Trailing partial frame
        stream.extend_from_slice(&SOI);
        stream.push(0x42);

        let mut reference = FrameDemuxer::new();
        let expected = reference.push_chunk(&stream);
        assert_eq!(expected.len(), 3);

        for cut in 0..=stream.len() {
            let mut demux = FrameDemuxer::new();
            let mut got = demux.push_chunk(&stream[..cut]);
            got.extend(demux.push_chunk(&stream[cut..]));

            assert_eq!(got.len(), expected.len(), "split at {}", cut);
            for (a, b) in got.iter().zip(&expected) {
                assert_eq!(a.seq, b.seq);
                assert_eq!(a.offset, b.offset);
                assert_eq!(a.data, b.data);
            }
            assert_eq!(demux.tail(), reference.tail());
        }
    }

    #[test]
    fn test_byte_at_a_time_feed() {
        let mut stream = jpeg(&[1, 2]);
        stream.extend_from_slice(&jpeg(&[3, 4, 5]));

        let mut demux = FrameDemuxer::new();
        let mut frames = Vec::new();
        for b in &stream {
            frames.extend(demux.push_chunk(std::slice::from_ref(b)));
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data[2..4], [1, 2]);
        assert_eq!(frames[1].data[2..5], [3, 4, 5]);
    }

    #[test]
    fn test_frames_plus_tail_reconstruct_prefix() {
        let mut stream = jpeg(&[1, 2, 3]);
        stream.extend_from_slice(&jpeg(&[4, 5]));
        let complete_len = stream.len();
        // Partial third frame stays in the tail
        stream.extend_from_slice(&SOI);
        stream.extend_from_slice(&[6, 7]);

        let mut demux = FrameDemuxer::new();
        let mut reconstructed = Vec::new();
        for chunk in stream.chunks(5) {
            for frame in demux.push_chunk(chunk) {
                reconstructed.extend_from_slice(&frame.data);
            }
        }
        assert_eq!(reconstructed, stream[..complete_len]);

        reconstructed.extend_from_slice(demux.tail());
        assert_eq!(reconstructed, stream);
    }

    #[test]
    fn test_offsets_monotonic() {
        let mut demux = FrameDemuxer::new();
        let mut input = vec![0x00, 0x01]; // junk before the first frame
        input.extend_from_slice(&jpeg(&[1]));
        input.extend_from_slice(&jpeg(&[2]));

        let frames = demux.push_chunk(&input);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].offset, 2);
        assert!(frames[1].offset >= frames[0].offset);
    }

    #[test]
    fn test_resync_after_junk() {
        let mut demux = FrameDemuxer::new();
        assert!(demux.push_chunk(&[0x00, 0x11, 0x22]).is_empty());

        // Next valid frame is found despite the junk prefix
        let frames = demux.push_chunk(&jpeg(&[7]));
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_well_formed());
    }

    #[test]
    fn test_tail_overflow_discard() {
        let mut demux = FrameDemuxer::with_max_tail(64);

        // Junk without markers grows past the ceiling and is dropped
        assert!(demux.push_chunk(&[0u8; 100]).is_empty());
        assert!(demux.tail().is_empty());
        assert_eq!(demux.tail_discards(), 1);
        assert_eq!(demux.discarded_bytes(), 100);

        // A frame arriving after the discard is still extracted
        let frames = demux.push_chunk(&jpeg(&[1, 2]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].offset, 100);
    }

    #[test]
    fn test_overflow_drops_in_flight_frame() {
        let mut demux = FrameDemuxer::with_max_tail(16);

        // Start marker seen but the frame never completes before the ceiling
        let mut chunk = SOI.to_vec();
        chunk.extend_from_slice(&[0u8; 32]);
        assert!(demux.push_chunk(&chunk).is_empty());
        assert_eq!(demux.tail_discards(), 1);

        // The orphaned end marker of that frame is ignored; the next full
        // frame extracts cleanly
        let mut next = EOI.to_vec();
        next.extend_from_slice(&jpeg(&[3]));
        let frames = demux.push_chunk(&next);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data[2], 3);
    }

    #[test]
    fn test_zero_payload_frame() {
        let mut demux = FrameDemuxer::new();
        let frames = demux.push_chunk(&jpeg(&[]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].size(), 4);
    }
}
