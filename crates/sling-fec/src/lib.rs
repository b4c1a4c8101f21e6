use bytes::Bytes;
use reed_solomon_erasure::galois_8::ReedSolomon;
use std::cmp;

/// Upper bound on data + parity shares per frame, imposed by the GF(2^8) field
pub const MAX_SHARES: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("cannot encode an empty frame")]
    EmptyFrame,
    #[error("share size must not be zero")]
    ZeroShareSize,
    #[error("frame requires {0} shares, at most {MAX_SHARES} are possible")]
    TooManyShares(usize),
    #[error(transparent)]
    Algorithm(#[from] reed_solomon_erasure::Error),
}

/// Systematic Reed-Solomon encoder turning one frame into a set of
/// equal-sized shares
///
/// The original frame is recoverable from any `data_shares` of the produced
/// set, so up to `parity_shares` shares may be lost in transit.
#[derive(Debug, Clone)]
pub struct FecEncoder {
    percentage: u8,
    share_size: usize,
}

impl FecEncoder {
    /// `percentage` is the parity overhead relative to the number of data
    /// shares, `share_size` the byte size every produced share has.
    pub fn new(percentage: u8, share_size: usize) -> Self {
        Self {
            percentage,
            share_size,
        }
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn set_percentage(&mut self, percentage: u8) {
        self.percentage = percentage;
    }

    pub fn share_size(&self) -> usize {
        self.share_size
    }

    pub fn set_share_size(&mut self, share_size: usize) {
        self.share_size = share_size;
    }

    /// Encode `frame` into an ordered share set, data shares first.
    ///
    /// At least one parity share is produced, even for tiny percentages.
    /// Fails without partial output when the frame cannot be represented.
    pub fn encode(&self, frame: &[u8]) -> Result<ShareSet, EncodeError> {
        if frame.is_empty() {
            return Err(EncodeError::EmptyFrame);
        }

        if self.share_size == 0 {
            return Err(EncodeError::ZeroShareSize);
        }

        let data_shares = frame.len().div_ceil(self.share_size);
        let parity_shares = cmp::max(
            1,
            (data_shares * usize::from(self.percentage)).div_ceil(100),
        );

        let total = data_shares + parity_shares;
        if total > MAX_SHARES {
            return Err(EncodeError::TooManyShares(total));
        }

        // data shares in frame order, the last one zero-padded to share_size
        let mut shards = Vec::with_capacity(total);
        for chunk in frame.chunks(self.share_size) {
            let mut shard = vec![0u8; self.share_size];
            shard[..chunk.len()].copy_from_slice(chunk);
            shards.push(shard);
        }
        shards.resize(total, vec![0u8; self.share_size]);

        ReedSolomon::new(data_shares, parity_shares)?.encode(&mut shards)?;

        Ok(ShareSet {
            shares: shards.into_iter().map(Bytes::from).collect(),
            data_shares,
            share_size: self.share_size,
        })
    }
}

/// Ordered shares produced from one frame
///
/// Iteration yields the data shares in frame order followed by the parity
/// shares; the final share of the set terminates the frame on the wire.
#[derive(Debug, Clone)]
pub struct ShareSet {
    shares: Vec<Bytes>,
    data_shares: usize,
    share_size: usize,
}

impl ShareSet {
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn share_size(&self) -> usize {
        self.share_size
    }

    pub fn data_shares(&self) -> usize {
        self.data_shares
    }

    pub fn parity_shares(&self) -> usize {
        self.shares.len() - self.data_shares
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bytes> {
        self.shares.iter()
    }
}

impl<'s> IntoIterator for &'s ShareSet {
    type Item = &'s Bytes;
    type IntoIter = std::slice::Iter<'s, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.shares.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_are_fixed_size_and_ordered() {
        let frame: Vec<u8> = (0..250u32).map(|i| i as u8).collect();

        let set = FecEncoder::new(50, 100).encode(&frame).unwrap();

        assert_eq!(set.data_shares(), 3);
        assert_eq!(set.parity_shares(), 2);
        assert_eq!(set.len(), 5);
        assert!(set.iter().all(|share| share.len() == 100));

        // data shares carry the frame verbatim, zero padding at the tail
        let data: Vec<u8> = set.iter().take(3).flatten().copied().collect();
        assert_eq!(&data[..250], &frame[..]);
        assert!(data[250..].iter().all(|&b| b == 0));
    }

    #[test]
    fn at_least_one_parity_share() {
        let set = FecEncoder::new(1, 100).encode(&[0xab; 10]).unwrap();

        assert_eq!(set.data_shares(), 1);
        assert_eq!(set.parity_shares(), 1);
    }

    #[test]
    fn full_percentage_doubles_the_share_count() {
        let set = FecEncoder::new(100, 64).encode(&[7; 256]).unwrap();

        assert_eq!(set.data_shares(), 4);
        assert_eq!(set.parity_shares(), 4);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(matches!(
            FecEncoder::new(20, 100).encode(&[]),
            Err(EncodeError::EmptyFrame)
        ));

        assert!(matches!(
            FecEncoder::new(20, 0).encode(&[1, 2, 3]),
            Err(EncodeError::ZeroShareSize)
        ));
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let frame = vec![0u8; 300];

        assert!(matches!(
            FecEncoder::new(20, 1).encode(&frame),
            Err(EncodeError::TooManyShares(_))
        ));
    }

    #[test]
    fn encoding_is_deterministic() {
        let frame = b"deterministic parity, please";

        let a = FecEncoder::new(40, 8).encode(frame).unwrap();
        let b = FecEncoder::new(40, 8).encode(frame).unwrap();

        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x == y));
    }
}
