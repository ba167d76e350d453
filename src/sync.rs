//! Lock-step synchronization of multiple sorted tab streams.
//!
//! All input files are advanced together, one chromosome+strand group
//! at a time: each call to `next_group` returns the lexicographically
//! smallest pending key across all streams plus, for every stream, the
//! full run of consecutive records on that key (empty for streams with
//! no records there).
//!
//! Memory: one lookahead record per stream plus the current group.
//!
//! REQUIREMENT: every input file must be sorted by chromosome+strand
//! key, then by ascending start. A violation is detected the moment a
//! stream steps backwards and is a fatal error - silently merging
//! unsorted input would corrupt every downstream array.

use crate::tab::{Result, Strand, TabError, TabReader, TabRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One chromosome+strand worth of records from every input stream.
#[derive(Debug)]
pub struct ChromGroup {
    /// Chromosome+strand key, e.g. `chr1+`.
    pub key: String,
    /// Per-stream record batches, parallel to the input file order.
    pub batches: Vec<Vec<TabRecord>>,
}

impl ChromGroup {
    /// Chromosome name without the strand suffix.
    pub fn chrom(&self) -> &str {
        &self.key[..self.key.len() - 1]
    }

    /// Strand encoded in the key suffix.
    pub fn strand(&self) -> Strand {
        match self.key.as_bytes()[self.key.len() - 1] {
            b'+' => Strand::Plus,
            _ => Strand::Minus,
        }
    }

    pub fn total_records(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }
}

/// Cursor over one sorted stream with a single-record lookahead.
struct StreamCursor<R: Read> {
    reader: TabReader<R>,
    label: String,
    pending: Option<TabRecord>,
    pending_key: String,
    last_key: Option<String>,
    prev_start: u64,
}

impl<R: Read> StreamCursor<R> {
    fn new(reader: TabReader<R>, label: String) -> Self {
        Self {
            reader,
            label,
            pending: None,
            pending_key: String::new(),
            last_key: None,
            prev_start: 0,
        }
    }

    /// Refill the lookahead slot, enforcing sort order.
    fn advance(&mut self) -> Result<()> {
        match self.reader.read_record()? {
            Some(record) => {
                let key = record.key();
                if let Some(ref prev) = self.last_key {
                    match key.cmp(prev) {
                        std::cmp::Ordering::Less => {
                            return Err(TabError::InvalidFormat(format!(
                                "input {} is not sorted: group '{}' follows '{}'",
                                self.label, key, prev
                            )));
                        }
                        std::cmp::Ordering::Equal if record.start < self.prev_start => {
                            return Err(TabError::InvalidFormat(format!(
                                "input {} is not sorted: position {} follows {} on {}",
                                self.label, record.start, self.prev_start, key
                            )));
                        }
                        std::cmp::Ordering::Equal => {}
                        std::cmp::Ordering::Greater => self.prev_start = 0,
                    }
                }
                self.prev_start = record.start;
                self.last_key = Some(key.clone());
                self.pending_key = key;
                self.pending = Some(record);
            }
            None => {
                self.pending = None;
            }
        }
        Ok(())
    }
}

/// Synchronized merge over K sorted tab streams.
pub struct StreamSync<R: Read> {
    cursors: Vec<StreamCursor<R>>,
}

impl StreamSync<File> {
    /// Open every path and prime the lookaheads.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut readers = Vec::with_capacity(paths.len());
        for p in paths {
            readers.push((
                p.as_ref().display().to_string(),
                TabReader::from_path(p.as_ref())?,
            ));
        }
        Self::new(readers)
    }
}

impl<R: Read> StreamSync<R> {
    /// Build a synchronizer from labelled readers (label is used in
    /// sort-violation messages).
    pub fn new(readers: Vec<(String, TabReader<R>)>) -> Result<Self> {
        let mut cursors: Vec<StreamCursor<R>> = readers
            .into_iter()
            .map(|(label, reader)| StreamCursor::new(reader, label))
            .collect();
        for cursor in &mut cursors {
            cursor.advance()?;
        }
        Ok(Self { cursors })
    }

    pub fn stream_count(&self) -> usize {
        self.cursors.len()
    }

    /// Pull the next chromosome+strand group, or None when all streams
    /// are drained.
    pub fn next_group(&mut self) -> Result<Option<ChromGroup>> {
        let key = match self
            .cursors
            .iter()
            .filter_map(|c| c.pending.as_ref().map(|_| c.pending_key.as_str()))
            .min()
        {
            Some(k) => k.to_string(),
            None => return Ok(None),
        };

        let mut batches = Vec::with_capacity(self.cursors.len());
        for cursor in &mut self.cursors {
            let mut batch = Vec::new();
            while cursor.pending.is_some() && cursor.pending_key == key {
                batch.push(cursor.pending.take().expect("pending checked above"));
                cursor.advance()?;
            }
            batches.push(batch);
        }

        Ok(Some(ChromGroup { key, batches }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_from(contents: &[&str]) -> StreamSync<&'static [u8]> {
        let readers = contents
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let leaked: &'static [u8] = Box::leak(c.as_bytes().to_vec().into_boxed_slice());
                (format!("stream{}", i), TabReader::new(leaked))
            })
            .collect();
        StreamSync::new(readers).unwrap()
    }

    #[test]
    fn test_merge_two_streams() {
        let mut sync = sync_from(&[
            "chr1\t+\t10\t20\nchr1\t+\t15\t25\nchr2\t+\t5\t9\n",
            "chr1\t+\t12\t22\nchr1\t-\t40\t50\n",
        ]);

        let g1 = sync.next_group().unwrap().unwrap();
        assert_eq!(g1.key, "chr1+");
        assert_eq!(g1.chrom(), "chr1");
        assert_eq!(g1.strand(), Strand::Plus);
        assert_eq!(g1.batches[0].len(), 2);
        assert_eq!(g1.batches[1].len(), 1);

        let g2 = sync.next_group().unwrap().unwrap();
        assert_eq!(g2.key, "chr1-");
        assert_eq!(g2.batches[0].len(), 0);
        assert_eq!(g2.batches[1].len(), 1);

        let g3 = sync.next_group().unwrap().unwrap();
        assert_eq!(g3.key, "chr2+");
        assert_eq!(g3.total_records(), 1);

        assert!(sync.next_group().unwrap().is_none());
    }

    #[test]
    fn test_keys_strictly_increasing_and_complete() {
        let mut sync = sync_from(&[
            "chr1\t+\t1\t5\nchr1\t-\t1\t5\nchr3\t+\t1\t5\n",
            "chr2\t-\t7\t9\nchr3\t+\t2\t6\n",
            "",
        ]);

        let mut keys = Vec::new();
        let mut total = 0;
        while let Some(group) = sync.next_group().unwrap() {
            total += group.total_records();
            keys.push(group.key);
        }
        assert_eq!(keys, vec!["chr1+", "chr1-", "chr2-", "chr3+"]);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(total, 5);
    }

    #[test]
    fn test_unsorted_key_is_fatal() {
        let mut sync = sync_from(&["chr2\t+\t1\t5\nchr1\t+\t1\t5\n"]);
        let err = loop {
            match sync.next_group() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("sort violation must be fatal"),
                Err(e) => break e,
            }
        };
        assert!(err.to_string().contains("not sorted"));
    }

    #[test]
    fn test_unsorted_position_is_fatal() {
        // Second record steps backwards within the same group
        let result = StreamSync::new(vec![(
            "s".to_string(),
            TabReader::new(&b"chr1\t+\t50\t60\nchr1\t+\t10\t20\n"[..]),
        )])
        .and_then(|mut s| {
            while s.next_group()?.is_some() {}
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_all_empty_streams() {
        let mut sync = sync_from(&["", "# only comments\n"]);
        assert!(sync.next_group().unwrap().is_none());
    }
}
