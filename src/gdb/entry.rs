//! Entry layout inside the state file's active window.
//!
//! The file is divided into generations by the marker `FF FD FF FD`; only
//! the window between the second-to-last and the last marker is ever
//! parsed or rewritten. Inside the window an entry looks like:
//!
//! ```text
//! [len u8][00 00 00][key (len-1 bytes)][00 03 00 02 00 00 00][30+value][00]
//! ```
//!
//! with the two-byte marker `FF FD` separating entries and stray `FF`
//! filler bytes allowed in between. Everything before the window and
//! after the closing marker is opaque and preserved byte for byte.

use memchr::memmem;

/// Generation delimiter; the active window sits between the last two
pub const WINDOW_MARKER: [u8; 4] = [0xFF, 0xFD, 0xFF, 0xFD];
/// Separator between entries inside the window
pub const ENTRY_MARKER: [u8; 2] = [0xFF, 0xFD];
/// Fixed byte sequence between a key and its value byte
pub const VALUE_TAG: [u8; 7] = [0x00, 0x03, 0x00, 0x02, 0x00, 0x00, 0x00];
/// Offset of the value byte relative to the start of the tag
pub const VALUE_OFFSET: usize = VALUE_TAG.len();
/// Bias added to a value to produce its stored byte
pub const VALUE_BIAS: u8 = 0x30;

/// Locate the active window. Returns the offsets of the opening and the
/// closing marker, or None when the file holds fewer than two markers.
pub fn find_window(content: &[u8]) -> Option<(usize, usize)> {
    let closing = memmem::rfind(content, &WINDOW_MARKER)?;
    let opening = memmem::rfind(&content[..closing], &WINDOW_MARKER)?;
    Some((opening, closing))
}

/// A well-formed window entry. `start..end` spans the raw bytes up to,
/// but not including, the trailing entry marker.
#[derive(Debug, PartialEq, Eq)]
pub struct Entry {
    pub start: usize,
    pub end: usize,
    /// The key, extracted via the length prefix
    pub key: Vec<u8>,
}

/// Scan the window linearly for well-formed entries. Malformed bytes are
/// walked over one at a time so a single bad entry cannot end the scan.
pub fn scan(content: &[u8], data_start: usize, data_end: usize) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut pos = data_start;
    while pos < data_end {
        if content[pos] == 0xFF {
            pos += 1;
            continue;
        }
        let length = content[pos] as usize;
        if length < 2 || pos + 4 >= data_end || content[pos + 1..pos + 4].iter().any(|&b| b != 0) {
            pos += 1;
            continue;
        }
        let body = pos + 4;
        let next_marker = match memmem::find(&content[body..], &ENTRY_MARKER) {
            Some(rel) => body + rel,
            None => {
                pos += 1;
                continue;
            }
        };
        if next_marker > data_end {
            pos += 1;
            continue;
        }
        let key_end = body + length - 1;
        if key_end > next_marker {
            // Length prefix points past the entry, drop it
            pos = next_marker + ENTRY_MARKER.len();
            continue;
        }
        entries.push(Entry {
            start: pos,
            end: next_marker,
            key: content[body..key_end].to_vec(),
        });
        pos = next_marker + ENTRY_MARKER.len();
    }
    entries
}

/// Drop stray zero bytes between the window start and the first entry.
/// Returns how many bytes were removed.
pub fn compact(content: &mut Vec<u8>, data_start: usize, data_end: usize) -> usize {
    let mut pos = data_start;
    while pos < data_end && content[pos] == 0 {
        pos += 1;
    }
    if pos > data_start {
        content.drain(data_start..pos);
    }
    pos - data_start
}

/// Encode a fresh entry holding `value` under `key`
pub fn build(key: &[u8], value: u8) -> Vec<u8> {
    let mut entry = Vec::with_capacity(key.len() + VALUE_TAG.len() + 6);
    entry.push(key.len() as u8 + 1);
    entry.extend_from_slice(&[0, 0, 0]);
    entry.extend_from_slice(key);
    entry.extend_from_slice(&VALUE_TAG);
    entry.push(VALUE_BIAS.wrapping_add(value));
    entry.push(0);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(entries: &[&[u8]]) -> (Vec<u8>, usize, usize) {
        let mut content = vec![0u8; 8];
        content.extend_from_slice(&WINDOW_MARKER);
        let data_start = content.len();
        for (i, raw) in entries.iter().enumerate() {
            if i > 0 {
                content.extend_from_slice(&ENTRY_MARKER);
            }
            content.extend_from_slice(raw);
        }
        let data_end = content.len();
        content.extend_from_slice(&WINDOW_MARKER);
        content.extend_from_slice(b"tail");
        (content, data_start, data_end)
    }

    #[test]
    fn build_produces_the_documented_layout() {
        let entry = build(b"masonry", 1);
        assert_eq!(entry[0], 8);
        assert_eq!(&entry[1..4], &[0, 0, 0]);
        assert_eq!(&entry[4..11], b"masonry");
        assert_eq!(&entry[11..18], &VALUE_TAG);
        assert_eq!(entry[18], b'1');
        assert_eq!(entry[19], 0);
        assert_eq!(entry.len(), 20);
    }

    #[test]
    fn scan_extracts_keys_via_length_prefix() {
        let (content, start, end) = window_with(&[&build(b"alchemy", 0), &build(b"masonry", 2)]);
        let entries = scan(&content, start, end);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, b"alchemy");
        assert_eq!(entries[1].key, b"masonry");
        assert_eq!(
            &content[entries[1].start..entries[1].end],
            &build(b"masonry", 2)[..]
        );
    }

    #[test]
    fn scan_skips_filler_and_garbage() {
        let mut first = build(b"alchemy", 0);
        first.extend_from_slice(&ENTRY_MARKER);
        first.extend_from_slice(&[0xFF, 0xFF, 0x07, 0x01]);
        first.extend_from_slice(&ENTRY_MARKER);
        first.extend_from_slice(&build(b"masonry", 1));
        let (content, start, end) = window_with(&[&first]);

        let keys: Vec<_> = scan(&content, start, end)
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec![b"alchemy".to_vec(), b"masonry".to_vec()]);
    }

    #[test]
    fn scan_of_an_empty_window_finds_nothing() {
        let (content, start, end) = window_with(&[]);
        assert_eq!(start, end);
        assert!(scan(&content, start, end).is_empty());
    }

    #[test]
    fn find_window_picks_the_last_two_markers() {
        let mut content = Vec::new();
        content.extend_from_slice(&WINDOW_MARKER);
        content.extend_from_slice(b"old generation");
        content.extend_from_slice(&WINDOW_MARKER);
        let opening = content.len() - WINDOW_MARKER.len();
        content.extend_from_slice(&build(b"bridge", 1));
        let closing = content.len();
        content.extend_from_slice(&WINDOW_MARKER);

        assert_eq!(find_window(&content), Some((opening, closing)));
    }

    #[test]
    fn find_window_needs_two_markers() {
        assert_eq!(find_window(b"no markers here"), None);
        let mut content = vec![0u8; 4];
        content.extend_from_slice(&WINDOW_MARKER);
        assert_eq!(find_window(&content), None);
    }

    #[test]
    fn compact_drops_leading_zeroes_only() {
        let (mut content, start, end) = window_with(&[&build(b"masonry", 1)]);
        content.splice(start..start, [0u8, 0, 0]);
        assert_eq!(compact(&mut content, start, end + 3), 3);
        let entries = scan(&content, start, end);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start, start);

        // Nothing to drop the second time around
        assert_eq!(compact(&mut content, start, end), 0);
    }
}
