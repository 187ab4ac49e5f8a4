//! Decoder for the line-oriented change report of the external transfer
//! tool. Each line is either a deletion notice (`*deleting <path>`) or an
//! itemized change code followed by a path; anything else is a diagnostic
//! the tool interleaves with its report and is skipped.

use crate::record::{ChangeRecord, FileKind, Reason, Update};
use std::collections::BTreeSet;

const DELETE_TAG: &str = "*deleting";

/// The attribute columns of an itemized code, by position:
/// `[0]` checksum/new, `[1]` size, `[2]` time (`t` preserved, `T` set to
/// transfer time), `[3]` permissions, `[4]` owner, `[5]` group, `[6]`
/// unused, then the optional `[7]` acl and `[8]` xattr columns.
#[derive(Debug, Default, Clone, Copy)]
struct AttrFlags {
    checksum: bool,
    new_item: bool,
    size: bool,
    time: bool,
    transfer_time: bool,
    permissions: bool,
    owner: bool,
    group: bool,
    acl: bool,
    xattr: bool,
}

impl AttrFlags {
    /// Read one column. Returns `false` when the character is not valid for
    /// the position, which marks the whole line unparseable.
    fn apply(&mut self, index: usize, ch: char) -> bool {
        // `.` means unchanged, `?` unknown; `+` marks every column of a
        // brand-new item but only the first column maps it to a reason.
        if ch == '.' || ch == '?' || (ch == '+' && index != 0) {
            return true;
        }
        match (index, ch) {
            (0, 'c') => self.checksum = true,
            (0, '+') => self.new_item = true,
            (1, 's') => self.size = true,
            (2, 't') => self.time = true,
            (2, 'T') => self.transfer_time = true,
            (3, 'p') => self.permissions = true,
            (4, 'o') => self.owner = true,
            (5, 'g') => self.group = true,
            (6, _) => {} // reserved column, content ignored
            (7, 'a') => self.acl = true,
            (8, 'x') => self.xattr = true,
            _ => return false,
        }
        true
    }

    fn reasons(&self) -> BTreeSet<Reason> {
        let pairs = [
            (self.checksum, Reason::Checksum),
            (self.new_item, Reason::New),
            (self.size, Reason::Size),
            (self.time, Reason::Time),
            (self.permissions, Reason::Permissions),
            (self.owner, Reason::Owner),
            (self.group, Reason::Group),
            (self.acl, Reason::Acl),
            (self.xattr, Reason::Extended),
        ];
        pairs
            .into_iter()
            .filter_map(|(set, reason)| set.then_some(reason))
            .collect()
    }

    /// A line whose only detected reason is `time`, or with no reasons and
    /// the capitalized time flag, reports a cosmetic timestamp adjustment
    /// and must not surface as a change.
    fn timestamp_noise_only(&self, reasons: &BTreeSet<Reason>) -> bool {
        (reasons.len() == 1 && reasons.contains(&Reason::Time))
            || (reasons.is_empty() && self.transfer_time)
    }
}

fn parse_line(line: &str) -> Option<ChangeRecord> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(DELETE_TAG) {
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.trim_start();
        if path.is_empty() {
            return None;
        }
        let kind = if path.ends_with('/') {
            FileKind::Directory
        } else {
            FileKind::File
        };
        return Some(ChangeRecord::new(
            Update::Deleted,
            kind,
            [Reason::Missing],
            path.trim_end_matches('/'),
        ));
    }

    let (code, path) = line.split_once(' ')?;
    let path = path.trim_start();
    if path.is_empty() || !code.is_ascii() || !(9..=11).contains(&code.len()) {
        return None;
    }

    let bytes = code.as_bytes();
    let update = match bytes[0] {
        b'<' => Update::Sent,
        b'>' => Update::Received,
        b'c' => Update::Created,
        b'h' => Update::Link,
        b'.' => Update::Attributes,
        _ => return None,
    };
    let kind = match bytes[1] {
        b'f' => FileKind::File,
        b'd' => FileKind::Directory,
        b'L' => FileKind::Symlink,
        b'D' => FileKind::Device,
        b'S' => FileKind::Special,
        _ => return None,
    };

    let mut flags = AttrFlags::default();
    for (index, &byte) in bytes[2..].iter().enumerate() {
        if !flags.apply(index, byte as char) {
            return None;
        }
    }

    let reason = flags.reasons();
    if flags.timestamp_noise_only(&reason) {
        return None;
    }

    Some(ChangeRecord::new(update, kind, reason, path))
}

/// One-shot decode of a complete report. Lines that do not parse are
/// silently dropped; output order follows input order.
pub fn decode(output: &str) -> Vec<ChangeRecord> {
    output.lines().filter_map(parse_line).collect()
}

/// Incremental decoder for output that streams in from a long-running
/// transfer. Only complete lines are decoded on each push; the trailing
/// partial line is buffered until the next chunk or [`finish`].
///
/// [`finish`]: ItemizeDecoder::finish
#[derive(Debug, Default)]
pub struct ItemizeDecoder {
    pending: String,
}

impl ItemizeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and decode every line it completes.
    pub fn push(&mut self, chunk: &str) -> Vec<ChangeRecord> {
        self.pending.push_str(chunk);
        match self.pending.rfind('\n') {
            Some(newline) => {
                let complete: String = self.pending.drain(..=newline).collect();
                decode(&complete)
            }
            None => Vec::new(),
        }
    }

    /// Flush at end of stream, decoding any trailing unterminated line.
    pub fn finish(mut self) -> Vec<ChangeRecord> {
        decode(&std::mem::take(&mut self.pending))
    }
}
