//! **U8** archives used by Nintendo Wii titles for banners, sound and layout data.
//!
//! | Offset (bytes) | Field           | Description                                         |
//! |----------------|-----------------|-----------------------------------------------------|
//! | 0x0000         | Magic number    | 4 bytes: 0x55AA382D                                 |
//! | 0x0004         | Root Offset     | 4 bytes: Offset of the first node, always 0x20      |
//! | 0x0008         | Header Size     | 4 bytes: Size of the node table and string table    |
//! | 0x000C         | Data Offset     | 4 bytes: Offset of the first payload                |
//! | 0x0010         | Reserved        | 16 bytes                                            |
//!
//! The node table is a flattened tree of 12 byte nodes: a type (0 file, 1 directory), a 24
//! bit offset into the string table, then two words. Files store their payload offset and
//! size there. Directories store the index of their parent and the index of the first node
//! past their last descendant. The root directory is node 0 and its second word is the
//! number of nodes. The string table follows the last node.
//!
//! Unlike every other bundled format, all integers are **big-endian**.

use std::sync::Arc;

use binrw::BinRead;
use byteorder::BigEndian;
use gamearc_engine::{
    error::{Error, Result},
    validate::{check_file_count, check_filename, check_span},
    ByteCursor, Capabilities, ConfidenceScore, EntryTable, FormatDescriptor, FormatPlugin,
    Limits, Platform, Source,
};
use tracing::{debug, instrument, warn};

use crate::binrw_error;

/// Identity of the U8 format
pub static DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    tag: "u8",
    label: "Nintendo U8 archive",
    extensions: &["arc", "u8"],
    platforms: &[Platform::Wii],
    capabilities: Capabilities::READ_ONLY,
};

const MAGIC: [u8; 4] = [0x55, 0xAA, 0x38, 0x2D];
const HEADER_SIZE: u64 = 32;
const NODE_SIZE: u64 = 12;
const ROOT_OFFSET: u32 = 0x20;

/// U8 file header
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq)]
#[br(big, magic = b"\x55\xAA\x38\x2D")]
pub struct U8Header {
    /// Offset of the root node
    pub root_offset: u32,

    /// Combined size of the node table and the string table
    pub header_size: u32,

    /// Offset of the first payload
    pub data_offset: u32,

    /// Unused
    pub reserved: [u8; 16],
}

#[derive(Debug, Clone, Copy)]
struct Node {
    kind: u8,
    name_offset: u32,
    data: u32,
    size: u32,
}

impl Node {
    fn read(cursor: &mut ByteCursor) -> Result<Node> {
        Ok(Node {
            kind: cursor.read_u8()?,
            name_offset: cursor.read_u24::<BigEndian>()?,
            data: cursor.read_u32::<BigEndian>()?,
            size: cursor.read_u32::<BigEndian>()?,
        })
    }
}

/// Reader for U8 archives
#[derive(Debug, Clone, Copy, Default)]
pub struct U8;

impl U8 {
    fn read_header(cursor: &mut ByteCursor) -> Result<U8Header> {
        cursor.require(HEADER_SIZE)?;
        if cursor.peek_bytes(4)? != MAGIC {
            return Err(Error::BadMagic {
                format: DESCRIPTOR.tag,
                offset: 0,
            });
        }
        U8Header::read(cursor).map_err(|e| binrw_error(DESCRIPTOR.tag, e))
    }
}

/// Walks the flattened node table of one archive
struct Walk<'a> {
    cursor: &'a mut ByteCursor,
    nodes: &'a [Node],
    strings_start: u64,
    strings_end: u64,
    limits: &'a Limits,
}

impl Walk<'_> {
    fn name(&mut self, node: &Node) -> Result<String> {
        let start = self.strings_start + node.name_offset as u64;
        if start >= self.strings_end {
            return Err(Error::InconsistentDirectory(format!(
                "name offset {} is outside of the string table",
                node.name_offset
            )));
        }
        self.cursor.seek(start)?;

        // The terminator has to fit as well
        let room = (self.strings_end - start) as usize;
        let max = room.min(self.limits.max_name_length.saturating_add(1));
        self.cursor.read_null_terminated_string(Some(max))
    }

    /// Add every node in `first..end` to `table`, descending into directories.
    fn children(
        &mut self,
        table: &mut EntryTable,
        first: usize,
        end: usize,
        prefix: &str,
        depth: usize,
    ) -> Result<()> {
        let mut index = first;
        while index < end {
            let node = self.nodes[index];
            let name = self.name(&node)?;
            let path = match prefix {
                "" => name,
                prefix => format!("{prefix}/{name}"),
            };

            match node.kind {
                0 => {
                    check_filename(&path, self.limits)?;
                    table.add(path, node.data as u64, node.size as u64)?;
                    index += 1;
                }
                1 => {
                    let next = node.size as usize;
                    if next <= index || next > end {
                        return Err(Error::InconsistentDirectory(format!(
                            "directory node {index} ends at node {next}, outside of {index}..{end}"
                        )));
                    }
                    if depth >= self.limits.max_depth {
                        return Err(Error::InconsistentDirectory(format!(
                            "{path} is nested deeper than {} directories",
                            self.limits.max_depth
                        )));
                    }
                    self.children(table, index + 1, next, &path, depth + 1)?;
                    index = next;
                }
                kind => {
                    warn!(node = index, kind, "unsupported node type");
                    return Err(Error::UnsupportedEntryType {
                        format: DESCRIPTOR.tag,
                        tag: kind as u32,
                    });
                }
            }
        }
        Ok(())
    }
}

impl FormatPlugin for U8 {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &DESCRIPTOR
    }

    fn probe(&self, cursor: &mut ByteCursor) -> Result<ConfidenceScore> {
        let mut score = ConfidenceScore::default();
        score.add_if(
            DESCRIPTOR.matches_extension(cursor.name().unwrap_or_default()),
            ConfidenceScore::EXTENSION,
        );

        let Ok(header) = U8::read_header(cursor) else {
            return Ok(score);
        };
        score.add(ConfidenceScore::MAGIC);
        score.add_if(header.root_offset == ROOT_OFFSET, ConfidenceScore::FIELD);
        score.add_if(
            header.data_offset as u64 >= header.root_offset as u64 + header.header_size as u64
                && header.data_offset as u64 <= cursor.len(),
            ConfidenceScore::FIELD,
        );
        Ok(score)
    }

    #[instrument(skip_all, fields(source = source.name()), err)]
    fn extract(&self, source: &Arc<Source>, limits: &Limits) -> Result<EntryTable> {
        let mut cursor = source.lock();
        cursor.seek(0)?;

        let header = U8::read_header(&mut cursor)?;
        let root_offset = header.root_offset as u64;
        let header_size = header.header_size as u64;
        check_span(root_offset, header_size, cursor.len())?;

        cursor.seek(root_offset)?;
        let root = Node::read(&mut cursor)?;
        if root.kind != 1 {
            return Err(Error::InconsistentDirectory(format!(
                "root node has type {}",
                root.kind
            )));
        }
        let count = check_file_count(root.size, limits)?;
        if count as u64 * NODE_SIZE > header_size {
            return Err(Error::InconsistentDirectory(format!(
                "{count} nodes do not fit in a {header_size} byte header"
            )));
        }
        debug!(nodes = count, "read root node");

        let mut nodes = Vec::with_capacity(count);
        nodes.push(root);
        for _ in 1..count {
            nodes.push(Node::read(&mut cursor)?);
        }

        let mut table = EntryTable::new(Arc::clone(source), count);
        let mut walk = Walk {
            cursor: &mut cursor,
            nodes: &nodes,
            strings_start: root_offset + count as u64 * NODE_SIZE,
            strings_end: root_offset + header_size,
            limits,
        };
        walk.children(&mut table, 1, count, "", 0)?;
        Ok(table)
    }
}
