mod common;

use std::collections::BTreeSet;

use common::{Blob, Demo};
use gamearc_engine::{ByteCursor, EntryTable, FormatPlugin, Source};
use proptest::prelude::*;

proptest! {
    #[test]
    fn scores_are_bounded_and_restore_the_cursor(
        bytes in proptest::collection::vec(any::<u8>(), 0..512),
        start in 0u64..512,
    ) {
        let mut cursor = ByteCursor::from_bytes(bytes).with_name("fuzz.demo");
        let start = start.min(cursor.len());
        cursor.seek(start).unwrap();

        let plugins: [&dyn FormatPlugin; 2] = [&Demo, &Blob];
        for plugin in plugins {
            let score = plugin.score(&mut cursor);
            prop_assert!(score.value() <= 100);
            prop_assert_eq!(cursor.tell(), start);
        }
    }

    #[test]
    fn inferred_lengths_cover_the_tail(
        offsets in proptest::collection::btree_set(0u64..4096, 1..64),
        slack in 0u64..128,
    ) {
        let offsets: BTreeSet<u64> = offsets;
        let size = offsets.iter().max().copied().unwrap_or_default() + slack;
        let source = Source::from_bytes("fuzz.dat", vec![0u8; size as usize]);

        let mut table = EntryTable::new(source, offsets.len());
        // reversed so directory order differs from offset order
        for &offset in offsets.iter().rev() {
            table.add_unnamed(offset, 0).unwrap();
        }
        table.infer_missing_lengths(size).unwrap();

        let first = *offsets.iter().next().unwrap();
        let total: u64 = table.iter().map(|e| e.length()).sum();
        prop_assert_eq!(total, size - first);
        for entry in table.iter() {
            prop_assert!(entry.offset() + entry.length() <= size);
        }
    }
}
