use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

pub mod cursor {
    use byteorder::LittleEndian;
    use divan::Bencher;
    use gamearc_engine::ByteCursor;

    fn get_input() -> Vec<u8> {
        (0..64 * 1024).map(|i| i as u8).collect()
    }

    #[divan::bench]
    fn read_u32_all(bencher: Bencher) {
        bencher
            .with_inputs(|| ByteCursor::from_bytes(get_input()))
            .bench_local_values(|mut cursor| {
                while cursor.remaining() >= 4 {
                    divan::black_box(cursor.read_u32::<LittleEndian>().unwrap());
                }
            });
    }

    #[divan::bench(args = [512, 8 * 1024, 64 * 1024])]
    fn seek_and_read(bencher: Bencher, buffer: usize) {
        bencher
            .with_inputs(|| {
                ByteCursor::from_bytes(get_input())
                    .with_read_buffer_hint(buffer)
                    .unwrap()
            })
            .bench_local_values(|mut cursor| {
                for offset in (0..60 * 1024).step_by(4099) {
                    cursor.seek(offset).unwrap();
                    divan::black_box(cursor.read_bytes(256).unwrap());
                }
            });
    }
}

pub mod entries {
    use divan::Bencher;
    use gamearc_engine::{EntryTable, Source};

    #[divan::bench(args = [16, 1024, 65_536])]
    fn infer_missing_lengths(bencher: Bencher, count: u64) {
        let source = Source::from_bytes("bench.dat", vec![0u8; (count * 16) as usize]);

        bencher
            .with_inputs(|| {
                let mut table = EntryTable::new(source.clone(), count as usize);
                for i in (0..count).rev() {
                    table.add_unnamed(i * 16, 0).unwrap();
                }
                table
            })
            .bench_local_values(|mut table| {
                table.infer_missing_lengths(count * 16).unwrap();
                divan::black_box(table);
            });
    }
}
