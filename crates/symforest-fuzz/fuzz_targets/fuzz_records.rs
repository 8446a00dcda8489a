#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use symforest::io::read_records;

fuzz_target!(|data: &[u8]| {
    let _ = read_records(Cursor::new(data));
});
