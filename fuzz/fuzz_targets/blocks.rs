#![no_main]

use libfuzzer_sys::fuzz_target;
use jreify::bytecode::decode_blocks;

fuzz_target!(|data: &[u8]| {
    let _ = decode_blocks(data);
});
