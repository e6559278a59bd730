#![no_main]

use libfuzzer_sys::fuzz_target;
use jreify::prelude::*;

fuzz_target!(|data: &[u8]| {
    let Ok(class) = ClassBuilder::new("fuzz/Main")
        .method(
            MethodBuilder::new("run", "(II)I")
                .flags(AccessFlags::PUBLIC | AccessFlags::STATIC)
                .body(16, 8, data.to_vec()),
        )
        .build()
    else {
        return;
    };

    let mut classes = ClassPath::new();
    classes.add(class);
    let mut reifier = Reifier::new(&classes);
    let _ = reifier.reify_method("fuzz/Main", "run", "(II)I");
});
