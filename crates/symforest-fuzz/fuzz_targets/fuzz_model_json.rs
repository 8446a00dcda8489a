#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use symforest::inference::UnrolledScorer;
use symforest::persist;

fuzz_target!(|data: &[u8]| {
    let Ok(model) = persist::read_json(Cursor::new(data)) else {
        return;
    };
    // Any model that loads must score without panicking.
    let scorer = UnrolledScorer::new(&model);
    let mut scratch = scorer.new_scratch();
    let record = vec![0.5f32; model.n_features()];
    let _ = scorer.score(&record, &mut scratch);
});
