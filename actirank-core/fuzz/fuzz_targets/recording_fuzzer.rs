#![no_main]
use actirank_core::window::{segment, BoundaryRule, WindowSpec};
use actirank_core::SampleMatrix;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else { return; };
    let Ok(matrix) = SampleMatrix::parse(text) else { return; };

    let spec = WindowSpec::new(4, 2, BoundaryRule::Exclusive).unwrap();
    for window in segment(&matrix, &spec) {
        assert_eq!(window.len(), 4);
        assert!(window.range().end <= matrix.rows());
    }
});
