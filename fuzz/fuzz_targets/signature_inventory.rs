#![no_main]

use libfuzzer_sys::fuzz_target;

use portcullis_core::config::GroupingConfig;
use portcullis_port_grouping::{GroupingEngine, SignatureLoader};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // 파싱/검증은 패닉 없이 Ok 또는 Err
    let Ok(signatures) = SignatureLoader::new(256).parse(text, "fuzz") else {
        return;
    };

    // 검증을 통과한 인벤토리는 항상 빌드되어야 함
    let mut engine = GroupingEngine::new(GroupingConfig::default());
    engine.reload(&signatures).unwrap();
});
