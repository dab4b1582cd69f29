#![no_main]

use libfuzzer_sys::fuzz_target;
use muster_contract::PersistedRecord;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = serde_json::from_slice::<PersistedRecord>(data) {
        let encoded = serde_json::to_string(&record).expect("record always serializes");
        let decoded: PersistedRecord =
            serde_json::from_str(&encoded).expect("re-encoded record always parses");
        assert_eq!(decoded, record);
    }
});
