#![no_main]

use lazyresolv::config::Config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let _ = Config::from_yaml(yaml_str);
    }
});
