#![no_main]
use libfuzzer_sys::fuzz_target;
use poolctl_core::{CommandReply, parse_command};

fuzz_target!(|data: &str| {
    // Every line from stdin must map to a command or a structured rejection.
    let result = parse_command(data).map(|_| ());
    let reply = CommandReply::from_result(&result);
    assert_eq!(reply.ok, result.is_ok());
    if !reply.ok {
        assert!(reply.code.is_some());
    }
});
