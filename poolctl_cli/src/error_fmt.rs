//! Human-readable error descriptions and structured JSON error formatting.

use poolctl_core::Fault;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(Fault::ActuationUnreachable { failures }) = err.downcast_ref::<Fault>() {
        return format!(
            "What happened: The relay block stopped accepting writes ({failures} failures in a row).\nLikely causes: Relay board unpowered, GPIO access lost, or wiring fault.\nHow to fix: Check relay power and wiring, then restart. All devices were commanded OFF."
        );
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        let cause = err.source().map(|s| format!(" ({s})")).unwrap_or_default();
        return format!(
            "What happened: Could not read the config file{cause}.\nHow to fix: Pass an existing TOML file with --config."
        );
    }

    if lower.contains("parse config") {
        let cause = err.source().map(|s| format!("\n{s}")).unwrap_or_default();
        return format!(
            "What happened: Config file is not valid TOML for this controller.{cause}\nHow to fix: Fix the reported key or section, then rerun."
        );
    }

    if lower.contains("invalid configuration") {
        let cause = err.source().map(|s| format!(" ({s})")).unwrap_or_default();
        return format!(
            "What happened: Configuration is invalid{cause}.\nLikely causes: Out-of-range values or channels/sensors that do not line up.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("relay gpio") || lower.contains("hardware` feature") {
        return format!(
            "What happened: Failed to initialize the relay hardware.\nLikely causes: Wrong [relay] port_gpio, missing GPIO permissions, or a build without hardware support.\nHow to fix: Check the config and permissions, or set hardware.mode = \"simulated\". Original: {msg}"
        );
    }

    if lower.contains("self-check") {
        return format!("What happened: {msg}.\nHow to fix: Check the listed relays and sensors.");
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Faults get their own exit code; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<Fault>() {
        Some(Fault::ActuationUnreachable { .. }) => 3,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = match err.downcast_ref::<Fault>() {
        Some(Fault::ActuationUnreachable { .. }) => "ActuationUnreachable",
        None => "Error",
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
