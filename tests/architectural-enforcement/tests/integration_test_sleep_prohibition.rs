//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the core and the TUI MUST NOT call sleep
//! methods. Everything waits on I/O: channel events, terminal events, or an
//! explicit deadline (`tokio::time::sleep_until` on a stored instant).
//! **Exceptions**: test code (`#[cfg(test)]` modules and `tests/`).

use architectural_enforcement::find_violations;

fn is_sleep_call(code: &str) -> bool {
    code.contains("::sleep(") || code.contains(".sleep(")
}

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = find_violations("client/core/src", is_sleep_call);
    violations.extend(find_violations("tui/src", is_sleep_call));

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nWait on a channel, a stream, or sleep_until(deadline) instead.");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_sleep_detector() {
    assert!(is_sleep_call("tokio::time::sleep(Duration::from_millis(16)).await;"));
    assert!(is_sleep_call("std::thread::sleep(d);"));
    assert!(!is_sleep_call("tokio::time::sleep_until(at).await;"));
}
