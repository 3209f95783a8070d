// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for tally-runner.

use std::any::Any;

/// Utilities for pluralizing various words based on count.
pub mod plural {
    /// Returns "suite" if `count` is 1, otherwise "suites".
    pub fn suites_str(count: usize) -> &'static str {
        if count == 1 { "suite" } else { "suites" }
    }

    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "mismatch" if `count` is 1, otherwise "mismatches".
    pub fn mismatches_str(count: usize) -> &'static str {
        if count == 1 {
            "mismatch"
        } else {
            "mismatches"
        }
    }
}

/// Extracts a message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "(non-string panic payload)".to_owned()
    }
}

/// Returns the first line of `message`, or the empty string.
pub(crate) fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages() {
        let payload = std::panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static message");

        let payload =
            std::panic::catch_unwind(|| panic!("formatted {}", "message")).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted message");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(42_u32)).unwrap_err();
        assert_eq!(panic_message(&*payload), "(non-string panic payload)");
    }

    #[test]
    fn first_lines() {
        assert_eq!(first_line("one\ntwo"), "one");
        assert_eq!(first_line("one"), "one");
        assert_eq!(first_line(""), "");
    }
}
