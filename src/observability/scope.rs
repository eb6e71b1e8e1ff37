//! Begin/complete logging around one operation
//!
//! - `{name}_BEGIN` on creation (INFO)
//! - `{name}_COMPLETE` on `complete()` (INFO)
//! - `{name}_FAILED` on `fail()` (ERROR)
//! - `{name}_INCOMPLETE` if dropped without either (WARN)
//!
//! Every event carries the scope's fields plus `elapsed_ms` on exit.

use std::time::Instant;

use super::logger::Logger;

/// Logs the lifecycle of a named operation
///
/// ```ignore
/// let scope = ObservationScope::with_fields("QUERY", &[("query_id", &id)]);
/// // ... run ...
/// scope.complete_with_fields(&[("items", "3")]);
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    fields: Vec<(&'a str, String)>,
    started: Instant,
    finished: bool,
}

impl<'a> ObservationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);
        Self {
            name,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
            finished: false,
        }
    }

    fn exit_fields<'b>(&'b self, elapsed: &'b str, extra: &[(&'b str, &'b str)]) -> Vec<(&'b str, &'b str)> {
        let mut all: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.push(("elapsed_ms", elapsed));
        all.extend(extra.iter().copied());
        all
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms();
        Logger::info(&format!("{}_COMPLETE", self.name), &self.exit_fields(&elapsed, extra));
    }

    /// Logs `{name}_FAILED` with the error code and reason
    pub fn fail(mut self, code: &str, reason: &str) {
        self.finished = true;
        let elapsed = self.elapsed_ms();
        let extra = [("code", code), ("reason", reason)];
        Logger::error(&format!("{}_FAILED", self.name), &self.exit_fields(&elapsed, &extra));
    }

    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_lifecycle() {
        let scope = ObservationScope::with_fields("TEST", &[("query_id", "q1")]);
        assert!(!scope.finished);
        scope.complete_with_fields(&[("items", "2")]);
    }

    #[test]
    fn test_scope_fail_and_drop() {
        ObservationScope::new("TEST").fail("DQ_TEST", "boom");
        drop(ObservationScope::new("TEST"));
    }

    #[test]
    fn test_elapsed_is_numeric() {
        let scope = ObservationScope::new("TEST");
        assert!(scope.elapsed_ms().parse::<u128>().is_ok());
        scope.complete();
    }
}
