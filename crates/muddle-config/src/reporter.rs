/// Ambient progress/diagnostic output for a build run.
///
/// There is no structured-logging framework here: a muddle run reports to
/// exactly one human or one calling process, so a small trait plus a
/// console and a silent implementation covers every need.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    fn action_started(&self, label: &str) {
        self.info(&format!("-- {label}"));
    }

    fn action_finished(&self, label: &str, outcome: &str) {
        self.info(&format!("-- {label}: {outcome}"));
    }
}

/// Writes to stdout/stderr; used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("warning: {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

/// Discards everything; used by tests and library embedders that don't
/// want console output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}
