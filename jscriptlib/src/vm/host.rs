use std::io::{self, Write};

use super::{Host, VmError, VmErrorKind};

#[derive(Debug, Default)]
pub struct StdIoHost;

impl Host for StdIoHost {
    fn print(&mut self, text: &str) -> Result<(), VmError> {
        let mut out = io::stdout().lock();
        writeln!(out, "{text}")
            .and_then(|_| out.flush())
            .map_err(|e| VmError::new(VmErrorKind::HostError, e.to_string()))
    }
}

/// Captures printed lines for assertions.
#[derive(Debug, Default)]
pub struct TestHost {
    pub output: String,
}

impl TestHost {
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }
}

impl Host for TestHost {
    fn print(&mut self, text: &str) -> Result<(), VmError> {
        self.output.push_str(text);
        self.output.push('\n');
        Ok(())
    }
}
