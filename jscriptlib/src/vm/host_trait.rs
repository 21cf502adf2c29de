use super::VmError;

/// Output sink for `PRINT`.
pub trait Host {
    fn print(&mut self, text: &str) -> Result<(), VmError>;
}
