pub mod clock;

pub use clock::{Clock, MonotonicClock, SharedClock};

/// Error type carried across the remote capability boundary.
pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

/// One named scalar on a remote endpoint.
pub trait RemoteVariable<T>: Send {
    fn read(&mut self) -> Result<T, RemoteError>;
    /// Write `value` and return the value the endpoint acknowledged.
    fn write(&mut self, value: T) -> Result<T, RemoteError>;
}

/// One named remote operation.
pub trait RemoteCommand: Send {
    fn invoke(&mut self, args: &[f64]) -> Result<f64, RemoteError>;
}

/// Resolves capabilities for a device path such as `epfl/station1/cyan`.
pub trait RemoteBackend: Send + Sync {
    fn float_variable(
        &self,
        device: &str,
        name: &str,
    ) -> Result<Box<dyn RemoteVariable<f64>>, RemoteError>;

    fn text_variable(
        &self,
        device: &str,
        name: &str,
    ) -> Result<Box<dyn RemoteVariable<String>>, RemoteError>;

    fn command(&self, device: &str, name: &str) -> Result<Box<dyn RemoteCommand>, RemoteError>;
}
