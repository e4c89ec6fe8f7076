//! The capability contract for pooled resources

/// Boxed error used for factory failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A connection-like resource that can be pooled
///
/// The pool only ever talks to a resource through these two methods. It has
/// no idea whether the value wraps a socket, an RPC channel or a database
/// handle.
///
/// # Examples
///
/// ```
/// use freshpool::Resource;
/// use std::io;
///
/// struct Channel {
///     open: bool,
/// }
///
/// impl Resource for Channel {
///     type Error = io::Error;
///
///     fn ping(&mut self) -> Result<(), Self::Error> {
///         if self.open {
///             Ok(())
///         } else {
///             Err(io::Error::new(io::ErrorKind::NotConnected, "channel down"))
///         }
///     }
///
///     fn close(self) -> Result<(), Self::Error> {
///         Ok(())
///     }
/// }
/// ```
pub trait Resource: Send + 'static {
    /// Error reported by `ping` and `close`
    type Error: std::error::Error + Send + Sync + 'static;

    /// Synchronous liveness probe
    fn ping(&mut self) -> Result<(), Self::Error>;

    /// Release the underlying handle
    ///
    /// Takes `self` by value, so the pool can close a given resource at most once.
    fn close(self) -> Result<(), Self::Error>;
}
