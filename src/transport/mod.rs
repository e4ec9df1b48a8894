//! Delivery sinks for formatted detection messages.
//!
//! A transport only moves bytes. It never sees a `DetectionResult`; the
//! publisher formats first and hands over the finished string.

mod file;
mod udp;

pub use file::FileTransport;
pub use udp::UdpTransport;

/// Send capability owned by exactly one publisher.
pub trait Transport: Send {
    /// Hand `data` to the medium. `true` means accepted for delivery; for
    /// datagrams that is not a delivery receipt. Failures are logged by the
    /// implementation and never retried.
    fn send(&mut self, data: &str) -> bool;

    /// Whether setup succeeded. Says nothing about peer reachability.
    fn is_connected(&self) -> bool;

    /// Destination for log lines, e.g. `udp://127.0.0.1:5000`.
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &str) -> bool {
        (**self).send(data)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
