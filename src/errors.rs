use std::error::Error;
use std::fmt;
use std::io;

/// Enum representing errors happening while trying to hand frames to the
/// network device.
#[derive(Debug)]
pub enum TxError {
    /// Returned when the payload does not fit in the given protocol. For
    /// example sending a packet with more than 2^16 bytes in a protocol
    /// with a 16 bit length field.
    TooLargePayload,

    /// Returned when the device did not have buffer space for the frame.
    InsufficientBuffer,

    /// Returned when a lock inside the stack is poisoned so locking can't
    /// be performed. Should not happen.
    PoisonedLock,

    /// Returned when there was an `IoError` during transmission.
    IoError(io::Error),

    /// Any other error not covered by the more specific enum variants.
    Other(String),
}

impl From<io::Error> for TxError {
    fn from(e: io::Error) -> Self {
        TxError::IoError(e)
    }
}

impl From<TxError> for io::Error {
    fn from(e: TxError) -> Self {
        let other = |msg: String| io::Error::new(io::ErrorKind::Other, msg);
        match e {
            TxError::TooLargePayload => other("Too large payload".to_owned()),
            TxError::InsufficientBuffer => other("Insufficient buffer space".to_owned()),
            TxError::PoisonedLock => other("Poisoned lock".to_owned()),
            TxError::IoError(e2) => e2,
            TxError::Other(msg) => other(format!("Other: {}", msg)),
        }
    }
}

impl fmt::Display for TxError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use TxError::*;
        match *self {
            TooLargePayload => fmt.write_str("Too large payload"),
            InsufficientBuffer => fmt.write_str("Insufficient buffer space"),
            PoisonedLock => fmt.write_str("Poisoned lock"),
            IoError(ref e) => write!(fmt, "IO error: {}", e),
            Other(ref s) => write!(fmt, "Other error: {}", s),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        if let TxError::IoError(ref e) = *self {
            Some(e)
        } else {
            None
        }
    }
}

/// Type binding for the type of `Result` that a send method returns.
pub type TxResult = Result<(), TxError>;

/// Error describing why an incoming packet was dropped by the receive
/// pipeline.
#[derive(Debug, Eq, PartialEq)]
pub enum RxError {
    /// When a packet contains an invalid checksum.
    InvalidChecksum,

    /// When the length of the packet does not match the requirements or
    /// header content of a protocol.
    InvalidLength,

    /// When other packet content is invalid.
    InvalidContent,

    /// Some error that was not covered by the more specific errors in this
    /// enum.
    Other(String),
}

impl fmt::Display for RxError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use RxError::*;
        match *self {
            InvalidChecksum => fmt.write_str("Invalid checksum in packet"),
            InvalidLength => fmt.write_str("Invalid length field in packet"),
            InvalidContent => fmt.write_str("Invalid content in packet"),
            Other(ref s) => write!(fmt, "Other error: {}", s),
        }
    }
}

impl Error for RxError {}

/// Simple type definition for the return type of the receive pipeline.
pub type RxResult = Result<(), RxError>;

/// Error returned upon invalid usage or state of the stack.
#[derive(Debug)]
pub enum StackError {
    IllegalArgument,
    NoRouteToHost,
    InvalidInterface,
    /// The given name does not denote a registered protocol.
    UnknownProtocol(&'static str),
    /// A packet without a destination MAC reached the ethernet layer and
    /// no resolver is installed to look one up.
    NoMacResolver,
    /// A protocol required an option the caller did not supply.
    MissingTxOption(&'static str),
    /// A MAC resolution did not complete within the configured timeout.
    ResolveTimeout,
    TxError(TxError),
}

impl From<TxError> for StackError {
    fn from(e: TxError) -> StackError {
        StackError::TxError(e)
    }
}

impl From<StackError> for io::Error {
    fn from(e: StackError) -> io::Error {
        let other = |msg: String| io::Error::new(io::ErrorKind::Other, msg);
        match e {
            StackError::IllegalArgument => other("Illegal argument".to_owned()),
            StackError::NoRouteToHost => other("No route to host".to_owned()),
            StackError::InvalidInterface => other("Invalid interface".to_owned()),
            StackError::UnknownProtocol(name) => other(format!("Unknown protocol: {}", name)),
            StackError::NoMacResolver => other("No MAC resolver installed".to_owned()),
            StackError::MissingTxOption(name) => other(format!("Missing tx option: {}", name)),
            StackError::ResolveTimeout => other("MAC resolution timed out".to_owned()),
            StackError::TxError(txe) => txe.into(),
        }
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StackError::IllegalArgument => fmt.write_str("Illegal argument"),
            StackError::NoRouteToHost => fmt.write_str("No route to host"),
            StackError::InvalidInterface => fmt.write_str("Invalid interface"),
            StackError::UnknownProtocol(name) => write!(fmt, "Unknown protocol: {}", name),
            StackError::NoMacResolver => fmt.write_str("No MAC resolver installed"),
            StackError::MissingTxOption(name) => write!(fmt, "Missing tx option: {}", name),
            StackError::ResolveTimeout => fmt.write_str("MAC resolution timed out"),
            StackError::TxError(ref e) => write!(fmt, "Tx error: {}", e),
        }
    }
}

impl Error for StackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        if let StackError::TxError(ref e) = *self {
            Some(e)
        } else {
            None
        }
    }
}

pub type StackResult<T> = Result<T, StackError>;

/// Error returned by `UdpSocket` operations and the port bookkeeping
/// backing them.
#[derive(Debug)]
pub enum SocketError {
    /// The socket has been closed; no further operations are possible.
    Closed,
    /// `send` requires a prior `connect`.
    NotConnected,
    /// `recv`/`recv_from` require a prior `bind`.
    NotBound,
    /// The requested port is already bound, either exactly or by an
    /// overlapping wildcard binding. Typed so automatic port selection can
    /// catch it and probe another port.
    PortAlreadyOpened,
    /// The port is not open. Never opened, or closed while waiting on it.
    PortNotOpen,
    /// Automatic port selection gave up after the configured number of
    /// probes.
    NoFreePort,
    Stack(StackError),
}

impl From<StackError> for SocketError {
    fn from(e: StackError) -> SocketError {
        SocketError::Stack(e)
    }
}

impl From<SocketError> for io::Error {
    fn from(e: SocketError) -> io::Error {
        match e {
            SocketError::Closed => io::Error::new(io::ErrorKind::NotConnected, "Socket is closed"),
            SocketError::NotConnected => {
                io::Error::new(io::ErrorKind::NotConnected, "Socket is not connected")
            }
            SocketError::NotBound => {
                io::Error::new(io::ErrorKind::NotConnected, "Socket is not bound")
            }
            SocketError::PortAlreadyOpened => {
                io::Error::new(io::ErrorKind::AddrInUse, "Port is already open")
            }
            SocketError::PortNotOpen => {
                io::Error::new(io::ErrorKind::NotConnected, "Port is not open")
            }
            SocketError::NoFreePort => io::Error::new(io::ErrorKind::AddrInUse, "No free port"),
            SocketError::Stack(e2) => e2.into(),
        }
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use SocketError::*;
        match *self {
            Closed => fmt.write_str("Socket is closed"),
            NotConnected => fmt.write_str("Socket is not connected"),
            NotBound => fmt.write_str("Socket is not bound"),
            PortAlreadyOpened => fmt.write_str("Port is already open"),
            PortNotOpen => fmt.write_str("Port is not open"),
            NoFreePort => fmt.write_str("No free port found"),
            Stack(ref e) => write!(fmt, "Stack error: {}", e),
        }
    }
}

impl Error for SocketError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        if let SocketError::Stack(ref e) = *self {
            Some(e)
        } else {
            None
        }
    }
}

pub type SocketResult<T> = Result<T, SocketError>;
