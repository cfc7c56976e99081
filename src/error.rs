//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (transport contract, ring
//! buffer, hardware driver return codes, virtual-bus datagrams, ASCII adapter
//! lines).
use thiserror_no_std::Error;

//==================================================================================SHIM_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors surfaced by the transport contract to the calling protocol layer.
pub enum ShimError {
    /// Port index outside `0..MAX_PORTS` or not served by the backend.
    #[error("Invalid port")]
    InvalidPort,
    /// Ring or handle-pool backing storage could not be reserved.
    #[error("Allocation failure")]
    AllocationFailure,
    /// Every handle of the pool is in flight.
    #[error("No message handle available")]
    HandleNotAvailable,
    /// Handle out of range, never allocated, or already released.
    #[error("Invalid message handle")]
    InvalidHandle,
    /// Hardware or backend initialisation failed.
    #[error("Port initialisation error")]
    PortInitError,
    /// Transient condition, retry later.
    #[error("Driver busy")]
    DriverBusy,
    /// Frame could not be queued nor sent.
    #[error("Message not handled")]
    MessageNotHandled,
}

//==================================================================================RING_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Sentinels returned by the frame ring instead of blocking.
pub enum RingError {
    /// Insert attempted while `count == capacity`.
    #[error("Ring buffer full")]
    Full,
    /// Extract attempted while `count == 0`.
    #[error("Ring buffer empty")]
    Empty,
}

//==================================================================================DRIVER_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Return codes of the low-level hardware controller driver.
pub enum DriverError {
    #[error("Driver failure")]
    Failure,
    #[error("Operation not implemented by the driver")]
    Unimplemented,
    #[error("Unsupported bit rate")]
    BadBitRate,
    #[error("Invalid acceptance filter")]
    BadFilter,
    #[error("Controller initialisation failed")]
    InitFail,
    #[error("Controller refused to sleep")]
    SleepFail,
    #[error("Unknown channel")]
    BadChannel,
    /// No transmit slot free.
    #[error("Transmit slots busy")]
    TxBusy,
    /// Receive FIFO empty.
    #[error("No data")]
    NoData,
}

impl From<DriverError> for ShimError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::TxBusy => ShimError::DriverBusy,
            DriverError::NoData => ShimError::MessageNotHandled,
            DriverError::BadChannel => ShimError::InvalidPort,
            DriverError::Failure
            | DriverError::Unimplemented
            | DriverError::BadBitRate
            | DriverError::BadFilter
            | DriverError::InitFail
            | DriverError::SleepFail => ShimError::PortInitError,
        }
    }
}

//==================================================================================DATAGRAM_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Rejections of a 16-byte virtual-bus record.
pub enum DatagramError {
    /// Record is not exactly 16 bytes.
    #[error("Wrong datagram length: {len}")]
    WrongLength { len: usize },
    /// Additive checksum does not match the 14 frame bytes.
    #[error("Checksum mismatch: expected {expected:#06X}, found {found:#06X}")]
    BadChecksum { expected: u16, found: u16 },
    /// Embedded data length code above 8.
    #[error("Invalid data length code: {dlc}")]
    BadLength { dlc: u8 },
}

//==================================================================================ASCII_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures while decoding a line emitted by an ASCII serial adapter.
pub enum AsciiParseError {
    /// Line shorter than the minimal frame record.
    #[error("Line too short: {len}")]
    TooShort { len: usize },
    /// Character outside `[0-9A-Fa-f]`.
    #[error("Illegal hex digit: {0:#04X}")]
    IllegalHexDigit(u8),
    /// Length digit outside `'0'..='8'` or payload shorter than announced.
    #[error("Bad data length")]
    BadLength,
    /// Line starts with an unknown command letter.
    #[error("Unknown command: {0:#04X}")]
    UnknownCommand(u8),
}
