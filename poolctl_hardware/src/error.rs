use poolctl_traits::{PortError, SensorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("hardware timeout")]
    Timeout,
    #[error("device {0} not present")]
    NotFound(String),
    #[error("w1 crc check failed: {0}")]
    Crc(String),
    #[error("malformed sensor data: {0}")]
    Parse(String),
    #[error("relay port {0} is not mapped to a gpio pin")]
    UnmappedPort(u8),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;

impl From<HwError> for PortError {
    fn from(e: HwError) -> Self {
        match e {
            HwError::Timeout => Self::Timeout,
            HwError::UnmappedPort(ch) => Self::UnknownChannel(ch),
            other => Self::Unreachable(other.to_string()),
        }
    }
}

impl From<HwError> for SensorError {
    fn from(e: HwError) -> Self {
        match e {
            HwError::Timeout => Self::Timeout,
            HwError::NotFound(dev) => Self::NotFound(dev),
            HwError::Crc(msg) | HwError::Parse(msg) => Self::Invalid(msg),
            other => Self::Io(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_typed_timeouts() {
        assert_eq!(PortError::from(HwError::Timeout), PortError::Timeout);
        assert_eq!(SensorError::from(HwError::Timeout), SensorError::Timeout);
    }

    #[test]
    fn gpio_failure_is_unreachable() {
        let e = PortError::from(HwError::Gpio("permission denied".into()));
        assert!(matches!(e, PortError::Unreachable(msg) if msg.contains("permission denied")));
    }

    #[test]
    fn crc_failure_is_invalid_data() {
        let e = SensorError::from(HwError::Crc("28-1".into()));
        assert_eq!(e, SensorError::Invalid("28-1".into()));
    }
}
