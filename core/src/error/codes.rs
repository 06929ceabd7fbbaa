/// Stable error codes surfaced in HTTP error bodies and in the structured
/// `error` field of a failed `ActionResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    GeneralError = 1,
    ValidationError = 3,
    NotFound = 10,
    UnsupportedType = 11,
    MissingParameter = 12,
    IncompatiblePayload = 13,
    ConnectorError = 20,
    Timeout = 30,
    Crash = 31,
    ProtocolError = 32,
    SpawnError = 33,
    QueueClosed = 34,
    SchemaUnresolved = 40,
    BatchSendError = 41,
    SourceError = 42,
    ParseError = 43,
    ConfigError = 50,
    Unauthorized = 60,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::GeneralError => "GENERAL_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::UnsupportedType => "UNSUPPORTED_TYPE",
            Self::MissingParameter => "MISSING_PARAMETER",
            Self::IncompatiblePayload => "INCOMPATIBLE_PAYLOAD",
            Self::ConnectorError => "CONNECTOR_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Crash => "CRASH",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::SpawnError => "SPAWN_ERROR",
            Self::QueueClosed => "QUEUE_CLOSED",
            Self::SchemaUnresolved => "SCHEMA_UNRESOLVED",
            Self::BatchSendError => "BATCH_SEND_ERROR",
            Self::SourceError => "SOURCE_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
