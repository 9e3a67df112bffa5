#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    UnexpectedEof,
    InvalidValue(&'static str),
    LengthOverflow,
    TrailingBytes,
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::UnexpectedEof => write!(f, "unexpected end of input"),
            StateError::InvalidValue(what) => write!(f, "invalid value: {}", what),
            StateError::LengthOverflow => write!(f, "length field overflow"),
            StateError::TrailingBytes => write!(f, "trailing bytes after record"),
        }
    }
}

impl std::error::Error for StateError {}
