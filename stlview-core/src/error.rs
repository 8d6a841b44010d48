/// Error types for STL decoding and viewer lifecycle
use thiserror::Error;

/// Failure to decode STL data
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StlError {
    #[error("file too small to be a valid STL ({0} bytes)")]
    TooSmall(usize),

    #[error("binary STL truncated: header declares {declared} triangles, data holds {available}")]
    Truncated { declared: usize, available: usize },

    #[error("malformed ASCII STL near line {line}")]
    Ascii { line: usize },

    #[error("ASCII STL is not valid UTF-8")]
    Encoding,
}

/// Failure to fetch or decode a mesh for the viewer
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} while fetching {url}")]
    Http { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid STL data: {0}")]
    Parse(#[from] StlError),

    #[error("mesh contains no triangles")]
    EmptyGeometry,
}

/// Misuse of the viewer API by its host
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    #[error("mount region must have a non-zero size, got {width}x{height}")]
    InvalidMountRegion { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_converts() {
        let err: LoadError = StlError::Ascii { line: 7 }.into();
        assert_eq!(err.to_string(), "invalid STL data: malformed ASCII STL near line 7");
    }
}
