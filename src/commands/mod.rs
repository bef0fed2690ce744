mod extract;
mod transfer;
mod transform;

use std::io::Read;
use std::path::Path;

use etl_lib::EtlError;
use serde::de::DeserializeOwned;

pub use extract::run_extract;
pub use transfer::run_transfer;
pub use transform::run_transform;

/// Read one JSON request from a file, or stdin when `input` is `-`.
pub fn read_request<T: DeserializeOwned>(input: &Path) -> Result<T, EtlError> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input).map_err(|e| {
            EtlError::validation(format!("cannot read request {}: {}", input.display(), e))
        })?
    };
    parse_request(&raw)
}

/// Well-formed JSON with the wrong shape is a validation failure.
pub fn parse_request<T: DeserializeOwned>(raw: &str) -> Result<T, EtlError> {
    serde_json::from_str(raw).map_err(|e| {
        if e.is_data() {
            EtlError::validation(e.to_string())
        } else {
            EtlError::Serialization(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_lib::{TransferRequest, TransformRequest};

    #[test]
    fn wrong_shape_is_validation_error() {
        let err = parse_request::<TransferRequest>(r#"{"data": 1}"#).unwrap_err();
        assert!(matches!(err, EtlError::Validation(_)));
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = parse_request::<TransformRequest>("{not json").unwrap_err();
        assert!(matches!(err, EtlError::Serialization(_)));
    }

    #[test]
    fn missing_file_is_validation_error() {
        let err = read_request::<TransformRequest>(Path::new("/no/such/request.json")).unwrap_err();
        assert!(matches!(err, EtlError::Validation(_)));
    }
}
