use serde_json::Value;

pub const INVALID_READING: &str = "Missing or invalid device_id or temperature.";
pub const MISSING_DEVICE_PARAM: &str = "Missing device ID query parameter.";

/// Caller-facing reason a request was refused
pub type Rejection = &'static str;

/// Fields of a save request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub device_id: String,
    pub temperature: f64,
}

/// Validates the JSON body of a save request.
///
/// `device_id` must be a string that is non-empty once trimmed; the trimmed
/// value is what gets stored. `temperature` must be a JSON number; strings
/// such as `"26.5"`, booleans and null are rejected.
pub fn validate_save(body: &Value) -> Result<SaveRequest, Rejection> {
    let device_id = body
        .get("device_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(INVALID_READING)?;

    let temperature = body
        .get("temperature")
        .filter(|t| t.is_number())
        .and_then(Value::as_f64)
        .ok_or(INVALID_READING)?;

    Ok(SaveRequest {
        device_id: device_id.to_string(),
        temperature,
    })
}

/// Validates the `device` query parameter of a latest-query.
pub fn validate_device_param(device: Option<&str>) -> Result<&str, Rejection> {
    device
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(MISSING_DEVICE_PARAM)
}
