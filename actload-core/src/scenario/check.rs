use crate::context::EndpointKind;

pub const CHECK_STATUS_200: &str = "status is 200";
pub const CHECK_VALID_JSON: &str = "response is valid JSON";
pub const CHECK_HAS_SUCCESS: &str = "has success field";

/// Outcome of one response against the fixed check set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckResult {
    pub status_is_200: bool,
    pub valid_json: bool,
    pub has_success_field: bool,
}

impl CheckResult {
    /// Runs every check against a received response.
    ///
    /// `has_success_field` only looks for the key; `"success": false` still passes.
    pub fn evaluate(status: u16, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<serde_json::Value>(body).ok();
        let has_success_field = parsed
            .as_ref()
            .and_then(serde_json::Value::as_object)
            .is_some_and(|obj| obj.contains_key("success"));

        Self {
            status_is_200: status == 200,
            valid_json: parsed.is_some(),
            has_success_field,
        }
    }

    /// No response arrived, so every check fails.
    pub fn no_response() -> Self {
        Self::default()
    }

    pub fn passed(&self) -> bool {
        self.status_is_200 && self.valid_json && self.has_success_field
    }

    /// Check names as reported, prefixed with the endpoint (`parse: status is 200`).
    pub fn named(&self, kind: EndpointKind) -> impl Iterator<Item = (String, bool)> + use<> {
        [
            (CHECK_STATUS_200, self.status_is_200),
            (CHECK_VALID_JSON, self.valid_json),
            (CHECK_HAS_SUCCESS, self.has_success_field),
        ]
        .into_iter()
        .map(move |(name, ok)| (format!("{kind}: {name}"), ok))
    }
}
