//! Status-code expectation table

/// Status assertion emitted after `.expect_status()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusExpectation {
    pub method: &'static str,
    /// Literal code passed to the fallback assertion
    pub code: Option<u16>,
}

impl StatusExpectation {
    /// The call text, e.g. `is_ok()` or `is_equal_to(418)`
    pub fn call(&self) -> String {
        match self.code {
            Some(code) => format!("{}({code})", self.method),
            None => format!("{}()", self.method),
        }
    }
}

pub fn status_expectation(code: u16) -> StatusExpectation {
    let named = match code {
        200 => Some("is_ok"),
        201 => Some("is_created"),
        204 => Some("is_no_content"),
        400 => Some("is_bad_request"),
        401 => Some("is_unauthorized"),
        403 => Some("is_forbidden"),
        404 => Some("is_not_found"),
        500 => Some("is_5xx_server_error"),
        _ => None,
    };
    match named {
        Some(method) => StatusExpectation { method, code: None },
        None => StatusExpectation {
            method: "is_equal_to",
            code: Some(code),
        },
    }
}
