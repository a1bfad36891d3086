use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Validation failures for user-supplied payloads, reported synchronously
/// as bad requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("URL is required")]
    MissingUrl,

    #[error("URL must start with http:// or https://")]
    InvalidUrlScheme,

    #[error("URL is not well-formed: {0}")]
    MalformedUrl(String),

    #[error("email is required")]
    MissingEmail,

    #[error("email is not well-formed")]
    InvalidEmail,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("{field} is required")]
    MissingField { field: &'static str },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScanRequest {
    pub url: String,
}

impl CreateScanRequest {
    /// Accepts exactly the `http(s)://...` form; anything else is a
    /// synchronous bad request, never an enqueued scan.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::MissingUrl);
        }
        let parsed =
            Url::parse(&self.url).map_err(|e| ValidationError::MalformedUrl(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            _ => Err(ValidationError::InvalidUrlScheme),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

pub const MIN_PASSWORD_LEN: usize = 6;

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingEmail);
        }
        // Lightweight shape check; deliverability is not our problem.
        let (local, domain) = self
            .email
            .split_once('@')
            .ok_or(ValidationError::InvalidEmail)?;
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(ValidationError::InvalidEmail);
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        if self.first_name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "firstName",
            });
        }
        if self.last_name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "lastName" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Offset pagination for owner-scoped listings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

pub const MAX_PAGE_SIZE: u32 = 100;

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: 20,
        }
    }
}

impl PageRequest {
    pub fn clamped(self) -> Self {
        Self {
            page: self.page,
            per_page: self.per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOf<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_request(url: &str) -> CreateScanRequest {
        CreateScanRequest {
            url: url.to_string(),
        }
    }

    #[test]
    fn accepts_http_and_https_urls() {
        assert!(scan_request("http://example.com").validate().is_ok());
        assert!(scan_request("https://example.com/path?q=1").validate().is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert_eq!(
            scan_request("ftp://example.com").validate(),
            Err(ValidationError::InvalidUrlScheme)
        );
        assert_eq!(scan_request("").validate(), Err(ValidationError::MissingUrl));
        assert!(matches!(
            scan_request("not a url").validate(),
            Err(ValidationError::MalformedUrl(_))
        ));
    }

    #[test]
    fn register_validation() {
        let ok = RegisterRequest {
            email: "a@example.com".into(),
            password: "secret1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        };
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.email = "nope".into();
        assert_eq!(bad.validate(), Err(ValidationError::InvalidEmail));

        let mut short = ok.clone();
        short.password = "abc".into();
        assert_eq!(
            short.validate(),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );

        let mut blank = ok;
        blank.first_name = "  ".into();
        assert_eq!(
            blank.validate(),
            Err(ValidationError::MissingField { field: "firstName" })
        );
    }

    #[test]
    fn page_request_clamps_and_offsets() {
        let page = PageRequest {
            page: 3,
            per_page: 500,
        }
        .clamped();
        assert_eq!(page.per_page, MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 300);

        let zero = PageRequest {
            page: 0,
            per_page: 0,
        }
        .clamped();
        assert_eq!(zero.per_page, 1);
    }
}
