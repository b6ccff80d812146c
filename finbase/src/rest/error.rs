use std::sync::LazyLock;

use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use valuable::Valuable;

#[derive(thiserror::Error, Debug, Serialize, Valuable, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Error {
    #[error("{entity} with {} = {} already exists", field.clone().unwrap_or_default(), value.clone().unwrap_or_default())]
    DuplicateRecord {
        entity: String,
        field: Option<String>,
        value: Option<String>,
    },
    #[error("unable to create reference between {entity} and {referenced_entity} with value {} not found", value.clone().unwrap_or_default())]
    ReferenceNotFound {
        entity: String,
        referenced_entity: String,
        value: Option<String>,
    },
    #[error("{entity} {} is still referenced from {referencing_entity}", value.clone().unwrap_or_default())]
    StillReferenced {
        entity: String,
        referencing_entity: String,
        value: Option<String>,
    },
    #[error("record not found")]
    RecordNotFound,
    #[error("session expired")]
    JwtExpired,
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },
    #[error("database function {function} does not exist")]
    FunctionNotFound { function: String },
    #[error("invalid data: {message}")]
    InvalidData { message: String },
    #[error("{message}")]
    Other { message: String },
}

/// The JSON body the REST layer returns with a failed request.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

static KEY_DETAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Key \((.+)\)=\((.+)\)").ok());

impl Error {
    pub(crate) fn from_other_error(err: impl std::error::Error) -> Self {
        Self::Other {
            message: format!("{err}"),
        }
    }

    /// Classifies a failed response. `entity` is the table or function the request targeted.
    #[must_use]
    pub fn from_response(status: StatusCode, body: &str, entity: &str) -> Self {
        let ErrorBody {
            code,
            message,
            details,
            hint,
        } = serde_json::from_str(body).unwrap_or_default();

        let code = code.unwrap_or_default();
        let message = message.unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });
        let details = details.unwrap_or_default();

        let (field, value) = KEY_DETAIL
            .as_ref()
            .and_then(|re| re.captures(&details))
            .map_or((None, None), |cap| {
                (
                    cap.get(1).map(|m| m.as_str().to_string()),
                    cap.get(2).map(|m| m.as_str().to_string()),
                )
            });

        match code.as_str() {
            "23505" => Self::DuplicateRecord {
                entity: entity.to_string(),
                field,
                value,
            },
            "23503" => {
                let other_entity = details
                    .split_whitespace()
                    .last()
                    .unwrap_or_default()
                    .replace('"', "");
                let other_entity = other_entity.trim_end_matches('.').to_string();

                // Deleting a row that others point at, rather than pointing at a missing row.
                if details.contains("is still referenced") {
                    return Self::StillReferenced {
                        entity: entity.to_string(),
                        referencing_entity: other_entity,
                        value,
                    };
                }

                Self::ReferenceNotFound {
                    entity: entity.to_string(),
                    referenced_entity: other_entity,
                    value,
                }
            }
            "PGRST116" | "P0002" => Self::RecordNotFound,
            "PGRST202" => Self::FunctionNotFound {
                function: entity.to_string(),
            },
            "PGRST303" => Self::JwtExpired,
            _ if message.contains("JWT expired") => Self::JwtExpired,
            "42501" => Self::PermissionDenied { message },
            _ if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Self::PermissionDenied { message }
            }
            _ => {
                let message = match hint {
                    Some(hint) => format!("{message} ({hint})"),
                    None => message,
                };
                Self::Other { message }
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::from_other_error(err)
    }
}

impl From<garde::Report> for Error {
    fn from(report: garde::Report) -> Self {
        Self::InvalidData {
            message: report.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::from_other_error(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn classify(status: StatusCode, body: serde_json::Value, entity: &str) -> Error {
        Error::from_response(status, &body.to_string(), entity)
    }

    #[test]
    fn duplicate_key_names_field_and_value() {
        let err = classify(
            StatusCode::CONFLICT,
            json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"fish_fish_code_key\"",
                "details": "Key (fish_code)=(CA-001) already exists.",
                "hint": null
            }),
            "fish",
        );

        assert_eq!(
            err,
            Error::DuplicateRecord {
                entity: "fish".to_string(),
                field: Some("fish_code".to_string()),
                value: Some("CA-001".to_string()),
            }
        );
        assert_eq!(err.to_string(), "fish with fish_code = CA-001 already exists");
    }

    #[test]
    fn missing_reference_names_referenced_table() {
        let err = classify(
            StatusCode::CONFLICT,
            json!({
                "code": "23503",
                "message": "insert or update on table \"fish_transgenes\" violates foreign key constraint",
                "details": "Key (transgene_id)=(99) is not present in table \"transgenes\".",
            }),
            "fish_transgenes",
        );

        assert_eq!(
            err,
            Error::ReferenceNotFound {
                entity: "fish_transgenes".to_string(),
                referenced_entity: "transgenes".to_string(),
                value: Some("99".to_string()),
            }
        );
    }

    #[test]
    fn delete_of_referenced_row_names_referencing_table() {
        let err = classify(
            StatusCode::CONFLICT,
            json!({
                "code": "23503",
                "message": "update or delete on table \"fish\" violates foreign key constraint \"fish_mother_fish_id_fkey\" on table \"fish\"",
                "details": "Key (id)=(5) is still referenced from table \"fish\".",
            }),
            "delete_fish_with_links",
        );

        assert_eq!(
            err,
            Error::StillReferenced {
                entity: "delete_fish_with_links".to_string(),
                referencing_entity: "fish".to_string(),
                value: Some("5".to_string()),
            }
        );
    }

    #[rstest]
    #[case(StatusCode::NOT_FOUND, json!({"code": "P0002", "message": "fish 5 not found"}), Error::RecordNotFound)]
    #[case(StatusCode::NOT_ACCEPTABLE, json!({"code": "PGRST116", "message": "JSON object requested, multiple (or no) rows returned"}), Error::RecordNotFound)]
    #[case(StatusCode::UNAUTHORIZED, json!({"code": "PGRST303", "message": "JWT expired"}), Error::JwtExpired)]
    #[case(StatusCode::UNAUTHORIZED, json!({"code": "PGRST301", "message": "JWT expired"}), Error::JwtExpired)]
    #[case(StatusCode::FORBIDDEN, json!({"code": "42501", "message": "permission denied for table fish"}), Error::PermissionDenied { message: "permission denied for table fish".to_string() })]
    #[case(StatusCode::UNAUTHORIZED, json!({"message": "Invalid API key"}), Error::PermissionDenied { message: "Invalid API key".to_string() })]
    #[case(StatusCode::NOT_FOUND, json!({"code": "PGRST202", "message": "Could not find the function"}), Error::FunctionNotFound { function: "fish".to_string() })]
    fn classifies_error_codes(
        #[case] status: StatusCode,
        #[case] body: serde_json::Value,
        #[case] expected: Error,
    ) {
        assert_eq!(classify(status, body, "fish"), expected);
    }

    #[test]
    fn unparseable_body_becomes_other() {
        let err = Error::from_response(StatusCode::BAD_GATEWAY, "upstream down", "fish");
        assert_eq!(
            err,
            Error::Other {
                message: "upstream down".to_string()
            }
        );
    }
}
