use anyhow::anyhow;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
};
use casedesk_core::AppError;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

/// Joins field errors as `field: message`, sorted for stable output.
pub fn format_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|msg| format!("{}: {}", field, msg))
                    .unwrap_or_else(|| format!("{} no es válido", field))
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

/// JSON body extractor that runs `validator` rules after deserializing.
///
/// Malformed bodies are rejected with 400, rule violations with 422.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;

        value.validate().map_err(|errors| {
            AppError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                anyhow!("{}", format_errors(&errors)),
            )
        })?;

        Ok(ValidatedJson(value))
    }
}

/// Maps a JSON extraction failure to a 400 with a readable message.
pub fn json_rejection(rejection: JsonRejection) -> AppError {
    if matches!(rejection, JsonRejection::MissingJsonContentType(_)) {
        return AppError::bad_request(anyhow!(
            "Falta la cabecera 'Content-Type: application/json'"
        ));
    }

    let error_msg = rejection.body_text();

    if error_msg.contains("missing field") {
        let field = error_msg
            .split("missing field `")
            .nth(1)
            .and_then(|s| s.split('`').next())
            .unwrap_or("desconocido");
        return AppError::bad_request(anyhow!("El campo {} es obligatorio", field));
    }

    if error_msg.contains("unknown variant") || error_msg.contains("invalid type") {
        return AppError::bad_request(anyhow!("Tipo de dato inválido en la solicitud"));
    }

    AppError::bad_request(anyhow!("Cuerpo de la solicitud inválido"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 3, message = "Debe tener al menos 3 caracteres"))]
        name: String,
    }

    fn request(body: &'static str, content_type: Option<&str>) -> Request {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_valid_payload() {
        let ValidatedJson(payload) = ValidatedJson::<Payload>::from_request(
            request(r#"{"name":"Agente"}"#, Some("application/json")),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(payload.name, "Agente");
    }

    #[tokio::test]
    async fn test_rule_violation_is_422() {
        let err = ValidatedJson::<Payload>::from_request(
            request(r#"{"name":"ab"}"#, Some("application/json")),
            &(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.public_message(), "name: Debe tener al menos 3 caracteres");
    }

    #[tokio::test]
    async fn test_missing_field_is_400() {
        let err = ValidatedJson::<Payload>::from_request(request("{}", Some("application/json")), &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "El campo name es obligatorio");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_400() {
        let err = ValidatedJson::<Payload>::from_request(request(r#"{"name":"Agente"}"#, None), &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
