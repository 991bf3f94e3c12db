//! Standard API response types

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{"data": ...}` wrapper for collections
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for DataResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// 201 with the created resource as body
pub struct Created<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// Binary download with a `Content-Disposition: attachment` header
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Attachment {
    fn disposition(&self) -> HeaderValue {
        // Quotes and control characters cannot appear in a quoted-string
        let safe: String = self
            .filename
            .chars()
            .map(|c| if c == '"' || c == '\\' || c.is_control() || !c.is_ascii() { '_' } else { c })
            .collect();
        HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
    }
}

impl IntoResponse for Attachment {
    fn into_response(self) -> Response {
        let disposition = self.disposition();
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(self.content_type)),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.bytes,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_sets_download_headers() {
        let response = Attachment {
            filename: "Harbour_Works_TenderDocuments_2026-10-18.zip".into(),
            content_type: "application/zip",
            bytes: vec![1, 2, 3],
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Harbour_Works_TenderDocuments_2026-10-18.zip\""
        );
    }

    #[test]
    fn attachment_name_is_header_safe() {
        let attachment = Attachment {
            filename: "Bridge \"Phase\" é.zip".into(),
            content_type: "application/zip",
            bytes: vec![],
        };
        assert_eq!(
            attachment.disposition(),
            "attachment; filename=\"Bridge _Phase_ _.zip\""
        );
    }
}
