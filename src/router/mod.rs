//! API Router
//!
//! Parses the request method and path into a [`Route`].
//!
//! | Method | Path | Route |
//! |--------|------|-------|
//! | GET | `/health` | [`Route::Health`] |
//! | GET | `/assets/{key}` | [`Route::Asset`] |
//! | POST | `/videos/{videoID}/thumbnail` | [`Route::Upload`] (thumbnail) |
//! | POST | `/videos/{videoID}/video` | [`Route::Upload`] (video) |

use hyper::Method;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use uuid::Uuid;

use crate::media::UploadKind;

/// Router errors
#[derive(Error, Debug, PartialEq)]
pub enum RouterError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Invalid video ID: {0}")]
    InvalidVideoId(String),
}

/// A resolved route
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// GET /health
    Health,
    /// GET /assets/{key}
    Asset { key: String },
    /// POST /videos/{videoID}/thumbnail or /videos/{videoID}/video
    Upload { kind: UploadKind, video_id: Uuid },
}

impl Route {
    /// Parse a request into a route
    pub fn parse(method: &Method, path: &str) -> Result<Route, RouterError> {
        if path == "/health" {
            return Self::expect_method(method, Method::GET, path).map(|_| Route::Health);
        }

        if let Some(key) = path.strip_prefix("/assets/") {
            Self::expect_method(method, Method::GET, path)?;
            let key = percent_decode_str(key)
                .decode_utf8()
                .map_err(|_| RouterError::NotFound(path.to_string()))?;
            if key.is_empty() {
                return Err(RouterError::NotFound(path.to_string()));
            }
            return Ok(Route::Asset {
                key: key.into_owned(),
            });
        }

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["videos", id, action @ ("thumbnail" | "video")] => {
                Self::expect_method(method, Method::POST, path)?;
                let video_id = Uuid::parse_str(id)
                    .map_err(|_| RouterError::InvalidVideoId((*id).to_string()))?;
                let kind = match *action {
                    "thumbnail" => UploadKind::Thumbnail,
                    _ => UploadKind::Video,
                };
                Ok(Route::Upload { kind, video_id })
            }
            _ => Err(RouterError::NotFound(path.to_string())),
        }
    }

    fn expect_method(method: &Method, expected: Method, path: &str) -> Result<(), RouterError> {
        if *method == expected {
            Ok(())
        } else {
            Err(RouterError::MethodNotAllowed(format!("{} {}", method, path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uploads() {
        let id = Uuid::new_v4();

        let route = Route::parse(&Method::POST, &format!("/videos/{}/thumbnail", id)).unwrap();
        assert_eq!(
            route,
            Route::Upload {
                kind: UploadKind::Thumbnail,
                video_id: id
            }
        );

        let route = Route::parse(&Method::POST, &format!("/videos/{}/video", id)).unwrap();
        assert_eq!(
            route,
            Route::Upload {
                kind: UploadKind::Video,
                video_id: id
            }
        );
    }

    #[test]
    fn test_parse_invalid_video_id() {
        assert_eq!(
            Route::parse(&Method::POST, "/videos/not-a-uuid/video"),
            Err(RouterError::InvalidVideoId("not-a-uuid".into()))
        );
    }

    #[test]
    fn test_parse_wrong_method() {
        let id = Uuid::new_v4();
        assert!(matches!(
            Route::parse(&Method::GET, &format!("/videos/{}/video", id)),
            Err(RouterError::MethodNotAllowed(_))
        ));
        assert!(matches!(
            Route::parse(&Method::POST, "/health"),
            Err(RouterError::MethodNotAllowed(_))
        ));
    }

    #[test]
    fn test_parse_assets() {
        assert_eq!(
            Route::parse(&Method::GET, "/assets/abc.png").unwrap(),
            Route::Asset {
                key: "abc.png".into()
            }
        );
        assert_eq!(
            Route::parse(&Method::GET, "/assets/a%2Db.png").unwrap(),
            Route::Asset {
                key: "a-b.png".into()
            }
        );
        assert!(matches!(
            Route::parse(&Method::GET, "/assets/"),
            Err(RouterError::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Route::parse(&Method::GET, "/health").unwrap(), Route::Health);
        assert!(matches!(
            Route::parse(&Method::POST, "/videos"),
            Err(RouterError::NotFound(_))
        ));
        assert!(matches!(
            Route::parse(&Method::POST, "/videos/x/thumbnail/extra"),
            Err(RouterError::NotFound(_))
        ));
    }
}
