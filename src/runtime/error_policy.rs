//! # Error Policy
//!
//! Classification and logging of watch stream errors.
//!
//! The watch streams retry on their own with exponential backoff; this module only
//! decides how loudly each failure is reported so that RBAC problems stand out from
//! the routine resource-version expiries seen around API server restarts.

use tracing::{error, warn};

/// Coarse class of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// 401: token expired or revoked
    Unauthorized,
    /// 403: the service account may not list or watch the resource
    Forbidden,
    /// 410: resource version too old, the watcher relists
    Expired,
    /// 429: API server throttling or storage reinitializing
    Throttled,
    /// 404: resource type not served by the API server
    NotFound,
    Other,
}

impl WatchErrorClass {
    /// Classify from the rendered error
    #[must_use]
    pub fn classify(error: &str) -> Self {
        let has = |needles: &[&str]| needles.iter().any(|n| error.contains(n));

        if has(&["410", "too old resource version", "Expired", "Gone"]) {
            WatchErrorClass::Expired
        } else if has(&["429", "TooManyRequests", "storage is (re)initializing"]) {
            WatchErrorClass::Throttled
        } else if has(&["403", "Forbidden", "forbidden"]) {
            WatchErrorClass::Forbidden
        } else if has(&["401", "Unauthorized"]) {
            WatchErrorClass::Unauthorized
        } else if has(&["404", "NotFound", "not found"]) {
            WatchErrorClass::NotFound
        } else {
            WatchErrorClass::Other
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchErrorClass::Unauthorized => "unauthorized",
            WatchErrorClass::Forbidden => "forbidden",
            WatchErrorClass::Expired => "expired",
            WatchErrorClass::Throttled => "throttled",
            WatchErrorClass::NotFound => "not-found",
            WatchErrorClass::Other => "other",
        }
    }
}

/// Log one watch stream error for `kind`
pub fn handle_watch_stream_error(kind: &str, err: &kube_runtime::watcher::Error) -> WatchErrorClass {
    let rendered = format!("{err:?}");
    let class = WatchErrorClass::classify(&rendered);

    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        resource.kind = kind,
        error_type = class.as_str()
    );
    let _error_guard = error_span.enter();

    match class {
        WatchErrorClass::Unauthorized | WatchErrorClass::Forbidden => {
            error!(
                error = %err,
                "{} watch rejected by the API server, check the controller's ClusterRole grants list/watch on {}",
                kind,
                kind
            );
        }
        WatchErrorClass::NotFound => {
            error!(error = %err, "{} resource is not served by the API server", kind);
        }
        WatchErrorClass::Expired => {
            warn!("{} watch resource version expired, relisting", kind);
        }
        WatchErrorClass::Throttled => {
            warn!(error = %err, "{} watch throttled by the API server, backing off", kind);
        }
        WatchErrorClass::Other => {
            warn!(error = %err, "{} watch stream error, retrying with backoff", kind);
        }
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            WatchErrorClass::classify("ErrorResponse { code: 410, reason: \"Expired\" }"),
            WatchErrorClass::Expired
        );
        assert_eq!(
            WatchErrorClass::classify("ErrorResponse { code: 403, reason: \"Forbidden\" }"),
            WatchErrorClass::Forbidden
        );
        assert_eq!(
            WatchErrorClass::classify("ErrorResponse { code: 401, reason: \"Unauthorized\" }"),
            WatchErrorClass::Unauthorized
        );
        assert_eq!(
            WatchErrorClass::classify("code: 429, TooManyRequests"),
            WatchErrorClass::Throttled
        );
        assert_eq!(
            WatchErrorClass::classify("ErrorResponse { code: 404, reason: \"NotFound\" }"),
            WatchErrorClass::NotFound
        );
        assert_eq!(
            WatchErrorClass::classify("connection reset by peer"),
            WatchErrorClass::Other
        );
    }
}
