//! Failure containment for poll-loop steps
//!
//! A step that returns an error or panics is logged against its thermostat (or
//! `weather`) and skipped; the cycle carries on with the next step.

use crate::error::Result;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::error;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Run `step`, returning its value or `None` after logging the failure
pub async fn isolate<T, F>(tag: &str, step: &str, future: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!(thermostat = tag, "{} failed: {}", step, e);
            None
        }
        Err(payload) => {
            error!(
                thermostat = tag,
                "{} failed: panicked: {}",
                step,
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThermologError;

    #[tokio::test]
    async fn test_success_passes_through() {
        assert_eq!(isolate("hall", "read", async { Ok(7) }).await, Some(7));
    }

    #[tokio::test]
    async fn test_error_is_contained() {
        let result: Option<()> = isolate("hall", "read", async {
            Err(ThermologError::device("unreachable"))
        })
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let result: Option<u8> = isolate("hall", "decode", async {
            let values: Vec<u8> = Vec::new();
            Ok(values[3])
        })
        .await;
        assert!(result.is_none());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
