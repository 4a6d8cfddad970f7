use tokio::sync::oneshot;

use crate::error::{Result, SnowRsError};

/// Receiving half of a one-shot completion callback.
pub(crate) struct Completion<T> {
    receiver: oneshot::Receiver<T>,
}

/// Create a boxed callback and the future-side handle it resolves.
///
/// The callback is `FnOnce`, so the handle resolves at most once.
pub(crate) fn completion<T>() -> (Box<dyn FnOnce(T) + Send + 'static>, Completion<T>)
where
    T: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let complete = Box::new(move |value: T| {
        // The caller may have stopped waiting; the value is discarded then.
        let _ = sender.send(value);
    });
    (complete, Completion { receiver })
}

impl<T> Completion<T> {
    /// Wait for the callback to fire.
    /// Resolves to `CallbackDropped` if the callback is dropped uninvoked.
    pub(crate) async fn wait(self) -> Result<T> {
        self.receiver
            .await
            .map_err(|_| SnowRsError::CallbackDropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_with_callback_value() {
        let (complete, pending) = completion::<u32>();
        complete(7);
        assert_eq!(pending.wait().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_resolves_from_other_thread() {
        let (complete, pending) = completion::<String>();
        std::thread::spawn(move || complete("done".to_string()));
        assert_eq!(pending.wait().await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_dropped_callback() {
        let (complete, pending) = completion::<u32>();
        drop(complete);
        assert!(matches!(
            pending.wait().await,
            Err(SnowRsError::CallbackDropped)
        ));
    }

    #[tokio::test]
    async fn test_callback_after_receiver_dropped() {
        let (complete, pending) = completion::<u32>();
        drop(pending);
        complete(1);
    }
}
