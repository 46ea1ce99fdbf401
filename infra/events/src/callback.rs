use std::any::Any;
use std::borrow::Cow;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Why a single listener did not complete during an emit.
///
/// Failures are isolated per listener: they are logged and folded into the
/// boolean emit result, never propagated as an [`EventBusError`](crate::EventBusError).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerFailure {
    /// The listener returned an error value.
    #[error("listener returned an error: {message}")]
    Error { message: Cow<'static, str> },

    /// The listener panicked; the panic was caught on the lane.
    #[error("listener panicked: {message}")]
    Panic { message: Cow<'static, str> },
}

impl ListenerFailure {
    /// Builds an [`ListenerFailure::Error`] from any displayable value.
    pub fn error(message: impl Display) -> Self {
        Self::Error { message: message.to_string().into() }
    }

    fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&'static str>()
            .map(|s| Cow::Borrowed(*s))
            .or_else(|| payload.downcast_ref::<String>().map(|s| Cow::Owned(s.clone())))
            .unwrap_or(Cow::Borrowed("non-string panic payload"));
        Self::Panic { message }
    }
}

/// What a listener closure may return.
///
/// Implemented for `()` (a plain procedure) and for `Result<(), E>` where the
/// error is displayable, so both `|p| log(p)` and `|p| store.push(p)` style
/// closures are accepted by [`EventBus::subscribe`](crate::EventBus::subscribe).
pub trait ListenerOutcome {
    /// Normalizes the return value into the bus's failure representation.
    ///
    /// # Errors
    /// Returns [`ListenerFailure::Error`] when the listener reported an error.
    fn into_outcome(self) -> Result<(), ListenerFailure>;
}

impl ListenerOutcome for () {
    #[inline]
    fn into_outcome(self) -> Result<(), ListenerFailure> {
        Ok(())
    }
}

impl<E: Display> ListenerOutcome for Result<(), E> {
    #[inline]
    fn into_outcome(self) -> Result<(), ListenerFailure> {
        self.map_err(ListenerFailure::error)
    }
}

/// A listener invoked with the payload of every event it is subscribed to.
///
/// All callbacks of a bus share its single lane thread, so implementations
/// must return quickly and must not block. A panicking callback is treated
/// as a failed one.
pub trait Callback<T>: Send {
    /// Handles one event payload.
    ///
    /// # Errors
    /// Returns a [`ListenerFailure`] when the listener could not handle the payload.
    fn call(&self, payload: &T) -> Result<(), ListenerFailure>;
}

impl<T, F, R> Callback<T> for F
where
    F: Fn(&T) -> R + Send,
    R: ListenerOutcome,
{
    #[inline]
    fn call(&self, payload: &T) -> Result<(), ListenerFailure> {
        self(payload).into_outcome()
    }
}

/// Runs a callback with panics contained to this invocation.
pub(crate) fn invoke<T>(callback: &dyn Callback<T>, payload: &T) -> Result<(), ListenerFailure> {
    catch_unwind(AssertUnwindSafe(|| callback.call(payload)))
        .unwrap_or_else(|panic| Err(ListenerFailure::from_panic(panic.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_closure_succeeds() {
        let cb = |_: &u32| {};
        assert_eq!(invoke(&cb, &1u32), Ok(()));
    }

    #[test]
    fn error_return_becomes_failure() {
        let cb = |n: &u32| if *n > 1 { Err(format!("{n} is too large")) } else { Ok(()) };
        assert_eq!(invoke(&cb, &1u32), Ok(()));
        assert_eq!(invoke(&cb, &7u32), Err(ListenerFailure::error("7 is too large")));
    }

    #[test]
    fn panic_is_contained() {
        let cb = |_: &u32| -> () { panic!("boom") };
        let failure = invoke(&cb, &0u32).unwrap_err();
        assert_eq!(failure, ListenerFailure::Panic { message: "boom".into() });
    }

    #[test]
    fn formatted_panic_message_is_captured() {
        let cb = |n: &u32| -> () { panic!("bad payload {n}") };
        let failure = invoke(&cb, &3u32).unwrap_err();
        assert_eq!(failure.to_string(), "listener panicked: bad payload 3");
    }
}
