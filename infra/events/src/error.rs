use std::borrow::Cow;

/// Errors that can occur during event bus operations.
///
/// Listener misbehavior is never reported here; see [`ListenerFailure`](crate::ListenerFailure).
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    /// The bus no longer accepts work: shutdown has begun or the lane has terminated.
    #[error("Event bus closed{}: {message}", format_context(.context))]
    BusClosed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A blocking wait could not run to completion.
    #[error("Blocking wait interrupted{}: {message}", format_context(.context))]
    InterruptedWait { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The operating system refused to start the lane thread.
    #[error("Failed to spawn event lane{}: {source}", format_context(.context))]
    Spawn {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    /// Invalid settings supplied to the bus builder.
    #[error("Invalid event bus configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl EventBusError {
    pub(crate) fn closed(operation: &'static str) -> Self {
        Self::BusClosed { message: "lane is not accepting tasks".into(), context: Some(operation.into()) }
    }

    pub(crate) fn lane_dropped(operation: &'static str) -> Self {
        Self::BusClosed {
            message: "lane terminated before replying".into(),
            context: Some(operation.into()),
        }
    }
}

/// Adds `.context(..)` to results that carry, or convert into, an [`EventBusError`].
pub trait EventBusErrorExt<T> {
    /// Attaches a human-readable context to the error, if any.
    ///
    /// # Errors
    /// Returns the original error, converted into [`EventBusError`], with the context attached.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, EventBusError>;
}

impl<T> EventBusErrorExt<T> for Result<T, EventBusError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                EventBusError::BusClosed { context: c, .. }
                | EventBusError::InterruptedWait { context: c, .. }
                | EventBusError::Spawn { context: c, .. }
                | EventBusError::InvalidConfiguration { context: c, .. } => {
                    *c = Some(context.into());
                },
            }
            e
        })
    }
}

impl<T> EventBusErrorExt<T> for Result<T, std::io::Error> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, EventBusError> {
        self.map_err(|source| EventBusError::Spawn { source, context: Some(context.into()) })
    }
}

impl From<std::io::Error> for EventBusError {
    #[inline]
    fn from(source: std::io::Error) -> Self {
        Self::Spawn { source, context: None }
    }
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
