use crate::error::EventBusError;
use crate::pending::Pending;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one call to [`EventBus::subscribe`](crate::EventBus::subscribe).
///
/// Issued from a process-wide counter, so ids never repeat across buses and
/// never depend on the callback itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Names exactly one registration: the event key plus the id minted when it was created.
///
/// Only the bus can mint handles; two handles compare equal only if they refer
/// to the same subscribe call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle<K> {
    key: K,
    id: RegistrationId,
}

impl<K> SubscriptionHandle<K> {
    pub(crate) const fn new(key: K, id: RegistrationId) -> Self {
        Self { key, id }
    }

    /// Event key the registration lives under.
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Identifier of the registration.
    #[must_use]
    pub const fn id(&self) -> RegistrationId {
        self.id
    }
}

impl<K> AsRef<Self> for SubscriptionHandle<K> {
    fn as_ref(&self) -> &Self {
        self
    }
}

/// The pending result of [`EventBus::subscribe`](crate::EventBus::subscribe).
///
/// Awaiting it yields the [`SubscriptionHandle`] once the lane has stored the
/// callback. It can also be handed straight to
/// [`EventBus::unsubscribe`](crate::EventBus::unsubscribe) before it resolves:
/// the removal is queued behind the registration, so it always sees it.
#[must_use = "dropping a subscription loses the only way to unsubscribe it"]
#[derive(Debug)]
pub struct Subscription<K> {
    handle: SubscriptionHandle<K>,
    pending: Pending<()>,
}

impl<K> Subscription<K> {
    pub(crate) const fn new(handle: SubscriptionHandle<K>, pending: Pending<()>) -> Self {
        Self { handle, pending }
    }

    /// The handle this subscription resolves to.
    pub const fn handle(&self) -> &SubscriptionHandle<K> {
        &self.handle
    }

    /// Blocks the current thread until the lane has processed the registration.
    ///
    /// # Errors
    /// Returns [`EventBusError::BusClosed`] if the bus rejected the subscription,
    /// or [`EventBusError::InterruptedWait`] when called from a listener on the
    /// same lane. The registration itself still happens in that case.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context.
    pub fn wait(self) -> Result<SubscriptionHandle<K>, EventBusError> {
        self.pending.wait().map(|()| self.handle)
    }
}

impl<K> AsRef<SubscriptionHandle<K>> for Subscription<K> {
    fn as_ref(&self) -> &SubscriptionHandle<K> {
        &self.handle
    }
}

impl<K: Clone + Unpin> Future for Subscription<K> {
    type Output = Result<SubscriptionHandle<K>, EventBusError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.pending).poll(cx).map(|done| done.map(|()| this.handle.clone()))
    }
}
