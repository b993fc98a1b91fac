//! Capabilities as tower services.
//!
//! [`CapabilityService`] binds a [`Staff`] to one capability so protocol glue
//! can stack ordinary tower layers (timeouts, concurrency limits, retries) in
//! front of dispatch.
//!
//! ```rust,ignore
//! let svc = CapabilityService::new(staff, SEND_MESSAGE.clone());
//! let receipt = svc.oneshot(message).await?;
//! ```

use std::fmt;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use ryanvk_core::{BoxError, Capability, Staff};
use tower::Service;

/// A tower [`Service`] calling one capability on a staff.
pub struct CapabilityService<A, R> {
    staff: Staff,
    capability: Capability<A, R>,
}

impl<A, R> CapabilityService<A, R> {
    pub fn new(staff: Staff, capability: Capability<A, R>) -> Self {
        Self { staff, capability }
    }

    pub fn staff(&self) -> &Staff {
        &self.staff
    }

    pub fn capability(&self) -> &Capability<A, R> {
        &self.capability
    }
}

impl<A, R> Clone for CapabilityService<A, R> {
    fn clone(&self) -> Self {
        Self {
            staff: self.staff.clone(),
            capability: self.capability.clone(),
        }
    }
}

impl<A, R> fmt::Debug for CapabilityService<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityService")
            .field("capability", &self.capability.name())
            .finish()
    }
}

impl<A, R> Service<A> for CapabilityService<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    type Response = R;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<R, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, args: A) -> Self::Future {
        let staff = self.staff.clone();
        let capability = self.capability.clone();
        async move { staff.call(&capability, args).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use ryanvk_core::{
        Access, Capability, Collector, Components, Performer, Probe, StaffError, StaffResult,
        Strategy, compose,
    };
    use tower::ServiceExt;

    use super::*;

    static DOUBLE: LazyLock<Capability<i64, i64>> = LazyLock::new(|| {
        Capability::declare("double")
            .overload(Strategy::Exact, "sign", |n: &i64| {
                Probe::literal(*n >= 0)
            })
            .build()
    });

    struct Math;

    impl Performer for Math {
        fn construct(_: &Access<'_>) -> StaffResult<Self> {
            Ok(Math)
        }
    }

    fn staff() -> Staff {
        let mut collector = Collector::<Math>::new("service-test", "math");
        collector
            .register(&*DOUBLE)
            .on("sign", true)
            .implement(|_, _, n| async move { Ok(n * 2) })
            .unwrap();
        let layers = compose([collector.close()]).unwrap();
        Staff::new(layers, Components::new())
    }

    #[tokio::test]
    async fn oneshot_dispatches() {
        let svc = CapabilityService::new(staff(), DOUBLE.clone());
        assert_eq!(svc.clone().oneshot(21).await.unwrap(), 42);

        let err = svc.oneshot(-1).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<StaffError>(),
            Some(&StaffError::Unresolvable {
                capability: "double"
            })
        );
    }
}
