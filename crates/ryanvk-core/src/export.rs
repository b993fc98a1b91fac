//! Link-time registry of collectors.
//!
//! Protocol crates export their collectors with [`export_collector!`]; the
//! runtime later picks them by namespace with [`compose_subset`]. Each builder
//! runs at most once per process.

use std::fmt;
use std::sync::OnceLock;

use linkme::distributed_slice;
use tracing::debug;

use crate::collector::Artifacts;
use crate::error::{ComposeError, ComposeResult};

/// All exported collectors, gathered at link time.
#[distributed_slice]
pub static COLLECTORS: [CollectorEntry];

/// A collector exported under `namespace/identify`.
pub struct CollectorEntry {
    namespace: &'static str,
    identify: &'static str,
    build: fn() -> Artifacts,
    built: OnceLock<Artifacts>,
}

impl CollectorEntry {
    pub const fn new(namespace: &'static str, identify: &'static str, build: fn() -> Artifacts) -> Self {
        Self {
            namespace,
            identify,
            build,
            built: OnceLock::new(),
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn identify(&self) -> &'static str {
        self.identify
    }

    /// The collector's artifacts, built on first access.
    pub fn artifacts(&self) -> Artifacts {
        self.built
            .get_or_init(|| {
                debug!(namespace = self.namespace, identify = self.identify, "Building exported collector");
                (self.build)()
            })
            .clone()
    }
}

impl fmt::Debug for CollectorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorEntry")
            .field("namespace", &self.namespace)
            .field("identify", &self.identify)
            .field("built", &self.built.get().is_some())
            .finish()
    }
}

/// Exports a collector builder into [`COLLECTORS`].
///
/// ```ignore
/// export_collector! {
///     static QQ_MESSAGE = ("qq", "message", build_message_collector);
/// }
/// ```
#[macro_export]
macro_rules! export_collector {
    ($(#[$meta:meta])* $vis:vis static $name:ident = ($namespace:expr, $identify:expr, $build:expr $(,)?);) => {
        $(#[$meta])*
        #[$crate::linkme::distributed_slice($crate::export::COLLECTORS)]
        #[linkme(crate = $crate::linkme)]
        $vis static $name: $crate::export::CollectorEntry =
            $crate::export::CollectorEntry::new($namespace, $identify, $build);
    };
}

/// Every exported collector.
pub fn exported() -> impl Iterator<Item = &'static CollectorEntry> {
    COLLECTORS.iter()
}

/// Artifacts of the exported collectors under `namespace`, optionally
/// narrowed to one `identify`.
///
/// The result is sorted by identify name, so composing a whole namespace
/// puts the alphabetically last collector on top. Callers that need a
/// specific override order should ask for each identify in turn.
pub fn compose_subset(namespace: &str, identify: Option<&str>) -> ComposeResult<Vec<Artifacts>> {
    let mut entries: Vec<&'static CollectorEntry> = exported()
        .filter(|e| e.namespace == namespace && identify.is_none_or(|i| e.identify == i))
        .collect();
    if entries.is_empty() {
        return Err(ComposeError::UnknownSubset {
            subset: match identify {
                Some(i) => format!("{namespace}/{i}"),
                None => namespace.to_owned(),
            },
        });
    }
    entries.sort_by_key(|e| e.identify);
    Ok(entries.into_iter().map(CollectorEntry::artifacts).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::access::Access;
    use crate::collector::Collector;
    use crate::error::StaffResult;
    use crate::performer::Performer;

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Dummy;

    impl Performer for Dummy {
        fn construct(_: &Access<'_>) -> StaffResult<Self> {
            Ok(Dummy)
        }
    }

    fn build_second() -> Artifacts {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        Collector::<Dummy>::new("export-test", "second").close()
    }

    fn build_first() -> Artifacts {
        Collector::<Dummy>::new("export-test", "first").close()
    }

    crate::export_collector! {
        static SECOND = ("export-test", "second", build_second);
    }

    crate::export_collector! {
        static FIRST = ("export-test", "first", build_first);
    }

    #[test]
    fn subset_is_sorted_and_built_once() {
        let all = compose_subset("export-test", None).unwrap();
        let names: Vec<_> = all.iter().map(|a| a.collector().identify().to_owned()).collect();
        assert_eq!(names, ["first", "second"]);

        let again = compose_subset("export-test", Some("second")).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_subset_is_an_error() {
        let err = compose_subset("export-test", Some("third")).unwrap_err();
        assert_eq!(
            err,
            ComposeError::UnknownSubset {
                subset: "export-test/third".into()
            }
        );
    }
}
