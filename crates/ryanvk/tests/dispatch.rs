use std::any::Any;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use ryanvk::prelude::*;
use ryanvk::compose_subset;
use ryanvk::core::ComposeError;
use tower::ServiceExt;

// =============================================================================
// Capabilities
// =============================================================================

#[derive(Debug, Clone)]
struct Outgoing {
    scene: &'static str,
    kind: &'static str,
}

static SEND: LazyLock<Capability<Outgoing, String>> = LazyLock::new(|| {
    Capability::declare("send")
        .overload(Strategy::Exact, "scene", |a: &Outgoing| Probe::literal(a.scene))
        .overload(Strategy::Exact, "kind", |a: &Outgoing| Probe::literal(a.kind))
        .build()
});

static DESCRIBE: LazyLock<Capability<Box<dyn Any + Send>, String>> =
    LazyLock::new(|| {
        Capability::declare("describe")
            .overload(Strategy::Type, "value", |v: &Box<dyn Any + Send>| {
                Probe::dynamic(&**v)
            })
            .build()
    });

static GREET: LazyLock<Capability<String, String>> =
    LazyLock::new(|| Capability::declare("greet").singleton().build());

static COUNT: LazyLock<Capability<(), usize>> =
    LazyLock::new(|| Capability::declare("count").singleton().build());

static ROUTE: LazyLock<Capability<Address, String>> = LazyLock::new(|| {
    Capability::declare("route")
        .overload(Strategy::PatternAddress, "target", |a: &Address| {
            Probe::address(a)
        })
        .build()
});

#[derive(Debug, Clone)]
enum Event {
    Message { text: String },
    Join { user: u32 },
}

static DISPATCH: LazyLock<Capability<Event, String>> = LazyLock::new(|| {
    Capability::declare("dispatch")
        .overload(
            Strategy::predicate(|_, value| match value.downcast_ref::<Event>()? {
                Event::Message { .. } => Some("message".into()),
                Event::Join { .. } => Some("join".into()),
            }),
            "event",
            |e: &Event| Probe::value(e),
        )
        .optional()
        .build()
});

static REACT: LazyLock<Capability<Option<String>, String>> = LazyLock::new(|| {
    Capability::declare("react")
        .overload(
            Strategy::optional(Strategy::Exact),
            "emoji",
            |e: &Option<String>| Probe::optional(e.as_ref(), |s| Probe::literal(s.as_str())),
        )
        .build()
});

static FLAT: LazyLock<Capability<(), &'static str>> =
    LazyLock::new(|| Capability::declare("flat").build());

// =============================================================================
// Performers
// =============================================================================

#[derive(Performer)]
struct Plain;

#[derive(Performer)]
struct Counter {
    calls: AtomicUsize,
}

#[derive(Performer)]
struct Polite {
    #[access]
    greeting: Component<String>,
    #[access(name = "suffix", optional)]
    suffix: Component<String>,
}

fn polite_layers() -> Composition {
    let mut collector = Collector::<Polite>::new("test", "polite");
    collector
        .register(&*GREET)
        .implement(|this, cx, name| async move {
            let greeting = this.greeting.get(cx.staff())?;
            let suffix = this.suffix.get_optional(cx.staff())?;
            let suffix = suffix.as_deref().map_or("", String::as_str);
            Ok(format!("{greeting} {name}{suffix}"))
        })
        .unwrap();
    compose([collector.close()]).unwrap()
}

#[derive(Performer)]
#[performer(enter = "open", exit = "close")]
struct Session {
    journal: Mutex<Vec<String>>,
}

impl Session {
    async fn open(&self, staff: &Staff) -> Result<(), BoxError> {
        let account = staff.components().get::<String>("account");
        let account = account.as_deref().map_or("anonymous", String::as_str);
        self.journal.lock().unwrap().push(format!("open {account}"));
        Ok(())
    }

    async fn close(&self) -> Result<(), BoxError> {
        Err("session already closed".into())
    }
}

fn staff_of(artifacts: Vec<Artifacts>) -> Staff {
    Staff::new(compose(artifacts).unwrap(), Components::new())
}

fn send(scene: &'static str, kind: &'static str) -> Outgoing {
    Outgoing { scene, kind }
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn dimensions_intersect_and_stay_deterministic() {
    let mut collector = Collector::<Plain>::new("test", "send");
    collector
        .register(&*SEND)
        .on("scene", "group")
        .implement(|_, _, _| async move { Ok("A".to_owned()) })
        .unwrap();
    collector
        .register(&*SEND)
        .on("scene", "group")
        .on("kind", "image")
        .implement(|_, _, _| async move { Ok("B".to_owned()) })
        .unwrap();
    let staff = staff_of(vec![collector.close()]);

    for _ in 0..3 {
        assert_eq!(staff.call(&SEND, send("group", "image")).await.unwrap(), "B");
    }
    let first = staff.resolve(&SEND, &send("group", "image")).unwrap();
    let second = staff.resolve(&SEND, &send("group", "image")).unwrap();
    assert_eq!(first.twin, second.twin);
}

#[tokio::test]
async fn type_overload_uses_exact_runtime_type() {
    let mut collector = Collector::<Plain>::new("test", "describe");
    collector
        .register(&*DESCRIBE)
        .on("value", Selection::of::<i32>())
        .implement(|_, _, v| async move {
            Ok(format!("int {}", v.downcast_ref::<i32>().copied().unwrap_or_default()))
        })
        .unwrap();
    collector
        .register(&*DESCRIBE)
        .on("value", Selection::of::<String>())
        .implement(|_, _, _| async move { Ok("str".to_owned()) })
        .unwrap();
    let staff = staff_of(vec![collector.close()]);

    assert_eq!(staff.call(&DESCRIBE, Box::new(42_i32)).await.unwrap(), "int 42");
    assert_eq!(
        staff.call(&DESCRIBE, Box::new(String::from("x"))).await.unwrap(),
        "str"
    );

    let err = staff.call(&DESCRIBE, Box::new(4.2_f64)).await.unwrap_err();
    assert!(StaffError::is_unresolvable(&err));
}

#[tokio::test]
async fn later_collector_overrides_and_falls_through() {
    let mut base = Collector::<Plain>::new("test", "base");
    let base_twin = base
        .register(&*SEND)
        .on("scene", "friend")
        .on("kind", "text")
        .implement(|_, _, _| async move { Ok("base".to_owned()) })
        .unwrap();

    let mut newer = Collector::<Plain>::new("test", "newer");
    newer
        .register(&*SEND)
        .on("scene", "friend")
        .on("kind", "text")
        .implement(move |_, cx, args| async move {
            assert_eq!(cx.layer(), 0);
            assert_eq!(cx.overridden().map(|t| t.id()), Some(base_twin));
            Ok(format!("new:{}", cx.super_call(args).await?))
        })
        .unwrap();

    let staff = staff_of(vec![base.close(), newer.close()]);
    assert_eq!(staff.layers().len(), 2);
    assert_eq!(
        staff.call(&SEND, send("friend", "text")).await.unwrap(),
        "new:base"
    );
}

#[tokio::test]
async fn distinct_keys_do_not_interfere() {
    let build = |with_image: bool| {
        let mut collector = Collector::<Plain>::new("test", "additive");
        collector
            .register(&*SEND)
            .on("scene", "group")
            .on("kind", "text")
            .implement(|_, _, _| async move { Ok("text".to_owned()) })
            .unwrap();
        if with_image {
            collector
                .register(&*SEND)
                .on("scene", "group")
                .on("kind", "image")
                .implement(|_, _, _| async move { Ok("image".to_owned()) })
                .unwrap();
        }
        collector.close()
    };

    let before = staff_of(vec![build(false)]);
    let after = staff_of(vec![build(true)]);
    assert_eq!(before.call(&SEND, send("group", "text")).await.unwrap(), "text");
    assert_eq!(after.call(&SEND, send("group", "text")).await.unwrap(), "text");
    assert_eq!(after.call(&SEND, send("group", "image")).await.unwrap(), "image");
    assert_eq!(after.layers().len(), 1);
}

#[tokio::test]
async fn composing_twice_resolves_identically() {
    let mut base = Collector::<Plain>::new("test", "base");
    base.register(&*GREET)
        .implement(|_, _, name| async move { Ok(format!("hi {name}")) })
        .unwrap();
    let mut loud = Collector::<Plain>::new("test", "loud");
    loud.register(&*GREET)
        .implement(|_, cx, name| async move { Ok(cx.super_call(name).await?.to_uppercase()) })
        .unwrap();
    let artifacts = vec![base.close(), loud.close()];

    let first = staff_of(artifacts.clone());
    let second = staff_of(artifacts);
    assert_eq!(
        first.resolve(&GREET, &"x".to_owned()).unwrap().twin,
        second.resolve(&GREET, &"x".to_owned()).unwrap().twin
    );
    assert_eq!(first.call(&GREET, "ann".into()).await.unwrap(), "HI ANN");
    assert_eq!(second.call(&GREET, "ann".into()).await.unwrap(), "HI ANN");
}

// =============================================================================
// Strategies
// =============================================================================

#[tokio::test]
async fn most_specific_pattern_wins() {
    let mut collector = Collector::<Plain>::new("test", "route");
    collector
        .register(&*ROUTE)
        .on("target", "group.member")
        .implement(|_, _, _| async move { Ok("any member".to_owned()) })
        .unwrap();
    collector
        .register(&*ROUTE)
        .on("target", "group(1).member")
        .implement(|_, _, _| async move { Ok("member of 1".to_owned()) })
        .unwrap();
    let staff = staff_of(vec![collector.close()]);

    let in_one = Address::new().with("group", "1").with("member", "7");
    let in_two = Address::new().with("group", "2").with("member", "7");
    let friend = Address::new().with("friend", "7");

    assert_eq!(staff.call(&ROUTE, in_one).await.unwrap(), "member of 1");
    assert_eq!(staff.call(&ROUTE, in_two).await.unwrap(), "any member");
    assert!(StaffError::is_unresolvable(
        &staff.call(&ROUTE, friend).await.unwrap_err()
    ));
}

#[tokio::test]
async fn predicate_tags_and_optional_calls() {
    let mut collector = Collector::<Plain>::new("test", "events");
    collector
        .register(&*DISPATCH)
        .on("event", "message")
        .implement(|_, _, event| async move {
            match event {
                Event::Message { text } => Ok(text),
                Event::Join { user } => Ok(format!("join {user}")),
            }
        })
        .unwrap();
    let staff = staff_of(vec![collector.close()]);

    let text = staff
        .call_optional(&DISPATCH, Event::Message { text: "hey".into() })
        .await
        .unwrap();
    assert_eq!(text.as_deref(), Some("hey"));

    let join = staff
        .call_optional(&DISPATCH, Event::Join { user: 3 })
        .await
        .unwrap();
    assert_eq!(join, None);

    let err = staff.call_optional(&GREET, "x".into()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StaffError>(),
        Some(StaffError::NotOptional { .. })
    ));
}

#[tokio::test]
async fn optional_strategy_matches_absent_argument() {
    let mut collector = Collector::<Plain>::new("test", "react");
    collector
        .register(&*REACT)
        .on("emoji", "+1")
        .implement(|_, _, _| async move { Ok("thumbs".to_owned()) })
        .unwrap();
    collector
        .register(&*REACT)
        .on("emoji", Selection::Absent)
        .implement(|_, _, _| async move { Ok("default".to_owned()) })
        .unwrap();
    let staff = staff_of(vec![collector.close()]);

    assert_eq!(staff.call(&REACT, Some("+1".into())).await.unwrap(), "thumbs");
    assert_eq!(staff.call(&REACT, None).await.unwrap(), "default");
    assert!(staff.call(&REACT, Some("?".into())).await.is_err());
}

#[tokio::test]
async fn call_all_runs_every_match_of_the_first_layer() {
    let mut collector = Collector::<Plain>::new("test", "all");
    collector
        .register(&*ROUTE)
        .on("target", "group")
        .implement(|_, _, _| async move { Ok("group".to_owned()) })
        .unwrap();
    collector
        .register(&*ROUTE)
        .on("target", "group(5)")
        .implement(|_, _, _| async move { Ok("five".to_owned()) })
        .unwrap();
    let staff = staff_of(vec![collector.close()]);

    let all = staff
        .call_all(&ROUTE, Address::new().with("group", "5"))
        .await
        .unwrap();
    assert_eq!(all, ["five", "group"]);
}

#[tokio::test]
async fn zero_dimension_capability_keeps_first_registration() {
    let mut first = Collector::<Plain>::new("test", "flat-a");
    first
        .register(&*FLAT)
        .implement(|_, _, ()| async move { Ok("a") })
        .unwrap();
    let mut second = Collector::<Plain>::new("test", "flat-b");
    second
        .register(&*FLAT)
        .implement(|_, _, ()| async move { Ok("b") })
        .unwrap();
    let staff = staff_of(vec![first.close(), second.close()]);
    assert_eq!(staff.call(&FLAT, ()).await.unwrap(), "b");

    let mut twice = Collector::<Plain>::new("test", "flat-twice");
    for value in ["x", "y"] {
        twice
            .register(&*FLAT)
            .implement(move |_, _, ()| async move { Ok(value) })
            .unwrap();
    }
    assert!(matches!(
        compose([twice.close()]),
        Err(ComposeError::DuplicateRegistration { .. })
    ));
}

// =============================================================================
// Performers and components
// =============================================================================

#[tokio::test]
async fn performer_instance_is_shared_across_calls() {
    let mut collector = Collector::<Counter>::new("test", "counter");
    collector
        .register(&*COUNT)
        .implement(|this, _, ()| async move { Ok(this.calls.fetch_add(1, Ordering::SeqCst) + 1) })
        .unwrap();
    let staff = staff_of(vec![collector.close()]);

    assert_eq!(staff.call(&COUNT, ()).await.unwrap(), 1);
    assert_eq!(staff.call(&COUNT, ()).await.unwrap(), 2);
    assert_eq!(staff.ext(Components::new()).call(&COUNT, ()).await.unwrap(), 3);
    assert_eq!(staff.instance_count(), 1);
}

#[tokio::test]
async fn derived_performer_reads_components() {
    let layers = polite_layers();

    let staff = Staff::new(
        layers.clone(),
        Components::new().with("greeting", "Hello".to_owned()),
    );
    assert_eq!(staff.call(&GREET, "Ryan".into()).await.unwrap(), "Hello Ryan");

    let bare = Staff::new(layers, Components::new());
    let err = bare.call(&GREET, "Ryan".into()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StaffError>(),
        Some(StaffError::MissingComponent { .. })
    ));
}

#[tokio::test]
async fn derived_access_fields_follow_the_calling_staff() {
    let base = Components::new().with("greeting", "Hello".to_owned());

    // child first: the shared instance must not keep the child's suffix
    let staff = Staff::new(polite_layers(), base.clone());
    let child = staff.ext(Components::new().with("suffix", "!".to_owned()));
    assert_eq!(child.call(&GREET, "Ryan".into()).await.unwrap(), "Hello Ryan!");
    assert_eq!(staff.call(&GREET, "Ryan".into()).await.unwrap(), "Hello Ryan");
    assert_eq!(staff.instance_count(), 1);

    // parent first: the child still sees its own suffix
    let staff = Staff::new(polite_layers(), base);
    assert_eq!(staff.call(&GREET, "Ryan".into()).await.unwrap(), "Hello Ryan");
    let child = staff.ext(Components::new().with("suffix", "?".to_owned()));
    assert_eq!(child.call(&GREET, "Ryan".into()).await.unwrap(), "Hello Ryan?");
    assert_eq!(child.instance_count(), 1);
}

#[tokio::test]
async fn derived_lifespan_hooks_run_once_and_on_shutdown() {
    static JOURNAL: LazyLock<Capability<(), Vec<String>>> =
        LazyLock::new(|| Capability::declare("journal").singleton().build());

    let mut collector = Collector::<Session>::new("test", "session");
    collector
        .register(&*JOURNAL)
        .implement(|this, _, ()| async move { Ok(this.journal.lock().unwrap().clone()) })
        .unwrap();
    let staff = Staff::new(
        compose([collector.close()]).unwrap(),
        Components::new().with("account", "ryan".to_owned()),
    );

    assert_eq!(staff.call(&JOURNAL, ()).await.unwrap(), ["open ryan"]);
    assert_eq!(staff.call(&JOURNAL, ()).await.unwrap(), ["open ryan"]);

    let err = staff.shutdown().await.unwrap_err();
    assert_eq!(err.to_string(), "session already closed");
    assert_eq!(staff.instance_count(), 0);
    assert!(staff.shutdown().await.is_ok());
}

#[tokio::test]
async fn ext_components_stay_with_the_derived_staff() {
    static PEEK: LazyLock<Capability<&'static str, Option<i64>>> =
        LazyLock::new(|| Capability::declare("peek").singleton().build());

    let mut collector = Collector::<Plain>::new("test", "peek");
    collector
        .register(&*PEEK)
        .implement(|_, cx, name| async move {
            Ok(cx.staff().components().get::<i64>(name).map(|v| *v))
        })
        .unwrap();
    let staff1 = staff_of(vec![collector.close()]);

    let mut staff2 = staff1.ext(Components::new().with("x", 1_i64));
    assert_eq!(staff2.call(&PEEK, "x").await.unwrap(), Some(1));
    assert_eq!(staff1.call(&PEEK, "x").await.unwrap(), None);

    staff2.insert_component("y", 2_i64);
    assert_eq!(staff2.call(&PEEK, "y").await.unwrap(), Some(2));
    assert_eq!(staff1.call(&PEEK, "y").await.unwrap(), None);
}

#[tokio::test]
async fn injected_layers_take_priority() {
    let mut base = Collector::<Plain>::new("test", "base");
    base.register(&*GREET)
        .implement(|_, _, name| async move { Ok(format!("hi {name}")) })
        .unwrap();
    let mut patch = Collector::<Plain>::new("test", "patch");
    patch
        .register(&*GREET)
        .implement(|_, cx, name| async move { Ok(format!("[{}]", cx.super_call(name).await?)) })
        .unwrap();

    let staff = staff_of(vec![base.close()]);
    let patched = staff.inject(&compose([patch.close()]).unwrap());

    assert_eq!(patched.call(&GREET, "bo".into()).await.unwrap(), "[hi bo]");
    assert_eq!(staff.call(&GREET, "bo".into()).await.unwrap(), "hi bo");
}

// =============================================================================
// Export and hosting
// =============================================================================

fn build_exported() -> Artifacts {
    let mut collector = Collector::<Plain>::new("dispatch-test", "exported");
    collector
        .register(&*GREET)
        .implement(|_, _, name| async move { Ok(format!("exported {name}")) })
        .unwrap();
    collector.close()
}

export_collector! {
    static EXPORTED = ("dispatch-test", "exported", build_exported);
}

#[tokio::test]
async fn exported_collectors_are_served_through_tower() {
    let layers = compose(compose_subset("dispatch-test", None).unwrap()).unwrap();
    let staff = Staff::new(layers, Components::new());

    let svc = CapabilityService::new(staff, GREET.clone());
    assert_eq!(svc.oneshot("zoe".into()).await.unwrap(), "exported zoe");
}
