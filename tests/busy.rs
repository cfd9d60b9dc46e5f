use arbor_dom::{
	busy::{BusyConfig, BusyContext, ContextRegistry, Description, ManualScheduler, CONTEXT_ATTRIBUTE},
	host::{
		memory::{MemoryHost, MemoryNode},
		Host,
	},
	BusyError, ReadyError,
};
use core::time::Duration;
use futures::FutureExt as _;
use std::{
	cell::Cell,
	io,
	rc::Rc,
	sync::{Arc, Mutex},
};
use tracing::Level;

mod logging_;

fn standalone() -> (ManualScheduler, BusyContext) {
	logging_::init();
	let scheduler = ManualScheduler::new();
	let context = BusyContext::standalone("test", Rc::new(scheduler.clone()));
	(scheduler, context)
}

fn registry(config: BusyConfig) -> (ManualScheduler, ContextRegistry) {
	logging_::init();
	let scheduler = ManualScheduler::new();
	let registry = ContextRegistry::new(Rc::new(scheduler.clone()), config);
	(scheduler, registry)
}

#[test]
fn ready_after_a_tick() {
	let (scheduler, context) = standalone();
	assert!(context.is_ready());
	assert!(matches!(context.when_ready(None).now_or_never(), Some(Ok(()))));

	let resolver = context.add_busy_state("Loading data");
	let mut ready = context.when_ready(None);
	assert!(!context.is_ready());
	assert!((&mut ready).now_or_never().is_none());

	resolver.resolve().unwrap();
	assert!(!context.is_ready());
	assert!((&mut ready).now_or_never().is_none());

	assert_eq!(scheduler.run_until_idle(), 1);
	assert!(context.is_ready());
	assert!(matches!(ready.now_or_never(), Some(Ok(()))));
}

#[test]
fn busy_states_are_listed_in_order() {
	let (scheduler, context) = standalone();
	scheduler.advance(Duration::from_millis(5));
	let first = context.add_busy_state("first");
	let renders = Rc::new(Cell::new(0));
	let r = renders.clone();
	let second = context.add_busy_state(Description::lazy(move || {
		r.set(r.get() + 1);
		"second".to_owned()
	}));
	assert_ne!(first.id(), second.id());

	let states = context.get_busy_states();
	assert_eq!(states.iter().map(|state| state.description.as_str()).collect::<Vec<_>>(), ["first", "second"]);
	assert_eq!(states[0].id, first.id());
	assert_eq!(states[0].added, Duration::from_millis(5));
	assert!(renders.get() >= 1);

	context.dump(Some("Still loading"));
	first.resolve().unwrap();
	assert_eq!(context.get_busy_states().len(), 1);
	second.resolve().unwrap();
}

#[test]
fn timeout_reports_outstanding_states() {
	let (scheduler, context) = standalone();
	let _resolver = context.add_busy_state("Loading data");
	let mut ready = context.when_ready(Some(Duration::from_millis(50)));

	scheduler.advance(Duration::from_millis(49));
	assert!((&mut ready).now_or_never().is_none());

	scheduler.advance(Duration::from_millis(1));
	let error = match ready.now_or_never() {
		Some(Err(error)) => error,
		other => panic!("expected a timeout, got {:?}", other),
	};
	assert!(matches!(error, ReadyError::Timeout { timeout, .. } if timeout == Duration::from_millis(50)));
	assert_eq!(error.busy_states().len(), 1);
	assert_eq!(error.busy_states()[0].description, "Loading data");
	assert!(error.to_string().contains("Loading data"));
}

#[test]
fn timers_are_cancelled_on_ready() {
	let (scheduler, context) = standalone();
	let resolver = context.add_busy_state("short");
	let ready = context.when_ready(Some(Duration::from_secs(1)));
	assert_eq!(scheduler.pending_timers(), 1);

	resolver.resolve().unwrap();
	scheduler.run_until_idle();
	assert_eq!(scheduler.pending_timers(), 0);
	assert!(matches!(ready.now_or_never(), Some(Ok(()))));
}

#[test]
fn double_resolution() {
	let (_, context) = standalone();
	let resolver = context.add_busy_state("once");
	resolver.resolve().unwrap();
	assert!(matches!(resolver.resolve(), Err(BusyError::AlreadyResolved { id }) if id == resolver.id()));

	let cleared = context.add_busy_state("cleared");
	context.clear();
	assert!(context.get_busy_states().is_empty());
	cleared.resolve().unwrap();
	assert!(matches!(cleared.resolve(), Err(BusyError::AlreadyResolved { .. })));
}

#[test]
fn busy_again_before_the_tick() {
	let (scheduler, context) = standalone();
	let first = context.add_busy_state("first");
	let mut ready = context.when_ready(None);

	first.resolve().unwrap();
	let second = context.add_busy_state("second");
	scheduler.run_until_idle();
	assert!(!context.is_ready());
	assert!((&mut ready).now_or_never().is_none());

	second.resolve().unwrap();
	scheduler.run_until_idle();
	assert!(matches!(ready.now_or_never(), Some(Ok(()))));
}

#[test]
fn dropped_context_abandons_waiters() {
	let (_, context) = standalone();
	let resolver = context.add_busy_state("forever");
	let ready = context.when_ready(None);

	drop(context);
	assert!(matches!(ready.now_or_never(), Some(Err(ReadyError::Abandoned))));
	resolver.resolve().unwrap();
}

fn element(host: &MemoryHost, parent: &MemoryNode, scope: bool) -> MemoryNode {
	let node = host.create_element("div", None).unwrap();
	if scope {
		host.set_attribute(&node, None, CONTEXT_ATTRIBUTE, "").unwrap();
	}
	host.insert_before(parent, &node, None).unwrap();
	node
}

#[test]
fn nested_scopes_propagate() {
	let (scheduler, registry) = registry(BusyConfig::default());
	let host = MemoryHost::new();
	let body = host.create_root();
	let outer = element(&host, &body, true);
	let inner = element(&host, &outer, true);
	let leaf = element(&host, &inner, false);
	let unscoped = element(&host, &body, false);

	assert!(registry.get_context(&host, &unscoped).is_page_context());
	let context = registry.get_context(&host, &leaf);
	assert_eq!(context.node_id(), Some(inner.id()));
	assert!(context.busy_context().ptr_eq(registry.get_context(&host, &inner).busy_context()));

	let inner_busy = context.busy_context();
	let outer_busy = inner_busy.parent().unwrap();
	let page = registry.page_context().busy_context();
	assert!(outer_busy.parent().unwrap().ptr_eq(page));

	let a = inner_busy.add_busy_state("a");
	let b = inner_busy.add_busy_state("b");
	assert_eq!(inner_busy.get_busy_states().len(), 2);
	assert_eq!(outer_busy.get_busy_states().len(), 1);
	assert_eq!(page.get_busy_states().len(), 1);
	assert!(!page.is_ready());

	let mut ready = page.when_ready(None);
	a.resolve().unwrap();
	scheduler.run_until_idle();
	assert_eq!(page.get_busy_states().len(), 1);
	assert!((&mut ready).now_or_never().is_none());

	b.resolve().unwrap();
	scheduler.run_until_idle();
	assert!(inner_busy.is_ready());
	assert!(outer_busy.is_ready());
	assert!(page.is_ready());
	assert!(matches!(ready.now_or_never(), Some(Ok(()))));

	assert!(registry.forget(inner.id()));
	assert!(!registry.forget(inner.id()));
	assert!(!registry.get_context(&host, &leaf).busy_context().ptr_eq(inner_busy));
}

#[test]
fn ancestor_timeouts_name_nested_states() {
	let (scheduler, registry) = registry(BusyConfig::default());
	let host = MemoryHost::new();
	let body = host.create_root();
	let outer = element(&host, &body, true);
	let inner = element(&host, &outer, true);

	let inner_busy = registry.get_context(&host, &inner).busy_context().clone();
	let _resolver = inner_busy.add_busy_state("Fetching rows");
	let page = registry.page_context().busy_context();
	let ready = page.when_ready(Some(Duration::from_millis(10)));
	scheduler.advance(Duration::from_millis(10));

	let error = match ready.now_or_never() {
		Some(Err(error)) => error,
		other => panic!("expected a timeout, got {:?}", other),
	};
	assert_eq!(error.busy_states().len(), 1);
	assert!(error.busy_states()[0].description.contains("Fetching rows"), "{}", error.busy_states()[0].description);

	let description = |context: &BusyContext| context.get_busy_states()[0].description.clone();
	let _second = inner_busy.add_busy_state("Sorting");
	assert!(description(inner_busy.parent().unwrap()).ends_with("Fetching rows, Sorting"));
}

#[test]
fn bootstrap_gate_holds_readiness() {
	let (scheduler, registry) = registry(BusyConfig::default().await_bootstrap(true));
	let page = registry.page_context().busy_context();
	assert!(!page.is_ready());

	let timed = page.when_ready(Some(Duration::from_millis(10)));
	scheduler.advance(Duration::from_millis(10));
	assert!(matches!(timed.now_or_never(), Some(Err(ReadyError::BootstrapPending { .. }))));

	let mut ready = page.when_ready(None);
	scheduler.run_until_idle();
	assert!((&mut ready).now_or_never().is_none());

	registry.bootstrap_gate().complete();
	assert!(page.is_ready());
	assert!(matches!(ready.now_or_never(), Some(Ok(()))));
}

#[test]
fn default_timeout() {
	let (scheduler, registry) = registry(BusyConfig::default().with_default_timeout(Duration::from_millis(20)));
	let page = registry.page_context().busy_context();
	let _resolver = page.add_busy_state("slow");

	let ready = page.when_ready(None);
	scheduler.advance(Duration::from_millis(20));
	assert!(matches!(ready.now_or_never(), Some(Err(ReadyError::Timeout { .. }))));

	registry.set_default_timeout(None);
	let mut ready = page.when_ready(None);
	scheduler.advance(Duration::from_secs(3600));
	assert!((&mut ready).now_or_never().is_none());
}

/// Collects formatted log output.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

#[test]
#[cfg(not(feature = "dangerous-logging"))]
fn descriptions_stay_out_of_logs() {
	let capture = Capture::default();
	let writer = capture.clone();
	let subscriber = tracing_subscriber::fmt().with_max_level(Level::TRACE).with_writer(move || writer.clone()).finish();

	tracing::subscriber::with_default(subscriber, || {
		let scheduler = ManualScheduler::new();
		let context = BusyContext::standalone("quiet", Rc::new(scheduler.clone()));
		let _resolver = context.add_busy_state("secret payload");
		let ready = context.when_ready(Some(Duration::from_millis(5)));
		scheduler.advance(Duration::from_millis(5));
		assert!(matches!(ready.now_or_never(), Some(Err(ReadyError::Timeout { .. }))));
		context.dump(None);
	});

	let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
	assert!(logs.contains("timed out"), "{}", logs);
	assert!(!logs.contains("secret payload"), "{}", logs);
}
