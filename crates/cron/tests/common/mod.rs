//! Common test utilities for integration tests.
//!
//! [`ProbedApp`] runs the real bootstrap sequence against a mock
//! configuration manager that records what it was asked for.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use matview_cron::bootstrap::{
    App, AppConfig, BootstrapError, ConfigurationManager, ManagerRequest, NoArgs,
};
use matview_cron::signals::Shutdown;

/// Value the mock manager places under `mock.marker`.
pub const MOCK_MARKER: &str = "from-mock-manager";

/// What a mock manager saw, shared with the test through a static.
pub struct ManagerProbe {
    requests: Mutex<Vec<ManagerRequest>>,
    markers: Mutex<Vec<String>>,
    entered: AtomicUsize,
    exited: AtomicUsize,
}

impl ManagerProbe {
    pub const fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            markers: Mutex::new(Vec::new()),
            entered: AtomicUsize::new(0),
            exited: AtomicUsize::new(0),
        }
    }

    /// The single request the manager received.
    pub fn request(&self) -> ManagerRequest {
        let requests = self.requests.lock().unwrap();
        assert_eq!(requests.len(), 1, "expected exactly one manager request");
        requests[0].clone()
    }

    /// `mock.marker` values read by `main`.
    pub fn markers(&self) -> Vec<String> {
        self.markers.lock().unwrap().clone()
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn exited(&self) -> usize {
        self.exited.load(Ordering::SeqCst)
    }
}

/// Configuration manager that hands out a fixed configuration.
pub struct MockManager {
    probe: &'static ManagerProbe,
    request: ManagerRequest,
}

impl MockManager {
    pub fn new(probe: &'static ManagerProbe, request: ManagerRequest) -> Self {
        Self { probe, request }
    }
}

impl ConfigurationManager for MockManager {
    fn enter(&mut self) -> Result<AppConfig, BootstrapError> {
        self.probe.entered.fetch_add(1, Ordering::SeqCst);
        self.probe.requests.lock().unwrap().push(self.request.clone());

        let settings = ::config::Config::builder()
            .set_override("mock.marker", MOCK_MARKER)?
            .build()?;
        AppConfig::new(
            self.request.app_name,
            self.request.config_pathname.clone(),
            settings,
        )
    }

    fn exit(&mut self) {
        self.probe.exited.fetch_add(1, Ordering::SeqCst);
    }
}

/// How [`ProbedApp::main`] ends.
pub enum MainOutcome {
    Exit(i32),
    Fail,
    Panic,
}

/// Binds a [`ProbedApp`] to its own probe so tests can run in parallel.
pub trait Probe: Send + 'static {
    const OUTCOME: MainOutcome;

    fn probe() -> &'static ManagerProbe;
}

pub struct ProbedApp<P: Probe> {
    config: AppConfig,
    _probe: PhantomData<fn() -> P>,
}

#[async_trait::async_trait]
impl<P: Probe> App for ProbedApp<P> {
    const NAME: &'static str = "probed-app";
    const VERSION: &'static str = "9.9.9";
    const DESCRIPTION: &'static str = "Records the bootstrap sequence";

    type Args = NoArgs;

    fn new(config: AppConfig, _shutdown: Shutdown) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            _probe: PhantomData,
        })
    }

    async fn main(&mut self) -> anyhow::Result<i32> {
        let marker: String = self.config.get("mock.marker")?;
        P::probe().markers.lock().unwrap().push(marker);

        match P::OUTCOME {
            MainOutcome::Exit(code) => Ok(code),
            MainOutcome::Fail => Err(anyhow::anyhow!("main failed")),
            MainOutcome::Panic => panic!("main panicked"),
        }
    }

    fn configuration_manager(request: ManagerRequest) -> Box<dyn ConfigurationManager> {
        Box::new(MockManager::new(P::probe(), request))
    }

    fn install_signal_handlers() -> Shutdown {
        Shutdown::never()
    }
}
