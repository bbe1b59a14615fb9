//! Behaviour-driven tests for start-once coordination.

use std::cell::{Cell, RefCell};
use std::io;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::{DriverError, Lifecycle, LifecycleError, ResourceConfig, ResourceDriver, Transition};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ServiceConfig {
    version: String,
}

impl ResourceConfig for ServiceConfig {}

/// Driver that records every call as `"<verb> <version>"`.
#[derive(Default)]
struct RecordingDriver {
    log: RefCell<Vec<String>>,
    fail_start: Cell<bool>,
    unreachable: Cell<bool>,
}

impl ResourceDriver for RecordingDriver {
    type Config = ServiceConfig;
    type Handle = String;

    fn kind(&self) -> &'static str {
        "service"
    }

    fn start(&self, config: &ServiceConfig) -> Result<(), DriverError> {
        if self.fail_start.get() {
            return Err(DriverError::unavailable("service", "port refused"));
        }
        self.log.borrow_mut().push(format!("start {}", config.version));
        Ok(())
    }

    fn stop(&self, config: &ServiceConfig) -> Result<(), DriverError> {
        if self.unreachable.get() {
            return Err(DriverError::connectivity(
                "container engine",
                io::Error::from(io::ErrorKind::ConnectionRefused),
            ));
        }
        self.log.borrow_mut().push(format!("stop {}", config.version));
        Ok(())
    }

    fn handle(&self, config: &ServiceConfig) -> Result<String, DriverError> {
        Ok(format!("service-{}", config.version))
    }
}

struct World {
    state_dir: TempDir,
    lifecycle: Lifecycle,
    driver: RecordingDriver,
    ensured: Option<Result<Transition, LifecycleError>>,
    stopped: Option<Result<(), LifecycleError>>,
}

impl Default for World {
    fn default() -> Self {
        let state_dir = TempDir::new().expect("temp dir");
        let lifecycle = Lifecycle::new(state_dir.path().join("build/stagehand"));
        Self {
            state_dir,
            lifecycle,
            driver: RecordingDriver::default(),
            ensured: None,
            stopped: None,
        }
    }
}

impl World {
    fn fingerprint_exists(&self) -> bool {
        self.lifecycle.store_for(&self.driver).path().exists()
    }
}

fn config(version: &str) -> ServiceConfig {
    ServiceConfig {
        version: version.trim_matches('"').to_owned(),
    }
}

#[fixture]
fn world() -> World {
    World::default()
}

#[given("a clean state directory")]
fn given_nothing_recorded(world: &mut World) {
    assert!(world.state_dir.path().exists());
    assert!(!world.fingerprint_exists());
}

#[given("the resource was ensured with version {version}")]
fn given_previously_ensured(world: &mut World, version: String) {
    world
        .lifecycle
        .ensure_started(&world.driver, &config(&version))
        .expect("initial ensure");
}

#[given("the driver fails to start")]
fn given_failing_start(world: &mut World) {
    world.driver.fail_start.set(true);
}

#[given("the engine is unreachable")]
fn given_unreachable_engine(world: &mut World) {
    world.driver.unreachable.set(true);
}

#[when("the resource is ensured with version {version}")]
fn when_ensured(world: &mut World, version: String) {
    world.ensured = Some(
        world
            .lifecycle
            .ensure_started(&world.driver, &config(&version)),
    );
}

#[when("the resource is force stopped with version {version}")]
fn when_force_stopped(world: &mut World, version: String) {
    world.stopped = Some(world.lifecycle.force_stop(&world.driver, &config(&version)));
}

#[then("the driver log is {expected}")]
fn then_driver_log(world: &mut World, expected: String) {
    assert_eq!(
        world.driver.log.borrow().join(", "),
        expected.trim_matches('"')
    );
}

#[then("the transition is {expected}")]
fn then_transition(world: &mut World, expected: String) {
    let transition = match world.ensured.as_ref().expect("ensure result") {
        Ok(transition) => *transition,
        Err(error) => panic!("ensure failed: {error}"),
    };
    let label = match transition {
        Transition::Unchanged => "unchanged",
        Transition::Started => "started",
        Transition::Restarted => "restarted",
    };
    assert_eq!(label, expected.trim_matches('"'));
}

#[then("a fingerprint is recorded")]
fn then_fingerprint_recorded(world: &mut World) {
    assert!(world.fingerprint_exists());
}

#[then("the ensure call fails")]
fn then_ensure_fails(world: &mut World) {
    let result = world.ensured.as_ref().expect("ensure result");
    assert!(matches!(result, Err(LifecycleError::Start { .. })));
}

#[then("the force stop succeeds")]
fn then_force_stop_succeeds(world: &mut World) {
    let result = world.stopped.as_ref().expect("force stop result");
    assert!(result.is_ok(), "force stop failed: {result:?}");
}

#[then("no fingerprint is recorded afterwards")]
fn then_no_fingerprint(world: &mut World) {
    assert!(!world.fingerprint_exists());
}

#[scenario(path = "tests/features/lifecycle.feature", name = "First start records the configuration")]
fn first_start_records_configuration(world: World) {
    drop(world);
}

#[scenario(path = "tests/features/lifecycle.feature", name = "Unchanged configuration does not touch the driver")]
fn unchanged_configuration_is_idempotent(world: World) {
    drop(world);
}

#[scenario(path = "tests/features/lifecycle.feature", name = "Changed configuration restarts the resource")]
fn changed_configuration_restarts(world: World) {
    drop(world);
}

#[scenario(path = "tests/features/lifecycle.feature", name = "Failed start leaves nothing recorded")]
fn failed_start_leaves_nothing_recorded(world: World) {
    drop(world);
}

#[scenario(path = "tests/features/lifecycle.feature", name = "Force stop tolerates an unreachable engine")]
fn force_stop_tolerates_unreachable_engine(world: World) {
    drop(world);
}
