//! Unit tests for the CLI runtime using an in-memory configuration loader.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use stagehand_config::Config;
use stagehand_drivers::{ExternalDatabase, PostgresConfig, PostgresMode};
use stagehand_lifecycle::{FingerprintStore, ResourceConfig};
use tempfile::TempDir;

use super::*;

struct StaticLoader(Config);

impl ConfigLoader for StaticLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.0.clone())
    }
}

struct Project {
    dir: TempDir,
}

impl Project {
    fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().to_path_buf()).expect("utf-8 temp dir")
    }

    fn config(&self) -> Config {
        Config {
            work_dir: Some(self.root()),
            log_filter: "off".to_owned(),
            ..Config::default()
        }
    }

    fn fingerprint_path(&self) -> PathBuf {
        self.dir.path().join("build/stagehand/postgres.fingerprint")
    }

    fn record_external_database(&self) {
        let config = PostgresConfig::new(
            PostgresMode::External(ExternalDatabase::new("127.0.0.1", 5432)),
            &self.dir.path().join("src/main/resources/db/migration"),
            self.dir.path().join("build/schema.sql"),
            self.dir.path().join("build/pgConnection.properties"),
        )
        .expect("config");
        FingerprintStore::new(self.fingerprint_path())
            .write(&config.fingerprint().expect("fingerprint"))
            .expect("write fingerprint");
    }
}

#[fixture]
fn project() -> Project {
    let dir = TempDir::new().expect("temp dir");
    let migrations = dir.path().join("src/main/resources/db/migration");
    fs::create_dir_all(&migrations).expect("mkdir migrations");
    fs::write(migrations.join("V1__init.sql"), "create table t (id int);").expect("write");
    Project { dir }
}

struct Outcome {
    exit: ExitCode,
    stdout: String,
    stderr: String,
}

fn invoke(config: Config, args: &[&str]) -> Outcome {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let argv = std::iter::once("stagehand")
        .chain(args.iter().copied())
        .map(OsString::from);
    let exit = run_with_loader(argv, &mut stdout, &mut stderr, &StaticLoader(config));
    Outcome {
        exit,
        stdout: String::from_utf8(stdout).expect("utf-8 stdout"),
        stderr: String::from_utf8(stderr).expect("utf-8 stderr"),
    }
}

#[rstest]
fn status_reports_nothing_recorded(project: Project) {
    let outcome = invoke(project.config(), &["db", "status"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "postgres: not started\n");
}

#[rstest]
fn status_describes_the_recorded_database(project: Project) {
    project.record_external_database();

    let outcome = invoke(project.config(), &["db", "status"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "postgres: started (external 127.0.0.1:5432)\n");
}

#[rstest]
fn down_forgets_the_recorded_database(project: Project) {
    project.record_external_database();

    let outcome = invoke(project.config(), &["db", "down"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "postgres: stopped\n");
    assert!(!project.fingerprint_path().exists());
}

#[rstest]
fn malformed_external_database_fails_before_touching_anything(project: Project) {
    let config = Config {
        external_database: Some("localhost".to_owned()),
        ..project.config()
    };

    let outcome = invoke(config, &["db", "up"]);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome.stderr.contains("invalid external_database setting"),
        "{}",
        outcome.stderr
    );
    assert!(!project.fingerprint_path().exists());
}

#[rstest]
fn missing_nvmrc_is_reported(project: Project) {
    let outcome = invoke(project.config(), &["node", "install"]);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stderr.contains(".nvmrc"), "{}", outcome.stderr);
}

#[rstest]
#[case::no_command(&[])]
#[case::unknown_action(&["db", "restart"])]
fn usage_errors_exit_with_failure(project: Project, #[case] args: &[&str]) {
    let outcome = invoke(project.config(), args);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("Usage"), "{}", outcome.stderr);
}

#[rstest]
fn help_goes_to_stdout(project: Project) {
    let outcome = invoke(project.config(), &["--help"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert!(outcome.stdout.contains("db"));
    assert!(outcome.stderr.is_empty());
}

#[test]
fn driver_errors_are_reported_verbatim() {
    let error = AppError::from(DriverError::configuration("no arch"));
    let mut stderr = Vec::new();

    let exit = report(&mut stderr, &error);

    assert_eq!(exit, ExitCode::FAILURE);
    assert_eq!(
        String::from_utf8(stderr).expect("utf-8 stderr"),
        "stagehand: invalid configuration: no arch\n"
    );
}
