//! Drives the util-container backend against an engine that emulates the
//! `openssl` chain by generating the same files with rcgen.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use lando_certs::tls::{self, LeafProfile, RootProfile};
use lando_certs::util::{
    ContainerEngine, EngineError, ExecResult, RunOptions, UtilError, UtilServiceDescriptor,
    HELPER_SCRIPTS,
};
use lando_certs::{
    AppContext, CertError, CertificateAuthority, CertsConfig, HostEnvironment, HostPlatform,
    KeyAlgorithm, UtilContainerBackend, UtilityContainerRunner,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Emulate,
    ExitWith(i32),
    RefuseExec,
}

struct OpensslEmulator {
    ssl_root: PathBuf,
    config: CertsConfig,
    behaviour: Behaviour,
    events: Mutex<Vec<String>>,
}

impl OpensslEmulator {
    fn new(config: &CertsConfig, behaviour: Behaviour) -> Self {
        Self {
            ssl_root: config.ssl_root.clone(),
            config: config.clone(),
            behaviour,
            events: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, event: String) {
        self.events.lock().expect("events lock").push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    fn host_path(&self, mounted: &str) -> PathBuf {
        let relative = mounted
            .strip_prefix("/ssl/")
            .unwrap_or_else(|| panic!("{mounted} is not under /ssl"));
        self.ssl_root.join(relative)
    }

    fn emulate(&self, script: &str) {
        let segments: Vec<&str> = script.split(" && ").collect();
        let genkey = segments
            .iter()
            .find(|segment| segment.starts_with("openssl genpkey"))
            .expect("genpkey step");
        let sign = segments.last().expect("x509 step");
        let key_path = self.host_path(&flag_value(genkey, "-out"));
        let cert_path = self.host_path(&flag_value(sign, "-out"));

        let material = if sign.contains("-signkey") {
            tls::generate_root(
                &RootProfile {
                    validity_days: days(sign),
                    ..self.config.root_profile()
                },
                SystemTime::now(),
            )
            .expect("emulated root")
        } else {
            let extensions = std::fs::read_to_string(self.host_path(&flag_value(sign, "-extfile")))
                .expect("extension file");
            let names = tls::normalize_names(
                extensions
                    .lines()
                    .filter(|line| line.starts_with("DNS."))
                    .filter_map(|line| line.split_once('=').map(|(_, name)| name.to_string())),
            );
            let ca_cert = std::fs::read_to_string(self.host_path(&flag_value(sign, "-CA")))
                .expect("ca cert");
            let ca_key = std::fs::read_to_string(self.host_path(&flag_value(sign, "-CAkey")))
                .expect("ca key");
            tls::sign_leaf(
                &ca_cert,
                &ca_key,
                &names,
                &LeafProfile {
                    validity_days: days(sign),
                    ..self.config.leaf_profile()
                },
                SystemTime::now(),
            )
            .expect("emulated leaf")
        };

        std::fs::create_dir_all(cert_path.parent().expect("cert dir")).expect("mkdir");
        std::fs::write(&key_path, material.key_pem).expect("write key");
        std::fs::write(&cert_path, material.cert_pem).expect("write cert");
    }
}

fn flag_value(segment: &str, flag: &str) -> String {
    let marker = format!("{flag} '");
    let start = segment.find(&marker).expect("flag present") + marker.len();
    let end = segment[start..].find('\'').expect("closing quote") + start;
    segment[start..end].to_string()
}

fn days(segment: &str) -> u32 {
    segment
        .split_whitespace()
        .skip_while(|token| *token != "-days")
        .nth(1)
        .and_then(|value| value.parse().ok())
        .expect("-days value")
}

impl ContainerEngine for OpensslEmulator {
    async fn start(&self, descriptor: &UtilServiceDescriptor) -> Result<(), EngineError> {
        self.record(format!("start {}", descriptor.container_id));
        Ok(())
    }

    async fn exec(
        &self,
        descriptor: &UtilServiceDescriptor,
        command: &[String],
        options: &RunOptions,
    ) -> Result<ExecResult, EngineError> {
        self.record(format!("exec as {}", options.user));
        match self.behaviour {
            Behaviour::RefuseExec => Err(EngineError::Exec {
                container: descriptor.container_id.clone(),
                detail: "daemon unavailable".to_string(),
            }),
            Behaviour::ExitWith(code) => Ok(ExecResult {
                exit_code: code,
                stdout: String::new(),
                stderr: "unable to load Private Key\n".to_string(),
            }),
            Behaviour::Emulate => {
                assert_eq!(command[..2], ["sh", "-c"]);
                self.emulate(&command[2]);
                Ok(ExecResult::default())
            }
        }
    }

    async fn exists(&self, descriptor: &UtilServiceDescriptor) -> Result<bool, EngineError> {
        self.record(format!("exists {}", descriptor.container_id));
        Ok(true)
    }

    async fn stop(&self, descriptor: &UtilServiceDescriptor) -> Result<(), EngineError> {
        self.record(format!("stop {}", descriptor.container_id));
        Ok(())
    }

    async fn destroy(&self, descriptor: &UtilServiceDescriptor) -> Result<(), EngineError> {
        self.record(format!("destroy {}", descriptor.container_id));
        Ok(())
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    conf_root: PathBuf,
    config: CertsConfig,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let conf_root = dir.path().join("lando");
    let scripts = conf_root.join("scripts");
    std::fs::create_dir_all(&scripts).expect("scripts dir");
    for script in HELPER_SCRIPTS {
        std::fs::write(scripts.join(script), "#!/bin/sh\n").expect("script");
    }
    let config = CertsConfig {
        key_algorithm: KeyAlgorithm::EcdsaP256,
        ..CertsConfig::default()
    }
    .with_ssl_root(conf_root.join("certs"));
    Fixture {
        _dir: dir,
        conf_root,
        config,
    }
}

fn host(conf_root: &Path) -> HostEnvironment {
    HostEnvironment {
        platform: HostPlatform::Linux,
        settle_delay: Duration::ZERO,
        ..HostEnvironment::detect(conf_root)
    }
}

type EmulatedAuthority = CertificateAuthority<UtilContainerBackend<Arc<OpensslEmulator>>>;

fn authority(
    fixture: &Fixture,
    behaviour: Behaviour,
) -> (EmulatedAuthority, Arc<OpensslEmulator>) {
    let engine = Arc::new(OpensslEmulator::new(&fixture.config, behaviour));
    let runner = UtilityContainerRunner::new(Arc::clone(&engine), host(&fixture.conf_root));
    let backend = UtilContainerBackend::new(Arc::new(runner), AppContext::named("lando"));
    let ca = CertificateAuthority::with_backend(fixture.config.clone(), backend)
        .expect("authority");
    (ca, engine)
}

#[tokio::test]
async fn root_and_leaf_are_produced_inside_the_util_context() {
    let fixture = fixture();
    let (ca, engine) = authority(&fixture, Behaviour::Emulate);

    let leaf = ca
        .issue_leaf_certificate(["app.lndo.site", "api.lndo.site"])
        .await
        .expect("leaf");
    let root = ca.ensure_root_ca().await.expect("root");

    assert_eq!(
        root.certificate_path,
        fixture.config.ssl_root.join("certs").join("landoCA.crt")
    );
    assert_eq!(leaf.issuer_certificate_pem, root.certificate_pem);
    assert_eq!(
        leaf.subject_alt_names.iter().map(String::as_str).collect::<Vec<_>>(),
        ["api.lndo.site", "app.lndo.site"]
    );

    let ssl_conf =
        std::fs::read_to_string(fixture.config.ssl_root.join("ssl.conf")).expect("ssl.conf");
    assert!(ssl_conf.contains("[v3_ca]"));
    let extensions = std::fs::read_to_string(fixture.config.ssl_root.join("landoProxy.ext"))
        .expect("extension file");
    assert!(extensions.contains("DNS.1 = api.lndo.site"));
    assert!(extensions.contains("DNS.2 = app.lndo.site"));

    let events = engine.events();
    assert_eq!(events.iter().filter(|event| *event == "exec as root").count(), 2);
    assert_eq!(
        events.iter().filter(|event| event.starts_with("destroy")).count(),
        2
    );
    assert!(fixture.conf_root.join("util").join("util.yml").exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&leaf.key_path)
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn reuse_does_not_touch_the_container() {
    let fixture = fixture();
    let (ca, engine) = authority(&fixture, Behaviour::Emulate);

    let first = ca.issue_leaf_certificate(["app.lndo.site"]).await.expect("first");
    let before = engine.events().len();
    let second = ca.issue_leaf_certificate(["app.lndo.site"]).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(engine.events().len(), before);
}

#[tokio::test]
async fn nonzero_exit_is_a_signing_error_and_still_releases() {
    let fixture = fixture();
    let (ca, engine) = authority(&fixture, Behaviour::ExitWith(1));

    let error = ca.ensure_root_ca().await.expect_err("openssl failure");
    match error {
        CertError::SigningError(detail) => {
            assert!(detail.contains("status 1"), "{detail}");
            assert!(detail.contains("unable to load Private Key"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine
        .events()
        .last()
        .is_some_and(|event| event.starts_with("destroy")));
}

#[tokio::test]
async fn engine_failures_propagate_as_engine_errors() {
    let fixture = fixture();
    let (ca, _engine) = authority(&fixture, Behaviour::RefuseExec);

    let error = ca.ensure_root_ca().await.expect_err("engine failure");
    assert!(
        matches!(error, CertError::Engine(UtilError::Engine(EngineError::Exec { .. }))),
        "{error}"
    );
}

#[tokio::test]
async fn ssl_root_outside_the_mounted_dir_is_rejected() {
    let fixture = fixture();
    let engine = Arc::new(OpensslEmulator::new(&fixture.config, Behaviour::Emulate));
    let runner = UtilityContainerRunner::new(Arc::clone(&engine), host(&fixture.conf_root));
    let backend = UtilContainerBackend::new(Arc::new(runner), AppContext::named("lando"));
    let elsewhere = fixture.config.clone().with_ssl_root(fixture.conf_root.join("elsewhere"));
    let ca = CertificateAuthority::with_backend(elsewhere, backend).expect("authority");

    let error = ca.ensure_root_ca().await.expect_err("unmounted root");
    assert!(matches!(error, CertError::InvalidConfig(_)), "{error}");
    assert!(engine.events().is_empty());
}
