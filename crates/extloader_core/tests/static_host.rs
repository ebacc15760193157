use extloader_core::host::static_host::InstanceFactory;
use extloader_core::host::variables::{APP_ID_KEY, ENCODED_BUNDLE_KEY, RUNTIME_NAME_KEY};
use extloader_core::{
    Bridge, Export, ExportsTable, ExtensionInstance, ExtensionLoader, ExtensionManifest,
    HostError, InstanceHandler, LoadState, LoaderConfig, LoopbackInstance, ModuleCatalog,
    ModuleExports,
    Outbox, Resolution, StaticHost, ThrownError,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tempfile::tempdir;

type ModuleResult = Result<ModuleExports, ThrownError>;

const PLUGINS: &str = r#"[
    {"name": "tizen", "lib": "libtizen.so", "entry_points": []},
    {"name": "tizen.contact", "lib": "libtizen-contact.so", "entry_points": ["tizen.AddressBook"]},
    {"name": "app.echo", "lib": "/opt/extensions/libecho.so"}
]"#;

/// Native half answering every message with an echo.
struct EchoHandler;

impl InstanceHandler for EchoHandler {
    fn handle_message(&self, message: &str, outbox: &Outbox<'_>) {
        outbox.post_message(&format!("ack:{message}"));
    }

    fn handle_sync_message(&self, message: &str) -> Option<String> {
        Some(format!("echo:{message}"))
    }
}

fn factory() -> InstanceFactory {
    Box::new(
        |manifest: &ExtensionManifest| -> Result<Rc<dyn ExtensionInstance>, HostError> {
            Ok(Rc::new(LoopbackInstance::new(
                manifest.name.clone(),
                Rc::new(EchoHandler),
            )))
        },
    )
}

fn catalog(received: Rc<RefCell<Vec<String>>>) -> ModuleCatalog {
    ModuleCatalog::new()
        .with("libtizen.so", |_: &Bridge| -> ModuleResult {
            Ok(ModuleExports::new(ExportsTable::new().with_constant("ready", true)))
        })
        .with("libtizen-contact.so", |_: &Bridge| -> ModuleResult {
            Ok(ModuleExports::new(ExportsTable::new().with_constant("count", 0))
                .with_entry_point("tizen.AddressBook", Export::constant("address-book")))
        })
        .with("libecho.so", move |bridge: &Bridge| -> ModuleResult {
            let received = received.clone();
            bridge.set_message_listener(Box::new(move |message: &str| {
                received.borrow_mut().push(message.to_string());
            }));
            let say = bridge.clone();
            let ping = bridge.clone();
            let exports = ExportsTable::new()
                .with_method("say", move |args| {
                    let text = args.first().and_then(Value::as_str).unwrap_or_default();
                    Ok(json!(say.send_sync_message(text)))
                })
                .with_method("ping", move |_args| Ok(json!(ping.post_message("ping"))));
            Ok(ModuleExports::new(exports))
        })
}

fn write_metadata(dir: &Path) {
    fs::write(dir.join("plugins.json"), PLUGINS).expect("write metadata");
    fs::write(dir.join("broken.json"), "not json").expect("write broken metadata");
    fs::write(dir.join("notes.txt"), "ignored").expect("write unrelated file");
}

#[test]
fn metadata_directory_drives_activation_modes() {
    let metadata = tempdir().expect("metadata dir");
    write_metadata(metadata.path());

    let host = StaticHost::from_metadata_dir(metadata.path(), Path::new("/usr/lib/ext"), factory())
        .expect("host from metadata");

    let modes: Vec<(&str, bool)> = host
        .manifests()
        .iter()
        .map(|manifest| (manifest.name.as_str(), manifest.use_trampoline))
        .collect();
    assert_eq!(
        modes,
        vec![("app.echo", false), ("tizen", false), ("tizen.contact", true)]
    );
    assert_eq!(
        host.manifests()[1].lib,
        Path::new("/usr/lib/ext").join("libtizen.so")
    );
    assert_eq!(host.manifests()[0].lib, Path::new("/opt/extensions/libecho.so"));
}

#[test]
fn loader_runs_against_static_host() {
    let metadata = tempdir().expect("metadata dir");
    write_metadata(metadata.path());
    let host = Rc::new(
        StaticHost::from_metadata_dir(metadata.path(), Path::new("/usr/lib/ext"), factory())
            .expect("host from metadata"),
    );
    let received = Rc::new(RefCell::new(Vec::new()));

    let loader = ExtensionLoader::builder(host.clone())
        .catalog(catalog(received.clone()))
        .start()
        .expect("start");

    assert!(host.is_initialized());
    assert_eq!(
        host.runtime_variable(RUNTIME_NAME_KEY).as_deref(),
        Some("wrt-service")
    );
    assert_eq!(loader.state("app.echo"), Some(LoadState::Loaded));
    assert_eq!(loader.state("tizen"), Some(LoadState::Loaded));
    assert_eq!(loader.state("tizen.contact"), Some(LoadState::Trampolined));

    assert_eq!(
        loader.call("app.echo.say", &[json!("hi")]).expect("say"),
        json!("echo:hi")
    );
    assert_eq!(loader.call("app.echo.ping", &[]).expect("ping"), json!(true));
    assert_eq!(*received.borrow(), vec!["ack:ping".to_string()]);

    assert_eq!(
        loader.resolve("tizen.AddressBook"),
        Some(Resolution::Value(Export::constant("address-book")))
    );
    assert_eq!(loader.state("tizen.contact"), Some(LoadState::Loaded));
    assert_eq!(
        loader.resolve("tizen.ready"),
        Some(Resolution::Value(Export::constant(true)))
    );
}

#[test]
fn service_request_updates_host_variables() {
    let metadata = tempdir().expect("metadata dir");
    write_metadata(metadata.path());
    let host = Rc::new(
        StaticHost::from_metadata_dir(metadata.path(), Path::new("/usr/lib/ext"), factory())
            .expect("host from metadata"),
    );
    let loader = ExtensionLoader::builder(host.clone())
        .catalog(catalog(Rc::new(RefCell::new(Vec::new()))))
        .start()
        .expect("start");

    assert_eq!(host.runtime_variable(ENCODED_BUNDLE_KEY), None);
    loader
        .handle_service_request("YnVuZGxl")
        .expect("service request");

    assert_eq!(
        host.runtime_variable(ENCODED_BUNDLE_KEY).as_deref(),
        Some("YnVuZGxl")
    );
    assert_eq!(
        loader.runtime_variables().get(ENCODED_BUNDLE_KEY),
        Some("YnVuZGxl")
    );
    assert_eq!(
        host.runtime_variable(RUNTIME_NAME_KEY).as_deref(),
        Some("wrt-service")
    );
}

#[test]
fn configured_variables_reach_the_host() {
    let metadata = tempdir().expect("metadata dir");
    write_metadata(metadata.path());
    let config = LoaderConfig::from_json_str(r#"{"app_id": "org.example.app"}"#)
        .expect("config");
    let host = Rc::new(
        StaticHost::from_metadata_dir(metadata.path(), Path::new("/usr/lib/ext"), factory())
            .expect("host from metadata"),
    );

    let loader = ExtensionLoader::builder(host.clone())
        .variables(config.runtime_variables())
        .catalog(catalog(Rc::new(RefCell::new(Vec::new()))))
        .start()
        .expect("start");

    assert_eq!(
        host.runtime_variable(APP_ID_KEY).as_deref(),
        Some("org.example.app")
    );
    assert_eq!(
        host.runtime_variable(RUNTIME_NAME_KEY).as_deref(),
        Some("wrt-service")
    );
    assert_eq!(loader.runtime_variables().get(APP_ID_KEY), Some("org.example.app"));
}

#[test]
fn unreadable_metadata_directory_is_an_error() {
    let missing = tempdir().expect("temp dir").path().join("missing");
    let err = StaticHost::from_metadata_dir(&missing, Path::new("/usr/lib/ext"), factory())
        .expect_err("missing directory");
    assert!(err.to_string().contains("missing"));
}
