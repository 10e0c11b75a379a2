pub mod dispatch;
pub mod error;
pub mod focus;
pub mod loader;
pub mod matcher;
pub mod rule;
pub mod settings;
pub mod station;
pub mod store;

pub use dispatch::{ApplicationLauncher, Dispatcher, ExecLauncher, UrlEvent, UrlEventSource};
pub use error::{ConfigError, LaunchError, PatternError};
pub use loader::{load_config, parse, serialize, BundledSource, ConfigSink, ConfigSource, FileSource};
pub use matcher::{Matcher, Resolution};
pub use rule::{Config, Pattern, PatternCache, Rule};
pub use store::{ConfigEvent, RuleStore};

#[cfg(not(debug_assertions))]
pub const NAME: &str = "moe.gyara.linkroute";
#[cfg(debug_assertions)]
pub const NAME: &str = "moe.gyara.linkrouted";

pub const PATH: &str = "/moe/gyara/linkroute";
pub const APP_DIR: &str = "linkroute";

#[zbus::dbus_proxy(
    interface = "moe.gyara.linkroute",
    default_service = "moe.gyara.linkroute",
    default_path = "/moe/gyara/linkroute"
)]
pub trait LinkRouteEP {
    fn ping(&self) -> zbus::Result<String>;

    fn open(&self, url: &str, source_app: &str) -> zbus::Result<String>;

    fn resolve(&self, url: &str, source_app: &str) -> zbus::Result<String>;

    fn reload_config(&self, path: &str) -> zbus::Result<String>;

    fn dump_config(&self) -> zbus::Result<String>;
}
