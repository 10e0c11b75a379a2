use std::{fmt::Display, path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre;
use linkroute::{
    focus, settings::Settings, station, ConfigSource, Dispatcher, ExecLauncher, FileSource, LinkRouteEPProxyBlocking, RuleStore,
    UrlEvent,
};
use zbus::blocking::Connection;

#[derive(Args)]
struct Link {
    url: String,
    /// App id of the window the link came from
    #[clap(long)]
    source_app: Option<String>,
    /// Resolve in this process instead of asking the daemon
    #[clap(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    Init,
    Open(Link),
    Resolve(Link),
    Config { path: PathBuf },
    Dump,
    /// Validate a rule document without loading it
    Check { path: PathBuf },
}

#[derive(Parser)]
#[clap(version, about = "Routes links to the right application")]
struct Opts {
    #[clap(subcommand)]
    cmd: Command,
}

fn print<T: Display>(item: T) {
    println!("{}", item)
}

fn proxy(conn: &Connection) -> eyre::Result<LinkRouteEPProxyBlocking<'_>> {
    let proxy = LinkRouteEPProxyBlocking::builder(conn)
        .destination(linkroute::NAME)?
        .cache_properties(zbus::CacheProperties::No)
        .build()?;
    Ok(proxy)
}

fn local_store(settings: &Settings) -> RuleStore {
    let sources = settings.config_sources();
    let store = RuleStore::default();
    store.reload(&station::borrow(&sources));
    store
}

fn offline(settings: &Settings, link: Link, launch: bool) -> eyre::Result<()> {
    linkroute::settings::init_tracing(settings)?;

    let store = Arc::new(local_store(settings));
    let source_app = match link.source_app {
        Some(app) => Some(app),
        None if launch && settings.detect_source => futures::executor::block_on(focus::detect_source()),
        None => None,
    };
    let event = UrlEvent::new(link.url, source_app);
    if launch {
        let dispatcher = Dispatcher::new(store, Box::new(ExecLauncher::new()));
        print(dispatcher.dispatch(&event)?);
    } else {
        let snapshot = store.snapshot();
        let resolution = snapshot.explain(&event.url, event.source_app.as_deref());
        match resolution.rule {
            Some(idx) => print(format_args!("{} (rule #{idx})", resolution.app)),
            None => print(format_args!("{} (default)", resolution.app)),
        }
    }
    Ok(())
}

fn check(path: PathBuf) -> eyre::Result<()> {
    let config = FileSource::new(path).load()?;
    let errors = config.validate();
    print(format_args!("{} rules, default app `{}`", config.rules.len(), config.default_app));
    for e in &errors {
        eprintln!("{}", e);
    }
    if !errors.is_empty() {
        eyre::bail!("{} broken patterns", errors.len());
    }
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let Opts { cmd } = Opts::parse();

    let settings = Settings::load()?;
    let cmd = match cmd {
        Command::Check { path } => return check(path),
        Command::Open(link) if link.offline => return offline(&settings, link, true),
        Command::Resolve(link) if link.offline => return offline(&settings, link, false),
        cmd => cmd,
    };

    let conn = Connection::session()?;
    let proxy = proxy(&conn)?;

    match cmd {
        Command::Init => proxy.ping().map(print)?,
        Command::Open(link) => proxy
            .open(&link.url, link.source_app.as_deref().unwrap_or_default())
            .map(print)?,
        Command::Resolve(link) => proxy
            .resolve(&link.url, link.source_app.as_deref().unwrap_or_default())
            .map(print)?,
        Command::Config { path } => proxy.reload_config(&path.to_string_lossy()).map(print)?,
        Command::Dump => proxy.dump_config().map(print)?,
        Command::Check { path } => check(path)?,
    }
    Ok(())
}
