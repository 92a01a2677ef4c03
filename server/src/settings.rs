//! Command line + layered configuration loading: an
//! optional TOML file (explicit path, `FORGE_SERVER_CONFIG_FILE`, or the
//! platform config directory) overridden by `FORGE_SERVER_*` environment
//! variables.

use std::path::{Path, PathBuf};

use forge_core::config::FrameworkConfig;
use trace_err::TraceErrResult;

fn options() -> getopts::Options {
    let mut opts = getopts::Options::new();
    opts.optflag("h", "help", "print this help menu")
        .optflag("v", "version", "print the version information")
        .optopt("c", "config", "use a custom configuration file", "FILE");
    opts
}

pub fn config_dir() -> PathBuf {
    directories::ProjectDirs::from("rs", "forge", "forge-server")
        .map(|dirs| dirs.config_local_dir().to_path_buf())
        .unwrap_or_else(|| Path::new("/etc/forge-server").to_path_buf())
}

/// Returns `None` when `--help`/`--version` was printed and the process
/// should simply exit with no further work.
pub fn init() -> Option<(FrameworkConfig, String)> {
    let opts = options();
    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();
    let flags = opts
        .parse(&args[1..])
        .trace_expect("failed to parse command line arguments");

    if flags.opt_present("h") {
        print!("{}", opts.usage(&format!("Usage: {program} [options]")));
        return None;
    }
    if flags.opt_present("v") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return None;
    }

    let mut builder = config::Config::builder();
    let source = if let Some(path) = flags.opt_str("config") {
        let source = format!("using configuration file '{path}' specified on the command line");
        builder = builder.add_source(config::File::with_name(&path).format(config::FileFormat::Toml));
        source
    } else if let Ok(path) = std::env::var("FORGE_SERVER_CONFIG_FILE") {
        let source = format!("using configuration file '{path}' from FORGE_SERVER_CONFIG_FILE");
        builder = builder.add_source(config::File::with_name(&path).format(config::FileFormat::Toml));
        source
    } else {
        let path = config_dir().join("forge-server.toml");
        let source = format!("using optional configuration file '{}'", path.display());
        builder = builder.add_source(
            config::File::from(path)
                .required(false)
                .format(config::FileFormat::Toml),
        );
        source
    };

    builder = builder.add_source(
        config::Environment::with_prefix("FORGE_SERVER").separator("__"),
    );

    let config = builder.build().trace_expect("failed to load configuration");
    let settings: FrameworkConfig = config
        .try_deserialize()
        .trace_expect("failed to parse configuration");

    Some((settings, source))
}
