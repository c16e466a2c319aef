use std::sync::OnceLock;

use crate::{compress::CompressionType, diff::Granularity, logging::init_log};

pub struct Config {
    pub log_config: LogConfig,
    pub threads: usize,
    pub granularity: Granularity,
    pub compression: CompressionType,
}

pub enum LogConfig {
    /// Everything, with module paths, to `trace.log`
    Trace,
    /// 0 = silent, 1 = info, 2 = debug, 3 = debug mirrored to `debug.log`, 4+ = trace
    Verbose(u8),
    NoLog,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_config: LogConfig::NoLog,
            threads: 8,
            granularity: Granularity::Word,
            compression: CompressionType::Zlib,
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn init_config(config: Config) {
    let threads = config.threads;
    CONFIG.set(config).unwrap_or_else(|_| {
        panic!("cannot init config again after init");
    });
    init_log(&get_config().log_config);
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        log::warn!("rayon pool already initialised: {}", e);
    }
}

pub fn get_config() -> &'static Config {
    CONFIG.get().expect("cannot get config before init")
}
