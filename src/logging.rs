//! Logging setup: a console appender plus an optional rolling file
//! appender, built programmatically with `log4rs`'s config API (the crate
//! the teacher already depends on for this).

use std::path::Path;

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} [{T}] {m}{n}";

/// Initializes global logging: console always, plus a file appender when
/// `log_file` is given. `level` controls both appenders.
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> anyhow::Result<()> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let mut config_builder =
        Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root_builder = Root::builder().appender("console");

    if let Some(path) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(path)?;
        config_builder =
            config_builder.appender(Appender::builder().build("file", Box::new(file)));
        root_builder = root_builder.appender("file");
    }

    let config = config_builder.build(root_builder.build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}
