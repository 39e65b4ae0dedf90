use slog::{o, Drain, Logger};
use slog_scope::GlobalLoggerGuard;

/// Initialize a root logger filtered with `slog-envlogger` syntax (e.g.
/// 'warn,auction_client=debug') and bridge the `log` facade to it so that
/// the rest of the crate can use the standard logging macros.
pub fn init(filter: &str) -> (Logger, GlobalLoggerGuard) {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::LogBuilder::new(drain).parse(filter).build();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let guard = slog_scope::set_global_logger(logger.clone());
    slog_stdlog::init().expect("failed to register logger");

    (logger, guard)
}
