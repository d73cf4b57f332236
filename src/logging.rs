use std::path::Path;

use flexi_logger::{
    opt_format, Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming,
};

/// Start the global logger.
///
/// `RUST_LOG` overrides `level`. Without `log_dir` records go to stderr,
/// otherwise to numbered files in that directory, rotated at 10 MB.
/// The returned handle must be kept alive for file output to be flushed.
pub fn setup_logging(level: &str, log_dir: Option<&Path>) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str(level)?.format(opt_format);

    let logger = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .rotate(
                Criterion::Size(10 * 1024 * 1024),
                Naming::Numbers,
                Cleanup::KeepLogFiles(1),
            ),
        None => logger.log_to_stderr(),
    };

    logger.start()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let handle = setup_logging("info", Some(dir.path())).unwrap();

        log::info!("logger smoke test");
        handle.flush();

        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(written >= 1);
    }
}
