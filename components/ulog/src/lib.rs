use std::io::Write;

/// Install an `env_logger` suited for test binaries. Safe to call from every
/// test; only the first call wins.
pub fn try_init_log() {
    let _ = env_logger::builder()
        .is_test(true)
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .try_init();
}
