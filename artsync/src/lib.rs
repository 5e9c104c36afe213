use env_logger::Env;

pub mod context;
pub mod executor;
pub mod orchestrator;
pub mod task;
pub mod worker;

#[cfg(test)]
mod tests;

/// Initialize logging for tools embedding the library. Calling it again (from
/// another tool of the same process) does nothing.
pub fn init_logging() {
    if env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .try_init()
        .is_err()
    {
        log::debug!("Logger already initialized");
    }
}
